//! Bounded repair of units the greedy pass left out.
//!
//! A unit whose candidate slot is held by exactly one other lesson can take
//! that slot if the lesson is relocated elsewhere, or swapped with the one
//! lesson standing in its way. Every intermediate placement is checked
//! against the hard rules, and a move is kept only if the total soft penalty
//! grows by at most `search.swap_tolerance`. Rejected trials are unwound
//! in reverse order so every original lesson keeps its id.

use std::collections::HashSet;
use std::time::Instant;

use sched_core::{
    scoring, CancelToken, ConstraintEngine, GenerateError, PartialSchedule, Placement, PlacementId,
};
use tracing::debug;

use crate::{best_placement, Pending};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RepairReport {
    pub iterations: u32,
    pub moves: u32,
    pub placed: u32,
}

/// Retries every pending unit until a full pass places nothing, the
/// iteration cap is spent or `deadline` passes. Units still pending on
/// return keep their greedy-pass reason.
pub(crate) fn run(
    engine: &ConstraintEngine<'_>,
    schedule: &mut PartialSchedule,
    pending: &mut Vec<Pending>,
    cancel: &CancelToken,
    deadline: Option<Instant>,
) -> Result<RepairReport, GenerateError> {
    let search = &engine.config().search;
    let mut report = RepairReport::default();
    let exhausted = |report: &RepairReport| {
        report.iterations >= search.repair_iterations
            || deadline.is_some_and(|d| Instant::now() >= d)
    };

    while !pending.is_empty() && !exhausted(&report) {
        let mut still = Vec::with_capacity(pending.len());
        let mut progress = false;
        for p in pending.drain(..) {
            if exhausted(&report) {
                still.push(p);
                continue;
            }
            cancel.checkpoint()?;
            report.iterations += 1;
            match insert(engine, schedule, p.unit.requirement, search.swap_tolerance) {
                Some(moves) => {
                    debug!(
                        requirement = %engine.problem().requirements[p.unit.requirement].id,
                        occurrence = p.unit.occurrence,
                        moves,
                        "repair placed unit"
                    );
                    report.moves += moves;
                    report.placed += 1;
                    progress = true;
                }
                None => still.push(p),
            }
        }
        *pending = still;
        if !progress {
            break;
        }
    }
    Ok(report)
}

/// Places one lesson of `requirement`, displacing at most two others.
/// Returns how many lessons were moved.
fn insert(
    engine: &ConstraintEngine<'_>,
    schedule: &mut PartialSchedule,
    requirement: usize,
    tolerance: f64,
) -> Option<u32> {
    if let Ok(p) = best_placement(engine, schedule, requirement) {
        schedule.place(p);
        return Some(0);
    }
    let before = engine.total_penalty(schedule).total();
    let mut tried = HashSet::new();
    for target in engine.candidates(requirement) {
        let Some(blocker) = sole_blocker(engine, schedule, &target) else {
            continue;
        };
        if schedule.get(blocker)?.requirement == requirement
            || !tried.insert((target.slot, blocker))
        {
            continue;
        }
        if relocate(engine, schedule, target, blocker, before, tolerance) {
            return Some(1);
        }
        if swap(engine, schedule, target, blocker, before, tolerance) {
            return Some(2);
        }
    }
    None
}

/// The single placement keeping `cand` out, if the slot is otherwise open.
fn sole_blocker(
    engine: &ConstraintEngine<'_>,
    schedule: &PartialSchedule,
    cand: &Placement,
) -> Option<PlacementId> {
    if engine.static_violation(cand.teacher, cand.slot).is_some() {
        return None;
    }
    let class = engine.problem().requirements[cand.requirement].class;
    let occupants = [
        schedule.teacher_at(cand.teacher, cand.slot),
        cand.room.and_then(|r| schedule.room_at(r, cand.slot)),
        schedule.class_at(class, cand.slot),
    ];
    let mut found = None;
    for id in occupants.into_iter().flatten() {
        match found {
            None => found = Some(id),
            Some(f) if f == id => {}
            Some(_) => return None,
        }
    }
    found
}

fn within(engine: &ConstraintEngine<'_>, schedule: &PartialSchedule, before: f64, tol: f64) -> bool {
    engine.total_penalty(schedule).total() - before <= tol + scoring::PENALTY_EPSILON
}

/// Puts `target` in place of `blocker` and moves the blocker to its
/// cheapest open slot.
fn relocate(
    engine: &ConstraintEngine<'_>,
    schedule: &mut PartialSchedule,
    target: Placement,
    blocker: PlacementId,
    before: f64,
    tolerance: f64,
) -> bool {
    let Some(moved) = schedule.remove(blocker) else {
        return false;
    };
    if !engine.is_hard_feasible(&target, schedule) {
        schedule.restore(blocker, moved);
        return false;
    }
    let target_id = schedule.place(target);
    if let Ok(dest) = best_placement(engine, schedule, moved.requirement) {
        let dest_id = schedule.place(dest);
        if within(engine, schedule, before, tolerance) {
            return true;
        }
        schedule.remove(dest_id);
    }
    schedule.remove(target_id);
    schedule.restore(blocker, moved);
    false
}

/// Puts `target` in place of `blocker`, moves the blocker into a slot held
/// by a single other lesson, and sends that lesson to the blocker's old
/// slot.
fn swap(
    engine: &ConstraintEngine<'_>,
    schedule: &mut PartialSchedule,
    target: Placement,
    blocker: PlacementId,
    before: f64,
    tolerance: f64,
) -> bool {
    let Some(b) = schedule.remove(blocker) else {
        return false;
    };
    if !engine.is_hard_feasible(&target, schedule) {
        schedule.restore(blocker, b);
        return false;
    }
    let target_id = schedule.place(target);

    let mut tried = HashSet::new();
    for dest in engine.candidates(b.requirement) {
        if dest.slot == b.slot {
            continue;
        }
        let Some(other_id) = sole_blocker(engine, schedule, &dest) else {
            continue;
        };
        if other_id == target_id || !tried.insert((dest.slot, other_id)) {
            continue;
        }
        let Some(other) = schedule.remove(other_id) else {
            continue;
        };
        if engine.is_hard_feasible(&dest, schedule) {
            let dest_id = schedule.place(dest);
            let back = engine
                .candidates(other.requirement)
                .skip_while(|p| p.slot < b.slot)
                .take_while(|p| p.slot == b.slot)
                .find(|p| engine.is_hard_feasible(p, schedule));
            if let Some(back) = back {
                let back_id = schedule.place(back);
                if within(engine, schedule, before, tolerance) {
                    return true;
                }
                schedule.remove(back_id);
            }
            schedule.remove(dest_id);
        }
        schedule.restore(other_id, other);
    }

    schedule.remove(target_id);
    schedule.restore(blocker, b);
    false
}

//! Deterministic timetable construction: most-constrained-first greedy
//! placement followed by a bounded swap/relocate repair pass.

mod repair;

use std::time::{Duration, Instant};

use sched_core::{
    generate_with, scoring, CancelToken, ConstraintEngine, GenerateError, HardViolation, PartialSchedule,
    Placement, SolveOutcome, Solver,
};
use tracing::{debug, info};
use types::{ConstraintConfig, Entities, GenerateOutput, SolveStats, UnplacedUnit};

/// One weekly lesson of a requirement still waiting for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Unit {
    pub requirement: usize,
    /// 1-based among the requirement's weekly lessons.
    pub occurrence: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Pending {
    pub unit: Unit,
    pub reason: HardViolation,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HeurSolver;

impl HeurSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Solver for HeurSolver {
    fn name(&self) -> &'static str {
        "greedy-repair"
    }

    fn solve(
        &self,
        engine: &ConstraintEngine<'_>,
        cancel: &CancelToken,
    ) -> Result<SolveOutcome, GenerateError> {
        let started = Instant::now();
        let problem = engine.problem();
        let search = &engine.config().search;

        let units = ordered_units(engine);
        let mut schedule = PartialSchedule::new(problem);
        let mut pending = Vec::new();
        for unit in &units {
            cancel.checkpoint()?;
            match best_placement(engine, &schedule, unit.requirement) {
                Ok(p) => {
                    schedule.place(p);
                }
                Err(reason) => {
                    debug!(
                        requirement = %problem.requirements[unit.requirement].id,
                        occurrence = unit.occurrence,
                        ?reason,
                        "unit not placeable in greedy pass"
                    );
                    pending.push(Pending {
                        unit: *unit,
                        reason,
                    });
                }
            }
        }
        let placed_greedy = schedule.len() as u32;

        let deadline = search
            .time_limit_ms
            .map(|ms| started + Duration::from_millis(ms));
        let report = repair::run(engine, &mut schedule, &mut pending, cancel, deadline)?;

        let stats = SolveStats {
            units: units.len() as u32,
            placed_greedy,
            placed_repair: report.placed,
            repair_iterations: report.iterations,
            repair_moves: report.moves,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            units = stats.units,
            placed_greedy = stats.placed_greedy,
            placed_repair = stats.placed_repair,
            unplaced = pending.len(),
            "heuristic solve finished"
        );

        let unplaced = pending
            .iter()
            .map(|p| {
                let req = &problem.requirements[p.unit.requirement];
                UnplacedUnit {
                    requirement_id: req.id.clone(),
                    class_id: problem.classes[req.class].id.clone(),
                    subject_id: problem.subjects[req.subject].id.clone(),
                    occurrence: p.unit.occurrence,
                    reason: reason_text(p.reason).to_owned(),
                }
            })
            .collect();
        Ok(SolveOutcome {
            schedule,
            unplaced,
            stats,
        })
    }
}

/// Every weekly lesson, fewest static options first. Ties keep input order.
fn ordered_units(engine: &ConstraintEngine<'_>) -> Vec<Unit> {
    let problem = engine.problem();
    let options: Vec<usize> = (0..problem.requirements.len())
        .map(|r| engine.static_options(r))
        .collect();
    let mut units: Vec<Unit> = problem
        .requirements
        .iter()
        .enumerate()
        .flat_map(|(requirement, req)| {
            (1..=req.periods).map(move |occurrence| Unit {
                requirement,
                occurrence,
            })
        })
        .collect();
    units.sort_by_key(|u| options[u.requirement]);
    units
}

/// Cheapest hard-feasible placement for one lesson of `requirement`; the
/// first candidate (earliest day, period, teacher, room) wins ties. On failure, the rule that blocked the most
/// candidates.
pub(crate) fn best_placement(
    engine: &ConstraintEngine<'_>,
    schedule: &PartialSchedule,
    requirement: usize,
) -> Result<Placement, HardViolation> {
    let mut best: Option<(f64, Placement)> = None;
    let mut blocked = [0usize; 5];
    for cand in engine.candidates(requirement) {
        match engine.first_violation(&cand, schedule) {
            Some(v) => blocked[v as usize] += 1,
            None => {
                let cost = engine.soft_penalty(&cand, schedule);
                if best.map_or(true, |(b, _)| scoring::cheaper(cost, b)) {
                    best = Some((cost, cand));
                }
            }
        }
    }
    match best {
        Some((_, p)) => Ok(p),
        None => Err(dominant(&blocked)),
    }
}

fn dominant(blocked: &[usize; 5]) -> HardViolation {
    const ORDER: [HardViolation; 5] = [
        HardViolation::TeacherUnavailable,
        HardViolation::TeacherBusy,
        HardViolation::RoomBusy,
        HardViolation::ClassBusy,
        HardViolation::BreakReserved,
    ];
    let mut pick = 0;
    for i in 1..ORDER.len() {
        if blocked[i] > blocked[pick] {
            pick = i;
        }
    }
    ORDER[pick]
}

fn reason_text(v: HardViolation) -> &'static str {
    match v {
        HardViolation::TeacherUnavailable => {
            "no qualified teacher is available in any open period"
        }
        HardViolation::TeacherBusy => "every qualified teacher is already booked in the open periods",
        HardViolation::RoomBusy => "no suitable classroom is free in the open periods",
        HardViolation::ClassBusy => "the class has no free period left",
        HardViolation::BreakReserved => "the remaining periods are reserved breaks",
    }
}

/// Builds a timetable with the heuristic solver.
pub fn generate(
    entities: &Entities,
    config: &ConstraintConfig,
) -> Result<GenerateOutput, GenerateError> {
    generate_with(&HeurSolver, entities, config, &CancelToken::new())
}

/// As [`generate`], stopping with `Cancelled` once `cancel` fires.
pub fn generate_cancellable(
    entities: &Entities,
    config: &ConstraintConfig,
    cancel: &CancelToken,
) -> Result<GenerateOutput, GenerateError> {
    generate_with(&HeurSolver, entities, config, cancel)
}

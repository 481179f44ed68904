//! Soft-rule penalties.
//!
//! Every rule is expressed as a cost over one small row (a class-day, a
//! teacher-day, a requirement's week, or a single lesson), so the same
//! functions price a whole timetable and the delta of a single candidate.

use types::{ClockTime, ConstraintConfig, PenaltyBreakdown};

use crate::problem::Problem;
use crate::schedule::Placement;

/// Effective weights: zero for disabled rules.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub back_to_back: f64,
    pub morning: f64,
    pub gap: f64,
    pub balance: f64,
    pub difficult: f64,
    pub excess: f64,
    pub limit: u32,
    pub morning_ends_at: ClockTime,
}

impl From<&ConstraintConfig> for Weights {
    fn from(c: &ConstraintConfig) -> Self {
        let mc = &c.max_consecutive_periods;
        Self {
            back_to_back: c.no_back_to_back_same_subject.effective(),
            morning: c.prefer_morning_for_core_subjects.effective(),
            gap: c.avoid_single_period_gaps.effective(),
            balance: c.balance_subjects_across_week.effective(),
            difficult: c.avoid_consecutive_difficult_subjects.effective(),
            excess: if mc.enabled { mc.weight } else { 0.0 },
            limit: mc.limit.max(1),
            morning_ends_at: c.morning_ends_at,
        }
    }
}

/// What a class-day row needs to know about the lesson in a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lesson {
    pub subject: usize,
    pub core: bool,
    pub difficult: bool,
}

impl Lesson {
    pub fn of(problem: &Problem, requirement: usize) -> Self {
        let r = &problem.requirements[requirement];
        let s = &problem.subjects[r.subject];
        Self {
            subject: r.subject,
            core: s.is_core,
            difficult: s.is_difficult,
        }
    }
}

/// Same-subject and difficult-subject adjacency within one class-day.
pub fn class_day_cost(w: &Weights, row: &[Option<Lesson>]) -> PenaltyBreakdown {
    let mut out = PenaltyBreakdown::default();
    for pair in row.windows(2) {
        if let (Some(a), Some(b)) = (pair[0], pair[1]) {
            if a.subject == b.subject {
                out.back_to_back_same_subject += w.back_to_back;
            }
            if a.difficult && b.difficult {
                out.consecutive_difficult += w.difficult;
            }
        }
    }
    out
}

/// Single free periods and over-long runs within one teacher-day. A free
/// break period is not a gap.
pub fn teacher_day_cost(w: &Weights, row: &[bool], breaks: &[bool]) -> PenaltyBreakdown {
    let mut out = PenaltyBreakdown::default();
    for k in 1..row.len().saturating_sub(1) {
        if !row[k] && !breaks[k] && row[k - 1] && row[k + 1] {
            out.single_period_gaps += w.gap;
        }
    }
    let mut run = 0u32;
    for &busy in row.iter().chain(std::iter::once(&false)) {
        if busy {
            run += 1;
        } else {
            if run > w.limit {
                out.excess_consecutive += w.excess * f64::from(run - w.limit);
            }
            run = 0;
        }
    }
    out
}

/// Penalties closer than this are the same cost.
pub const PENALTY_EPSILON: f64 = 1e-9;

/// `a` is strictly cheaper than `b`, ignoring rounding noise.
pub fn cheaper(a: f64, b: f64) -> bool {
    a < b - PENALTY_EPSILON
}

/// Weighted population variance of a requirement's lessons per day.
///
/// Computed as `(n * sum(c^2) - sum(c)^2) / n^2` over integers, so the
/// result does not depend on which day holds which count.
pub fn balance_cost(w: &Weights, per_day: &[u32]) -> f64 {
    if per_day.is_empty() || w.balance == 0.0 {
        return 0.0;
    }
    let n = per_day.len() as u64;
    let sum: u64 = per_day.iter().map(|&c| u64::from(c)).sum();
    let squares: u64 = per_day.iter().map(|&c| u64::from(c) * u64::from(c)).sum();
    let var = (n * squares - sum * sum) as f64 / (n * n) as f64;
    w.balance * var
}

/// Cost of a lesson on its own: core subjects after the morning cut-off.
pub fn placement_cost(w: &Weights, lesson: Lesson, start: ClockTime) -> f64 {
    if lesson.core && start >= w.morning_ends_at {
        w.morning
    } else {
        0.0
    }
}

/// Full penalty of a set of placements. Cells claimed twice (a double
/// booking) are priced with their first occupant.
pub fn score_placements<'a>(
    problem: &Problem,
    config: &ConstraintConfig,
    placements: impl IntoIterator<Item = &'a Placement>,
) -> PenaltyBreakdown {
    let w = Weights::from(config);
    let n_days = problem.days.len();
    let n_periods = problem.periods.len();
    let n = problem.slot_count();
    let breaks: Vec<bool> = problem.periods.iter().map(|p| p.is_break).collect();

    let mut class_rows: Vec<Option<Lesson>> = vec![None; problem.classes.len() * n];
    let mut teacher_rows: Vec<bool> = vec![false; problem.teachers.len() * n];
    let mut per_day: Vec<u32> = vec![0; problem.requirements.len() * n_days];
    let mut out = PenaltyBreakdown::default();

    for p in placements {
        let lesson = Lesson::of(problem, p.requirement);
        let class = problem.requirements[p.requirement].class;
        let cell = &mut class_rows[class * n + p.slot];
        if cell.is_none() {
            *cell = Some(lesson);
        }
        teacher_rows[p.teacher * n + p.slot] = true;
        per_day[p.requirement * n_days + problem.day_of(p.slot)] += 1;
        let start = problem.periods[problem.period_of(p.slot)].start;
        out.core_subject_after_morning += placement_cost(&w, lesson, start);
    }

    for rows in class_rows.chunks(n_periods.max(1)) {
        out += class_day_cost(&w, rows);
    }
    for rows in teacher_rows.chunks(n_periods.max(1)) {
        out += teacher_day_cost(&w, rows, &breaks);
    }
    for week in per_day.chunks(n_days.max(1)) {
        out.unbalanced_week += balance_cost(&w, week);
    }
    out
}

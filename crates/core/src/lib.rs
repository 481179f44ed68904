//! Timetable model, hard/soft constraint engine and diagnostics.
//!
//! Solvers plug in through [`Solver`]; [`generate_with`] wraps one in the
//! full validate, solve, assemble and diagnose pipeline.

pub mod availability;
pub mod cancel;
pub mod constraints;
pub mod diagnostics;
pub mod error;
pub mod problem;
pub mod schedule;
pub mod scoring;

use tracing::{info, warn};

pub use availability::{AvailabilityIndex, SlotMask};
pub use cancel::CancelToken;
pub use constraints::{validate_config, ConstraintEngine, HardViolation};
pub use error::{
    ConfigurationError, EntityKind, GenerateError, InputValidationError, ValidationErrorKind,
};
pub use problem::{Problem, Slot};
pub use schedule::{PartialSchedule, Placement, PlacementId};
pub use types::{
    Assignment, ConstraintConfig, DiagnosticsReport, Entities, GenerateOutput, SolveStats,
    Timetable, UnplacedUnit,
};

/// What a solver hands back: the placements it made and the units it gave
/// up on.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub schedule: PartialSchedule,
    pub unplaced: Vec<UnplacedUnit>,
    pub stats: SolveStats,
}

pub trait Solver: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Places as many lessons as it can without breaking a hard rule.
    /// Returns `Err(Cancelled)` if `cancel` fires mid-run.
    fn solve(
        &self,
        engine: &ConstraintEngine<'_>,
        cancel: &CancelToken,
    ) -> Result<SolveOutcome, GenerateError>;
}

/// Checks configuration and input without solving.
pub fn validate(entities: &Entities, config: &ConstraintConfig) -> Result<Problem, GenerateError> {
    validate_config(config, &entities.school)
        .inspect_err(|e| warn!(error = %e, "rejected configuration"))?;
    Problem::build(entities)
        .inspect_err(|errs| warn!(errors = errs.len(), "rejected input"))
        .map_err(GenerateError::from)
}

/// Runs `solver` over `entities` and reports on the result.
///
/// Configuration and input errors stop the run before any placement work.
/// Units the solver cannot place come back in `diagnostics.unplaced`
/// alongside a partial timetable.
pub fn generate_with<S: Solver + ?Sized>(
    solver: &S,
    entities: &Entities,
    config: &ConstraintConfig,
    cancel: &CancelToken,
) -> Result<GenerateOutput, GenerateError> {
    let problem = validate(entities, config)?;
    cancel.checkpoint()?;

    let index = AvailabilityIndex::build(&problem);
    let engine = ConstraintEngine::new(&problem, &index, config);
    info!(
        solver = solver.name(),
        school = %problem.school_id,
        units = problem.total_units(),
        "generating timetable"
    );
    let outcome = solver.solve(&engine, cancel)?;

    let timetable = assemble(&problem, &outcome.schedule);
    let mut diagnostics = diagnostics::diagnose(&problem, config, &timetable);
    diagnostics.unplaced = outcome.unplaced;
    diagnostics.stats = Some(outcome.stats);

    if diagnostics.unplaced.is_empty() {
        info!(
            lessons = timetable.len(),
            quality_score = diagnostics.quality_score,
            "timetable complete"
        );
    } else {
        warn!(
            lessons = timetable.len(),
            unplaced = diagnostics.unplaced.len(),
            "timetable is partial"
        );
    }
    Ok(GenerateOutput {
        timetable,
        diagnostics,
    })
}

/// Re-checks an existing timetable against `entities`.
pub fn explain(
    entities: &Entities,
    config: &ConstraintConfig,
    timetable: &Timetable,
) -> Result<DiagnosticsReport, GenerateError> {
    let problem = validate(entities, config)?;
    Ok(diagnostics::diagnose(&problem, config, timetable))
}

/// Turns a schedule into id-based assignments ordered by day, period,
/// class id and requirement id.
pub fn assemble(problem: &Problem, schedule: &PartialSchedule) -> Timetable {
    let mut placements: Vec<&Placement> = schedule.iter().map(|(_, p)| p).collect();
    placements.sort_by(|a, b| {
        let (ra, rb) = (
            &problem.requirements[a.requirement],
            &problem.requirements[b.requirement],
        );
        a.slot
            .cmp(&b.slot)
            .then_with(|| problem.classes[ra.class].id.cmp(&problem.classes[rb.class].id))
            .then_with(|| ra.id.cmp(&rb.id))
    });

    let assignments = placements
        .into_iter()
        .map(|p| {
            let req = &problem.requirements[p.requirement];
            Assignment {
                requirement_id: req.id.clone(),
                class_id: problem.classes[req.class].id.clone(),
                subject_id: problem.subjects[req.subject].id.clone(),
                teacher_id: problem.teachers[p.teacher].id.clone(),
                room_id: p.room.map(|r| problem.rooms[r].id.clone()),
                day: problem.days[problem.day_of(p.slot)],
                period_id: problem.periods[problem.period_of(p.slot)].id.clone(),
            }
        })
        .collect();

    let meta = &problem.meta;
    Timetable {
        school_id: problem.school_id.clone(),
        name: meta
            .name
            .clone()
            .unwrap_or_else(|| format!("{} timetable", problem.school_name)),
        academic_year: meta.academic_year.clone(),
        term: meta.term.clone(),
        start_date: meta.start_date.clone(),
        end_date: meta.end_date.clone(),
        is_active: meta.is_active,
        assignments,
    }
}

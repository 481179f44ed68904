use axum::Json;
use sched_core::{validate, GenerateError, Problem};
use serde::Serialize;
use types::GenerateRequest;

#[derive(Serialize, utoipa::ToSchema)]
pub struct ValidationReport {
    pub ok: bool,
    /// Lessons to place per week.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<u32>,
    /// Teachable slots per week, less the breaks reserved by
    /// `lunch_break_required`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots: Option<usize>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/v1/validate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Validation result", body = ValidationReport)
    )
)]
pub async fn validate_handler(Json(req): Json<GenerateRequest>) -> Json<ValidationReport> {
    let report = match validate(&req.entities, &req.config) {
        Ok(problem) => ValidationReport {
            ok: true,
            units: Some(problem.total_units()),
            slots: Some(teachable_slots(&problem, req.config.lunch_break_required)),
            errors: Vec::new(),
        },
        Err(GenerateError::InputValidation(errors)) => ValidationReport {
            ok: false,
            units: None,
            slots: None,
            errors: errors.iter().map(ToString::to_string).collect(),
        },
        Err(e) => ValidationReport {
            ok: false,
            units: None,
            slots: None,
            errors: vec![e.to_string()],
        },
    };
    Json(report)
}

fn teachable_slots(problem: &Problem, lunch_break_required: bool) -> usize {
    if !lunch_break_required {
        return problem.slot_count();
    }
    let breaks = problem.periods.iter().filter(|p| p.is_break).count();
    problem.slot_count() - breaks * problem.days.len()
}

use axum::Json;
use types::{DiagnosticsReport, ExplainRequest};

use crate::error::ApiError;

/// Re-checks a stored or hand-edited timetable.
#[utoipa::path(
    post,
    path = "/v1/explain",
    request_body = ExplainRequest,
    responses(
        (status = 200, description = "Conflicts and soft-penalty breakdown for the given timetable", body = DiagnosticsReport),
        (status = 400, description = "Malformed school data")
    )
)]
pub async fn explain(Json(req): Json<ExplainRequest>) -> Result<Json<DiagnosticsReport>, ApiError> {
    let report = sched_core::explain(&req.entities, &req.config, &req.timetable)?;
    Ok(Json(report))
}

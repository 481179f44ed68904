use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use jobs::{JobId, JobStatus, JobSummary};
use serde_json::json;
use types::GenerateRequest;

use crate::error::{generate_error_body, ApiError};
use crate::routes::generate::GenerateResponse;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/v1/jobs",
    request_body = GenerateRequest,
    responses((status = 202, description = "Job queued", body = JobSummary))
)]
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> (StatusCode, Json<JobSummary>) {
    let id = state.jobs.enqueue(req);
    (
        StatusCode::ACCEPTED,
        Json(JobSummary::new(id, &JobStatus::Queued)),
    )
}

#[utoipa::path(
    get,
    path = "/v1/jobs/{id}",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job status", body = JobSummary),
        (status = 404, description = "Unknown job")
    )
)]
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobSummary>, ApiError> {
    let id = JobId(id);
    let st = state.jobs.get(&id).ok_or_else(|| not_found(&id))?;
    Ok(Json(JobSummary::new(id, &st)))
}

#[utoipa::path(
    get,
    path = "/v1/jobs/{id}/result",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Generated timetable", body = GenerateResponse),
        (status = 202, description = "Still queued or running", body = JobSummary),
        (status = 404, description = "Unknown job"),
        (status = 409, description = "Job was cancelled")
    )
)]
pub async fn result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = JobId(id);
    let st = state.jobs.get(&id).ok_or_else(|| not_found(&id))?;
    let resp = match st {
        JobStatus::Done(output) => Json(GenerateResponse::from(*output)).into_response(),
        JobStatus::Queued | JobStatus::Running => {
            (StatusCode::ACCEPTED, Json(JobSummary::new(id, &st))).into_response()
        }
        JobStatus::Rejected(e) => {
            let (code, body) = generate_error_body(&e);
            (code, Json(body)).into_response()
        }
        JobStatus::Cancelled => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "cancelled", "message": format!("job {id} was cancelled") })),
        )
            .into_response(),
        JobStatus::Failed(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "internal", "message": message })),
        )
            .into_response(),
    };
    Ok(resp)
}

#[utoipa::path(
    post,
    path = "/v1/jobs/{id}/cancel",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Status after the cancellation request", body = JobSummary),
        (status = 404, description = "Unknown job")
    )
)]
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobSummary>, ApiError> {
    let id = JobId(id);
    let st = state.jobs.cancel(&id).ok_or_else(|| not_found(&id))?;
    Ok(Json(JobSummary::new(id, &st)))
}

#[utoipa::path(
    delete,
    path = "/v1/jobs/{id}",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job forgotten"),
        (status = 404, description = "Unknown job"),
        (status = 409, description = "Job is still queued or running")
    )
)]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = JobId(id);
    if state.jobs.remove(&id) {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let st = state.jobs.get(&id).ok_or_else(|| not_found(&id))?;
    Ok((
        StatusCode::CONFLICT,
        Json(json!({ "error": "job_active", "message": format!("job {id} is {}", st.label()) })),
    )
        .into_response())
}

fn not_found(id: &JobId) -> ApiError {
    ApiError::NotFound(format!("no job {id}"))
}

use anyhow::Context;
use axum::Json;
use serde::{Deserialize, Serialize};
use types::{GenerateOutput, GenerateRequest};
use utoipa::ToSchema;

use crate::error::ApiError;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct GenerateResponse {
    /// `complete` or `partial`.
    pub status: String,
    #[serde(flatten)]
    pub output: GenerateOutput,
}

impl From<GenerateOutput> for GenerateResponse {
    fn from(output: GenerateOutput) -> Self {
        let status = if output.diagnostics.unplaced.is_empty() {
            "complete"
        } else {
            "partial"
        };
        Self {
            status: status.into(),
            output,
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Complete or partial timetable with diagnostics", body = GenerateResponse),
        (status = 400, description = "Malformed school data"),
        (status = 422, description = "Constraint configuration cannot be honoured")
    )
)]
pub async fn generate(Json(req): Json<GenerateRequest>) -> Result<Json<GenerateResponse>, ApiError> {
    let output = tokio::task::spawn_blocking(move || solver_heur::generate(&req.entities, &req.config))
        .await
        .context("generation worker panicked")??;
    Ok(Json(output.into()))
}

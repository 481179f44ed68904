use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use sched_core::GenerateError;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    Generate(GenerateError),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<GenerateError> for ApiError {
    fn from(e: GenerateError) -> Self {
        ApiError::Generate(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

/// Status code and JSON body for a rejected run.
pub fn generate_error_body(e: &GenerateError) -> (StatusCode, serde_json::Value) {
    match e {
        GenerateError::Configuration(c) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": "configuration_error", "message": c.to_string() }),
        ),
        GenerateError::InputValidation(errors) => (
            StatusCode::BAD_REQUEST,
            json!({ "error": "input_validation", "message": e.to_string(), "errors": errors }),
        ),
        GenerateError::Cancelled => (
            StatusCode::CONFLICT,
            json!({ "error": "cancelled", "message": e.to_string() }),
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Generate(e) => generate_error_body(&e),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "not_found", "message": what }),
            ),
            ApiError::Internal(e) => {
                tracing::error!(error = ?e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal", "message": format!("{e:#}") }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

mod error;
mod settings;
mod state;
mod telemetry;
pub mod routes {
    pub mod explain;
    pub mod generate;
    pub mod health;
    pub mod jobs;
    pub mod validate;
}

use axum::{
    routing::{get, post},
    Router,
};
use settings::Settings;
use state::AppState;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
        paths(
            routes::health::health,
            routes::generate::generate,
            routes::validate::validate_handler,
            routes::explain::explain,
            routes::jobs::submit,
            routes::jobs::status,
            routes::jobs::result,
            routes::jobs::cancel,
            routes::jobs::remove,
        ),
        components(schemas(
            types::Entities, types::School, types::Period, types::Subject, types::Teacher,
            types::ClassGroup, types::Classroom, types::LessonRequirement,
            types::AvailabilityRecord, types::TimetableMeta, types::Day,
            types::SchoolId, types::PeriodId, types::SubjectId, types::TeacherId,
            types::ClassId, types::RoomId, types::RequirementId,
            types::ConstraintConfig, types::SoftRule, types::MaxConsecutiveRule,
            types::SearchParams, types::WizardConstraints,
            types::GenerateRequest, types::ExplainRequest,
            types::Timetable, types::Assignment, types::GenerateOutput,
            types::DiagnosticsReport, types::Conflict, types::ConflictKind, types::Severity,
            types::PenaltyBreakdown, types::UnplacedUnit, types::SolveStats,
            jobs::JobId, jobs::JobSummary,
            routes::generate::GenerateResponse,
            routes::validate::ValidationReport,
        )),
        tags(
            (name = "timetable", description = "School timetable generation API")
        )
    )]
struct ApiDoc;

fn app(state: AppState, settings: &Settings) -> Router {
    Router::new()
        .route("/v1/health", get(routes::health::health))
        .route("/v1/generate", post(routes::generate::generate))
        .route("/v1/validate", post(routes::validate::validate_handler))
        .route("/v1/explain", post(routes::explain::explain))
        .route("/v1/jobs", post(routes::jobs::submit))
        .route(
            "/v1/jobs/:id",
            get(routes::jobs::status).delete(routes::jobs::remove),
        )
        .route("/v1/jobs/:id/result", get(routes::jobs::result))
        .route("/v1/jobs/:id/cancel", post(routes::jobs::cancel))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(telemetry::stack(&settings.http))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    telemetry::init_tracing(settings.log_format)?;

    let addr = settings.listen_addr()?;
    let state = AppState::new(solver_heur::HeurSolver::new(), settings.job_retention);
    let app = app(state, &settings);
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

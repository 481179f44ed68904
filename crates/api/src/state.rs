use std::sync::Arc;
use std::time::Duration;

use jobs::InMemJobs;
use solver_heur::HeurSolver;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<InMemJobs<HeurSolver>>,
}

impl AppState {
    pub fn new(solver: HeurSolver, job_retention: Duration) -> Self {
        Self {
            jobs: Arc::new(InMemJobs::with_retention(solver, job_retention)),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(HeurSolver::new(), jobs::DEFAULT_RETENTION)
    }
}

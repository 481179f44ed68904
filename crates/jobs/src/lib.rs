//! In-memory background generation jobs with polling and cancellation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use parking_lot::RwLock;
use sched_core::{generate_with, CancelToken, GenerateError, Solver};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use types::{GenerateOutput, GenerateRequest};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub enum JobStatus {
    Queued,
    Running,
    Done(Box<GenerateOutput>),
    /// Configuration or input was rejected before any placement.
    Rejected(GenerateError),
    Cancelled,
    /// The worker itself died.
    Failed(String),
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done(out) if out.diagnostics.unplaced.is_empty() => "completed",
            JobStatus::Done(_) => "partial",
            JobStatus::Rejected(_) => "rejected",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed(_) => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, JobStatus::Queued | JobStatus::Running)
    }
}

/// Wire view of a job for status polling.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobSummary {
    pub id: JobId,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobSummary {
    pub fn new(id: JobId, status: &JobStatus) -> Self {
        let message = match status {
            JobStatus::Rejected(e) => Some(e.to_string()),
            JobStatus::Failed(m) => Some(m.clone()),
            JobStatus::Done(out) if !out.diagnostics.unplaced.is_empty() => Some(format!(
                "{} lesson(s) could not be placed",
                out.diagnostics.unplaced.len()
            )),
            _ => None,
        };
        Self {
            id,
            status: status.label().to_owned(),
            message,
        }
    }
}

/// How long a finished job stays pollable unless configured otherwise.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

struct Entry {
    status: JobStatus,
    cancel: CancelToken,
    finished_at: Option<Instant>,
}

type Table = Arc<RwLock<HashMap<JobId, Entry>>>;

pub struct InMemJobs<S: Solver> {
    inner: Table,
    solver: Arc<S>,
    retention: Duration,
}

impl<S: Solver> Clone for InMemJobs<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            solver: self.solver.clone(),
            retention: self.retention,
        }
    }
}

impl<S: Solver> InMemJobs<S> {
    pub fn new(solver: S) -> Self {
        Self::with_retention(solver, DEFAULT_RETENTION)
    }

    /// Finished jobs older than `retention` are dropped the next time a job
    /// is enqueued.
    pub fn with_retention(solver: S, retention: Duration) -> Self {
        Self {
            inner: Default::default(),
            solver: Arc::new(solver),
            retention,
        }
    }

    /// Starts a generation run in the background. Must be called from
    /// within a tokio runtime.
    pub fn enqueue(&self, req: GenerateRequest) -> JobId {
        self.purge_expired();
        let id = JobId(Uuid::new_v4().to_string());
        let cancel = CancelToken::new();
        self.inner.write().insert(
            id.clone(),
            Entry {
                status: JobStatus::Queued,
                cancel: cancel.clone(),
                finished_at: None,
            },
        );
        info!(job = %id, school = %req.entities.school.id, "job queued");

        let table = self.inner.clone();
        let solver = self.solver.clone();
        let job = id.clone();
        tokio::spawn(async move {
            if !set_status_if(&table, &job, JobStatus::Running, |s| {
                matches!(s, JobStatus::Queued)
            }) {
                return;
            }
            let status = match run(solver, req, cancel).await {
                Ok(Ok(output)) => JobStatus::Done(Box::new(output)),
                Ok(Err(GenerateError::Cancelled)) => JobStatus::Cancelled,
                Ok(Err(e)) => {
                    warn!(job = %job, error = %e, "job rejected");
                    JobStatus::Rejected(e)
                }
                Err(e) => {
                    error!(job = %job, error = ?e, "job failed");
                    JobStatus::Failed(format!("{e:#}"))
                }
            };
            info!(job = %job, status = status.label(), "job finished");
            set_status_if(&table, &job, status, |_| true);
        });

        id
    }

    pub fn get(&self, id: &JobId) -> Option<JobStatus> {
        self.inner.read().get(id).map(|e| e.status.clone())
    }

    /// Requests cancellation. A queued job is cancelled at once, a running
    /// one at its next checkpoint; finished jobs are left as they are.
    /// Returns `None` for unknown ids.
    pub fn cancel(&self, id: &JobId) -> Option<JobStatus> {
        let mut table = self.inner.write();
        let entry = table.get_mut(id)?;
        if !entry.status.is_finished() {
            entry.cancel.cancel();
            if matches!(entry.status, JobStatus::Queued) {
                entry.status = JobStatus::Cancelled;
                entry.finished_at = Some(Instant::now());
            }
            info!(job = %id, "cancellation requested");
        }
        Some(entry.status.clone())
    }

    /// Forgets a finished job. Jobs still queued or running are kept and
    /// `false` is returned, as for unknown ids.
    pub fn remove(&self, id: &JobId) -> bool {
        let mut table = self.inner.write();
        match table.get(id) {
            Some(entry) if entry.status.is_finished() => {
                table.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Drops finished jobs past the retention window; returns how many.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut table = self.inner.write();
        let before = table.len();
        table.retain(|_, e| {
            e.finished_at
                .map_or(true, |at| now.duration_since(at) < self.retention)
        });
        let purged = before - table.len();
        if purged > 0 {
            debug!(purged, "expired jobs dropped");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn run<S: Solver>(
    solver: Arc<S>,
    req: GenerateRequest,
    cancel: CancelToken,
) -> anyhow::Result<Result<GenerateOutput, GenerateError>> {
    tokio::task::spawn_blocking(move || {
        generate_with(solver.as_ref(), &req.entities, &req.config, &cancel)
    })
    .await
    .context("generation worker panicked")
}

fn set_status_if(
    table: &Table,
    id: &JobId,
    status: JobStatus,
    pred: impl FnOnce(&JobStatus) -> bool,
) -> bool {
    match table.write().get_mut(id) {
        Some(entry) if pred(&entry.status) => {
            if status.is_finished() {
                entry.finished_at = Some(Instant::now());
            }
            entry.status = status;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::{ConstraintEngine, SolveOutcome};
    use types::*;

    fn request() -> GenerateRequest {
        let period = |id: &str, h: u16| Period {
            id: PeriodId::from(id),
            name: id.into(),
            start: ClockTime::from_hm(h, 0),
            end: ClockTime::from_hm(h, 45),
            is_break: false,
        };
        GenerateRequest {
            entities: Entities {
                school: School {
                    id: SchoolId::from("s1"),
                    name: "Hillside".into(),
                    address: None,
                    contact_email: None,
                    contact_phone: None,
                    days: vec![Day::Mon, Day::Tue],
                    periods: vec![period("p1", 8), period("p2", 9)],
                },
                subjects: vec![Subject {
                    id: SubjectId::from("math"),
                    name: "Math".into(),
                    code: None,
                    color: None,
                    description: None,
                    weekly_periods: 2,
                    is_core: true,
                    is_difficult: false,
                }],
                teachers: vec![Teacher {
                    id: TeacherId::from("t1"),
                    name: "Ada".into(),
                    email: None,
                    phone: None,
                    employee_id: None,
                    subjects: Vec::new(),
                }],
                classes: vec![ClassGroup {
                    id: ClassId::from("7A"),
                    name: "7A".into(),
                    grade_level: None,
                    student_count: None,
                }],
                classrooms: Vec::new(),
                requirements: Vec::new(),
                availability: Vec::new(),
                meta: TimetableMeta::default(),
            },
            config: ConstraintConfig::default(),
        }
    }

    /// Spins until cancelled.
    struct Stubborn;

    impl Solver for Stubborn {
        fn name(&self) -> &'static str {
            "stubborn"
        }

        fn solve(
            &self,
            _engine: &ConstraintEngine<'_>,
            cancel: &CancelToken,
        ) -> Result<SolveOutcome, GenerateError> {
            loop {
                cancel.checkpoint()?;
                std::thread::sleep(Duration::from_millis(2));
            }
        }
    }

    async fn wait_finished<S: Solver>(jobs: &InMemJobs<S>, id: &JobId) -> JobStatus {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let status = jobs.get(id).expect("job exists");
                if status.is_finished() {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job finished in time")
    }

    #[tokio::test]
    async fn runs_to_completion() {
        let jobs = InMemJobs::new(solver_heur::HeurSolver::new());
        let id = jobs.enqueue(request());
        match wait_finished(&jobs, &id).await {
            JobStatus::Done(out) => assert_eq!(out.timetable.len(), 2),
            other => panic!("unexpected status {other:?}"),
        }
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn bad_config_is_rejected() {
        let jobs = InMemJobs::new(solver_heur::HeurSolver::new());
        let mut req = request();
        req.config.lunch_break_required = true;
        let id = jobs.enqueue(req);
        let status = wait_finished(&jobs, &id).await;
        assert_eq!(status.label(), "rejected");
        let summary = JobSummary::new(id, &status);
        assert!(summary.message.unwrap().contains("break period"));
    }

    #[tokio::test]
    async fn running_job_can_be_cancelled() {
        let jobs = InMemJobs::new(Stubborn);
        let id = jobs.enqueue(request());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(jobs.cancel(&id).is_some());
        assert!(matches!(wait_finished(&jobs, &id).await, JobStatus::Cancelled));
        // cancelling again leaves the final state alone
        assert!(matches!(jobs.cancel(&id), Some(JobStatus::Cancelled)));
    }

    #[tokio::test]
    async fn unknown_jobs() {
        let jobs = InMemJobs::new(Stubborn);
        let ghost = JobId("nope".into());
        assert!(jobs.get(&ghost).is_none());
        assert!(jobs.cancel(&ghost).is_none());
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn finished_jobs_expire_and_can_be_removed() {
        let jobs = InMemJobs::with_retention(solver_heur::HeurSolver::new(), Duration::ZERO);
        let first = jobs.enqueue(request());
        wait_finished(&jobs, &first).await;
        assert_eq!(jobs.len(), 1);

        // the next submission sweeps the finished one out
        let second = jobs.enqueue(request());
        assert!(jobs.get(&first).is_none());
        wait_finished(&jobs, &second).await;
        assert!(jobs.remove(&second));
        assert!(!jobs.remove(&second));
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn running_jobs_are_never_dropped() {
        let jobs = InMemJobs::with_retention(Stubborn, Duration::ZERO);
        let id = jobs.enqueue(request());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(jobs.purge_expired(), 0);
        assert!(!jobs.remove(&id));
        assert!(jobs.get(&id).is_some());
        jobs.cancel(&id);
        wait_finished(&jobs, &id).await;
        assert!(jobs.remove(&id));
    }
}

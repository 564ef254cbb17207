//! Job state machine
//!
//! A `Job` is one execution request. It is shared between the registry,
//! the service and the worker thread running it, so every mutable field
//! lives behind a per-job lock. Output buffers have their own locks and can
//! be read while the script is still writing.
//!
//! CREATED -> SUBMITTED -> RUNNING -> {SUCCESSFUL, UNSUCCESSFUL, REJECTED},
//! with CANCELLED reachable from SUBMITTED or RUNNING.

use chrono::{DateTime, Utc};
use lunar_core::domain::job::{FailureInfo, FailureKind, JobStatus};
use lunar_core::dto::job::JobSnapshot;
use lunar_lua::{CancelToken, ConsoleOutput, ScriptEngine};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, info, warn};

use crate::error::JobError;
use crate::execution::output::OutputBuffer;
use crate::execution::pool::{TaskHandle, WorkerPool};

/// Fields guarded by the per-job lock
#[derive(Debug)]
struct JobState {
    status: JobStatus,
    finished_at: Option<DateTime<Utc>>,
    result_value: Option<String>,
    failure: Option<FailureInfo>,
    handle: Option<TaskHandle>,
}

impl JobState {
    fn is_cancellable(&self) -> bool {
        !self.status.is_terminal() && self.handle.as_ref().is_some_and(|h| !h.is_done())
    }
}

/// One code-execution request and its lifecycle
#[derive(Debug)]
pub struct Job {
    id: OnceLock<u64>,
    code: String,
    scheduled_at: DateTime<Utc>,
    stdout: OutputBuffer,
    stderr: OutputBuffer,
    state: Mutex<JobState>,
}

impl Job {
    /// Creates a job in CREATED state with no id bound
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            id: OnceLock::new(),
            code: code.into(),
            scheduled_at: Utc::now(),
            stdout: OutputBuffer::new(),
            stderr: OutputBuffer::new(),
            state: Mutex::new(JobState {
                status: JobStatus::Created,
                finished_at: None,
                result_value: None,
                failure: None,
                handle: None,
            }),
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.id.get().copied()
    }

    /// Binds the registry-assigned id
    ///
    /// An id can be bound only once.
    pub fn assign_id(&self, id: u64) -> Result<(), JobError> {
        self.id.set(id).map_err(|rejected| {
            JobError::InvariantViolation(format!(
                "job already has id {:?}, can't assign {}",
                self.id(),
                rejected
            ))
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    pub fn status(&self) -> JobStatus {
        self.lock_state().status
    }

    pub fn is_cancellable(&self) -> bool {
        self.lock_state().is_cancellable()
    }

    fn lock_state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands the job to the worker pool
    ///
    /// The job lock is held while the task is scheduled, so the worker can't
    /// observe the job before it is SUBMITTED.
    pub fn submit(
        self: &Arc<Self>,
        pool: &WorkerPool,
        engine: Arc<dyn ScriptEngine>,
    ) -> Result<(), JobError> {
        let mut state = self.lock_state();

        if state.handle.is_some() || state.status != JobStatus::Created {
            return Err(JobError::InvariantViolation(format!(
                "job {:?} was already submitted (status {})",
                self.id(),
                state.status
            )));
        }

        let job = Arc::clone(self);
        let handle = pool.submit(move |token| job.run(engine.as_ref(), &token));

        state.handle = Some(handle);
        state.status = JobStatus::Submitted;
        debug!("Job {:?} submitted", self.id());

        Ok(())
    }

    /// Executes the job on the current thread
    ///
    /// Called by the worker pool. Failures are recorded on the job and never
    /// returned to the caller.
    pub(crate) fn run(&self, engine: &dyn ScriptEngine, token: &CancelToken) {
        {
            let mut state = self.lock_state();
            if state.status != JobStatus::Submitted {
                debug!(
                    "Job {:?} not started, status is {}",
                    self.id(),
                    state.status
                );
                return;
            }
            state.status = JobStatus::Running;
        }
        debug!("Job {:?} running", self.id());

        let output = ConsoleOutput::new(self.stdout.clone(), self.stderr.clone());
        let outcome = engine.execute(&self.code, output, token);

        let mut state = self.lock_state();
        if state.status == JobStatus::Cancelled {
            debug!("Job {:?} was cancelled, discarding its outcome", self.id());
            return;
        }

        match outcome {
            Ok(value) => {
                state.result_value = Some(value);
                state.finished_at = Some(Utc::now());
                state.status = JobStatus::Successful;
            }
            Err(failure) if failure.is_cancellation() => {
                state.status = JobStatus::Cancelled;
            }
            Err(failure) => {
                warn!("Job {:?} failed: {}", self.id(), failure);
                state.status = match failure.kind {
                    FailureKind::Syntax => JobStatus::Rejected,
                    FailureKind::Runtime | FailureKind::Memory => JobStatus::Unsuccessful,
                };
                state.failure = Some(failure.into_failure_info());
                state.finished_at = Some(Utc::now());
            }
        }

        info!("Job {:?} finished with status {}", self.id(), state.status);
    }

    /// Requests cancellation of a submitted or running job
    ///
    /// Returns false when the job is already terminal, was never submitted,
    /// or its task refused the cancellation.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock_state();

        if state.status.is_terminal() {
            return false;
        }

        let Some(handle) = state.handle.as_ref() else {
            return false;
        };

        if !handle.cancel(true) {
            return false;
        }

        state.status = JobStatus::Cancelled;
        info!("Job {:?} cancelled", self.id());
        true
    }

    /// Copies every observable field into an immutable snapshot
    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.lock_state();

        JobSnapshot {
            id: self.id(),
            status: state.status,
            code: self.code.clone(),
            scheduled_at: self.scheduled_at,
            finished_at: state.finished_at,
            result_value: state.result_value.clone(),
            stdout: self.stdout.contents(),
            stderr: self.stderr.contents(),
            failure_info: state.failure.clone(),
            cancellable: state.is_cancellable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunar_lua::{LuaEngine, NO_VALUE};
    use std::time::Duration;
    use tokio::runtime::Handle;

    fn setup() -> (WorkerPool, Arc<dyn ScriptEngine>) {
        let pool = WorkerPool::new(Handle::current(), 2);
        let engine: Arc<dyn ScriptEngine> = Arc::new(LuaEngine::default());
        (pool, engine)
    }

    async fn wait_for(job: &Job, status: JobStatus) -> JobSnapshot {
        for _ in 0..200 {
            let snapshot = job.snapshot();
            if snapshot.status == status {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job never reached {}", status);
    }

    #[test]
    fn test_new_job_is_created_without_id() {
        let job = Job::new("return 1");
        let snapshot = job.snapshot();

        assert_eq!(snapshot.id, None);
        assert_eq!(snapshot.status, JobStatus::Created);
        assert_eq!(snapshot.code, "return 1");
        assert!(snapshot.finished_at.is_none());
        assert!(!snapshot.cancellable);
    }

    #[test]
    fn test_id_is_assigned_once() {
        let job = Job::new("return 1");
        job.assign_id(7).unwrap();

        let err = job.assign_id(8).unwrap_err();
        assert!(matches!(err, JobError::InvariantViolation(_)));
        assert_eq!(job.id(), Some(7));
    }

    #[test]
    fn test_cancel_without_handle_fails() {
        let job = Job::new("return 1");
        assert!(!job.cancel());
        assert_eq!(job.status(), JobStatus::Created);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_successful_run() {
        let (pool, engine) = setup();
        let job = Arc::new(Job::new("console.log('x') return 2 * 2"));

        job.submit(&pool, engine).unwrap();
        let snapshot = wait_for(&job, JobStatus::Successful).await;

        assert_eq!(snapshot.result_value.as_deref(), Some("4"));
        assert_eq!(snapshot.stdout, "x\n");
        assert!(snapshot.finished_at.is_some());
        assert!(snapshot.failure_info.is_none());
        assert!(!snapshot.cancellable);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_value_run() {
        let (pool, engine) = setup();
        let job = Arc::new(Job::new("local i = nil"));

        job.submit(&pool, engine).unwrap();
        let snapshot = wait_for(&job, JobStatus::Successful).await;

        assert_eq!(snapshot.result_value.as_deref(), Some(NO_VALUE));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_double_submit_fails() {
        let (pool, engine) = setup();
        let job = Arc::new(Job::new("return 1"));

        job.submit(&pool, Arc::clone(&engine)).unwrap();
        let err = job.submit(&pool, engine).unwrap_err();

        assert!(matches!(err, JobError::InvariantViolation(_)));
        wait_for(&job, JobStatus::Successful).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_runtime_error_is_unsuccessful() {
        let (pool, engine) = setup();
        let job = Arc::new(Job::new("error('boom')"));

        job.submit(&pool, engine).unwrap();
        let snapshot = wait_for(&job, JobStatus::Unsuccessful).await;

        let failure = snapshot.failure_info.unwrap();
        assert_eq!(failure.kind, FailureKind::Runtime);
        assert!(failure.message.contains("boom"));
        assert!(snapshot.result_value.is_none());
        assert!(snapshot.finished_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_syntax_error_is_rejected() {
        let (pool, engine) = setup();
        let job = Arc::new(Job::new("return ("));

        job.submit(&pool, engine).unwrap();
        let snapshot = wait_for(&job, JobStatus::Rejected).await;

        assert_eq!(snapshot.failure_info.unwrap().kind, FailureKind::Syntax);
        assert!(snapshot.result_value.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_running_job() {
        let (pool, engine) = setup();
        let job = Arc::new(Job::new("while true do end"));

        job.submit(&pool, engine).unwrap();
        wait_for(&job, JobStatus::Running).await;
        assert!(job.is_cancellable());

        assert!(job.cancel());
        assert!(!job.cancel());

        // The worker observes the cancellation and leaves the status alone.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert!(snapshot.finished_at.is_none());
        assert!(snapshot.result_value.is_none());
        assert!(snapshot.failure_info.is_none());
        assert!(!snapshot.cancellable);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_terminal_job_fails() {
        let (pool, engine) = setup();
        let job = Arc::new(Job::new("return 'done'"));

        job.submit(&pool, engine).unwrap();
        let before = wait_for(&job, JobStatus::Successful).await;

        assert!(!job.cancel());
        assert_eq!(job.snapshot(), before);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_snapshot_is_detached() {
        let (pool, engine) = setup();
        let job = Arc::new(Job::new("while true do end"));

        job.submit(&pool, engine).unwrap();
        let running = wait_for(&job, JobStatus::Running).await;

        assert!(job.cancel());
        assert_eq!(running.status, JobStatus::Running);
        assert!(running.cancellable);
    }
}

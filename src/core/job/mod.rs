//! Lifecycle of one long-running backend operation.
//!
//! A [`Job`] owns the status of a panel's operation and the log buffer it writes to.
//! [`Job::begin`] hands out a [`JobHandle`] for one run; the handle races the backend future
//! against its cancellation token and records the final status. Cancelling sets the job back to
//! idle at once, so a late settlement of the cancelled run is ignored.

pub mod types;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::logstream::LogBuffer;

pub use types::{JobError, JobStatus, Settlement};

pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    match from {
        JobStatus::Idle => matches!(to, JobStatus::Idle | JobStatus::Running),
        JobStatus::Running => matches!(
            to,
            JobStatus::Success | JobStatus::Error | JobStatus::Idle
        ),
        JobStatus::Success | JobStatus::Error => {
            matches!(to, JobStatus::Running | JobStatus::Idle)
        }
    }
}

struct JobState {
    status: JobStatus,
    run_id: u64,
    token: Option<CancellationToken>,
    cancel_requested: bool,
}

#[derive(Clone)]
pub struct Job {
    name: Arc<str>,
    state: Arc<Mutex<JobState>>,
    status_tx: Arc<watch::Sender<JobStatus>>,
    logs: LogBuffer,
}

impl Job {
    pub fn new(name: &str, logs: LogBuffer) -> Self {
        let (status_tx, _) = watch::channel(JobStatus::Idle);
        Self {
            name: Arc::from(name),
            state: Arc::new(Mutex::new(JobState {
                status: JobStatus::Idle,
                run_id: 0,
                token: None,
                cancel_requested: false,
            })),
            status_tx: Arc::new(status_tx),
            logs,
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn is_running(&self) -> bool {
        self.status() == JobStatus::Running
    }

    pub fn watch(&self) -> watch::Receiver<JobStatus> {
        self.status_tx.subscribe()
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    fn transition(&self, state: &mut JobState, to: JobStatus) -> bool {
        if !can_transition(state.status, to) {
            return false;
        }
        debug!("Job '{}' {} -> {}", self.name, state.status, to);
        state.status = to;
        self.status_tx.send_replace(to);
        true
    }

    /// Enter `running` for a new run. Clears the log buffer.
    pub fn begin(&self) -> Result<JobHandle, JobError> {
        let mut state = self.lock();
        if state.status == JobStatus::Running || !self.transition(&mut state, JobStatus::Running) {
            return Err(JobError::AlreadyRunning);
        }
        state.run_id += 1;
        state.cancel_requested = false;
        let token = CancellationToken::new();
        state.token = Some(token.clone());
        self.logs.clear();
        info!("Job '{}' started (run {})", self.name, state.run_id);

        Ok(JobHandle {
            job: self.clone(),
            run_id: state.run_id,
            token,
        })
    }

    /// Request cancellation of the current run. Returns false when nothing is running.
    ///
    /// The job is idle when this returns and stream lines for the cancelled run are discarded.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        if state.status != JobStatus::Running {
            return false;
        }
        state.cancel_requested = true;
        if let Some(token) = state.token.take() {
            token.cancel();
        }
        self.logs.close_stream();
        self.transition(&mut state, JobStatus::Idle);
        info!("Job '{}' cancelled (run {})", self.name, state.run_id);
        true
    }

    /// Whether the most recent run was cancelled.
    pub fn cancel_requested(&self) -> bool {
        self.lock().cancel_requested
    }

    /// Stop tracking the current run without recording a result. The call itself is left to
    /// finish.
    pub fn detach(&self) {
        let mut state = self.lock();
        state.run_id += 1;
        state.token = None;
        if state.status == JobStatus::Running {
            self.transition(&mut state, JobStatus::Idle);
        }
    }

    fn finish(&self, run_id: u64, to: JobStatus) -> bool {
        let mut state = self.lock();
        if state.run_id != run_id || state.status != JobStatus::Running {
            return false;
        }
        state.token = None;
        self.transition(&mut state, to)
    }
}

/// One run of a [`Job`]. Dropping an unfinished handle returns the job to idle.
pub struct JobHandle {
    job: Job,
    run_id: u64,
    token: CancellationToken,
}

impl JobHandle {
    /// Whether this run is still the job's current, uncancelled run.
    pub fn is_current(&self) -> bool {
        let state = self.job.lock();
        state.run_id == self.run_id
            && state.status == JobStatus::Running
            && !self.token.is_cancelled()
    }

    /// Drive `work` until it settles or the run is cancelled.
    pub async fn race<T, E, F>(&self, work: F) -> Settlement<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        if self.token.is_cancelled() {
            return Settlement::Cancelled;
        }
        let settlement = tokio::select! {
            biased;
            _ = self.token.cancelled() => Settlement::Cancelled,
            result = work => Settlement::from(result),
        };
        // A rejection that lands after cancel was requested still counts as cancelled.
        if self.token.is_cancelled() {
            Settlement::Cancelled
        } else {
            settlement
        }
    }

    /// Record the final status of an uncancelled run. Returns false when the run is stale.
    pub fn complete(self, status: JobStatus) -> bool {
        let to = match status {
            JobStatus::Success | JobStatus::Error => status,
            _ => JobStatus::Idle,
        };
        self.job.finish(self.run_id, to)
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.job.finish(self.run_id, JobStatus::Idle);
    }
}

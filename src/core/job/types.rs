use crate::core::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running,
    Success,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "idle" => Some(JobStatus::Idle),
            "running" => Some(JobStatus::Running),
            "success" => Some(JobStatus::Success),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-way result of racing a call against its cancellation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T, E> {
    Ok(T),
    Err(E),
    Cancelled,
}

impl<T, E> Settlement<T, E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Settlement::Cancelled)
    }
}

impl<T, E> From<Result<T, E>> for Settlement<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Settlement::Ok(value),
            Err(err) => Settlement::Err(err),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("An operation is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

//! Action panels: one form, one job and one log view per backend operation.

pub mod catalog;
pub mod notify;
pub mod profile;

use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::core::backend::{Backend, BackendError, Outcome};
use crate::core::job::{Job, JobError, JobHandle, JobStatus, Settlement};
use crate::core::logstream::{EventBus, LogBuffer, LogLevel, Subscription, format_log_message};
use crate::core::vault::{CredentialEntry, SharedVault};

pub use catalog::{CATALOG, FieldKind, FieldSpec, OperationKind};
pub use notify::{Notification, NotificationKind, Notifier};
pub use profile::{ProfileError, TokenInfo, resolve_profile};

/// Everything a panel is wired to. Cloned into each panel.
#[derive(Clone)]
pub struct PanelContext {
    pub vault: SharedVault,
    pub backend: Arc<dyn Backend>,
    pub bus: EventBus,
    pub notifier: Notifier,
}

pub struct ActionPanel {
    op: &'static OperationKind,
    ctx: PanelContext,
    job: Job,
    subscriptions: HashMap<&'static str, Subscription>,
    /// Run of a started session, held until it is stopped.
    live: Arc<Mutex<Option<JobHandle>>>,
}

impl ActionPanel {
    pub fn new(op: &'static OperationKind, ctx: PanelContext) -> Self {
        Self {
            op,
            job: Job::new(op.command, LogBuffer::new()),
            ctx,
            subscriptions: HashMap::new(),
            live: Arc::new(Mutex::new(None)),
        }
    }

    pub fn operation(&self) -> &'static OperationKind {
        self.op
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn logs(&self) -> &LogBuffer {
        self.job.logs()
    }

    pub fn status(&self) -> JobStatus {
        self.job.status()
    }

    /// The primary action is disabled while a run is in flight.
    pub fn can_submit(&self) -> bool {
        !self.job.is_running()
    }

    /// The credential the next submission will use, as shown to the user.
    pub fn active_entry(&self) -> Option<CredentialEntry> {
        self.ctx.vault.entries().into_iter().find(|e| e.active)
    }

    /// Start listening on the operation's log channel. Mounting again rebinds the channel.
    pub fn mount(&mut self) {
        if let Some(channel) = self.op.channel {
            let subscription = self.ctx.bus.subscribe(channel, self.job.logs().clone());
            // Replacing drops, and so releases, any previous binding.
            self.subscriptions.insert(channel, subscription);
        }
    }

    /// Release subscriptions and stop tracking an in-flight run.
    pub fn unmount(&mut self) {
        self.subscriptions.clear();
        self.job.detach();
        take_live(&self.live);
    }

    /// A session operation whose start call succeeded and has not been stopped.
    pub fn is_live(&self) -> bool {
        lock_live(&self.live)
            .as_ref()
            .is_some_and(JobHandle::is_current)
    }

    pub fn canceller(&self) -> PanelCanceller {
        PanelCanceller {
            op: self.op,
            job: self.job.clone(),
            backend: self.ctx.backend.clone(),
            notifier: self.ctx.notifier.clone(),
            live: self.live.clone(),
        }
    }

    pub async fn cancel(&self) -> bool {
        self.canceller().cancel().await
    }

    pub async fn stop(&self) -> bool {
        self.canceller().stop().await
    }

    /// Validate `form`, run the operation and settle the job.
    ///
    /// Validation failures never reach the backend and leave the job untouched.
    pub async fn submit(
        &self,
        form: &HashMap<String, String>,
    ) -> Result<Settlement<Outcome, BackendError>, JobError> {
        if !self.can_submit() {
            return Err(JobError::AlreadyRunning);
        }

        let credential = self.ctx.vault.active();
        let args = match self.op.build_args(credential.as_ref(), form) {
            Ok(args) => args,
            Err(e) => {
                self.ctx.notifier.error(self.op.title, e.to_string());
                return Err(e.into());
            }
        };

        let handle = self.job.begin()?;
        let emitter = self.op.channel.map(|c| self.ctx.bus.emitter(c));
        info!(
            "Running '{}' with credential {}",
            self.op.command,
            credential.as_ref().map(|c| c.mask()).unwrap_or_else(|| "-".into())
        );

        let settlement = handle
            .race(self.ctx.backend.invoke(self.op.command, args, emitter))
            .await;

        if !handle.is_current() {
            // Cancelled or unmounted; the result no longer belongs to any view.
            return Ok(settlement);
        }

        let status = match &settlement {
            Settlement::Ok(outcome) if self.op.rejects(outcome) => {
                warn!("'{}' reported failure: {}", self.op.command, outcome.message);
                self.ctx.notifier.error(self.op.title, outcome.message.clone());
                Some(JobStatus::Error)
            }
            Settlement::Ok(outcome) => match self.op.session {
                Some(session) => {
                    info!("'{}' is live until '{}'", self.op.command, session.stop_command);
                    self.job
                        .logs()
                        .push(format_log_message(LogLevel::Success, session.started));
                    self.ctx
                        .notifier
                        .success(self.op.title, notice(outcome, session.started));
                    None
                }
                None => {
                    if self.op.command == profile::TOKEN_INFO_COMMAND
                        && let Some(credential) = &credential
                        && let Ok(info) = TokenInfo::parse(&outcome.message)
                    {
                        self.ctx.vault.set_profile(credential.expose(), info.profile());
                    }
                    self.ctx.notifier.success(self.op.title, outcome.message.clone());
                    Some(JobStatus::Success)
                }
            },
            Settlement::Err(e) => {
                warn!("'{}' failed: {}", self.op.command, e);
                self.job
                    .logs()
                    .push(format_log_message(LogLevel::Error, &e.to_string()));
                self.ctx.notifier.error(self.op.title, e.to_string());
                Some(JobStatus::Error)
            }
            Settlement::Cancelled => Some(JobStatus::Idle),
        };
        match status {
            Some(status) => {
                handle.complete(status);
            }
            // The job stays running until the session is stopped.
            None => *lock_live(&self.live) = Some(handle),
        }
        Ok(settlement)
    }
}

impl Drop for ActionPanel {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Detached cancel button for a panel, usable while `submit` is awaited elsewhere.
#[derive(Clone)]
pub struct PanelCanceller {
    op: &'static OperationKind,
    job: Job,
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    live: Arc<Mutex<Option<JobHandle>>>,
}

impl PanelCanceller {
    /// Settle the running job as idle and signal the backend. Returns false when idle.
    pub async fn cancel(&self) -> bool {
        if !self.job.cancel() {
            return false;
        }
        self.notifier.info(self.op.title, "Cancellation requested");
        if let Some(session) = self.op.session {
            // Stale once the job is idle.
            take_live(&self.live);
            if let Err(e) = self.backend.invoke(session.stop_command, json!({}), None).await {
                warn!("Stop '{}' failed: {}", session.stop_command, e);
            }
        } else if let Some(cancel_command) = self.op.cancel_command
            && let Err(e) = self.backend.cancel(cancel_command).await
        {
            // Best effort; the local job is already idle.
            warn!("Cancel '{}' failed: {}", cancel_command, e);
        }
        true
    }

    /// End a live session once the backend confirms. Returns false when no session is live.
    ///
    /// A rejected stop leaves the session live.
    pub async fn stop(&self) -> bool {
        let Some(session) = self.op.session else {
            return false;
        };
        let Some(handle) = take_live(&self.live).filter(JobHandle::is_current) else {
            return false;
        };
        match self.backend.invoke(session.stop_command, json!({}), None).await {
            Ok(outcome) => {
                if !handle.complete(JobStatus::Idle) {
                    return false;
                }
                info!("'{}' stopped", self.op.command);
                self.job.logs().push(format_log_message(LogLevel::Info, session.stopped));
                self.notifier.success(self.op.title, notice(&outcome, session.stopped));
                true
            }
            Err(e) => {
                warn!("Stop '{}' failed: {}", session.stop_command, e);
                self.job.logs().push(format_log_message(LogLevel::Error, &e.to_string()));
                self.notifier.error(self.op.title, e.to_string());
                let mut live = lock_live(&self.live);
                if live.is_none() {
                    *live = Some(handle);
                }
                false
            }
        }
    }
}

fn lock_live(live: &Mutex<Option<JobHandle>>) -> std::sync::MutexGuard<'_, Option<JobHandle>> {
    live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn take_live(live: &Mutex<Option<JobHandle>>) -> Option<JobHandle> {
    lock_live(live).take()
}

/// The backend's own wording when it gave any, else `fallback`.
fn notice(outcome: &Outcome, fallback: &str) -> String {
    if outcome.message.trim().is_empty() {
        fallback.to_string()
    } else {
        outcome.message.clone()
    }
}

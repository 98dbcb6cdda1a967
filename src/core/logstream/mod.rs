//! Named log channels and the per-panel subscriptions that drain them.
//!
//! Channels are `broadcast` senders created on first use. A subscription owns a pump task that
//! stamps each received line and appends it to a [`LogBuffer`]; dropping the subscription
//! stops the pump.

mod buffer;
mod level;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use buffer::{LogBuffer, LogLine};
pub use level::{LogLevel, format_log_message};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish a line; returns the number of live subscribers that will see it.
    pub fn emit(&self, channel: &str, line: impl Into<String>) -> usize {
        self.sender(channel).send(line.into()).unwrap_or(0)
    }

    pub fn emitter(&self, channel: &str) -> LogEmitter {
        LogEmitter {
            channel: channel.to_string(),
            tx: self.sender(channel),
        }
    }

    /// Start appending every line published on `channel` to `buffer`.
    ///
    /// The receiver is registered before this returns, so nothing emitted afterwards is missed.
    pub fn subscribe(&self, channel: &str, buffer: LogBuffer) -> Subscription {
        let mut rx = self.sender(channel).subscribe();
        let name = channel.to_string();
        debug!("Subscribed to log channel '{}'", name);

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(line) => {
                        buffer.push_streamed(line);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Log channel '{}' lagged by {} lines", name, skipped);
                        buffer.push_streamed(format_log_message(
                            LogLevel::Warning,
                            &format!("{} log lines dropped", skipped),
                        ));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Subscription {
            channel: channel.to_string(),
            task: Some(task),
        }
    }
}

/// Write side of one channel, handed to the backend for the duration of a call.
#[derive(Clone)]
pub struct LogEmitter {
    channel: String,
    tx: broadcast::Sender<String>,
}

impl LogEmitter {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn emit(&self, line: impl Into<String>) {
        // No subscribers is fine; the line is simply not observed.
        let _ = self.tx.send(line.into());
    }
}

/// Live binding of a buffer to a channel. Released on `unsubscribe` or drop.
pub struct Subscription {
    channel: String,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Unsubscribed from log channel '{}'", self.channel);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

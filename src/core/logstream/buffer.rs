use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use super::LogLevel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub received_at: DateTime<Local>,
    pub text: String,
}

impl LogLine {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            received_at: Local::now(),
            text: text.into(),
        }
    }

    /// `[HH:MM:SS] text` in local time.
    pub fn render(&self) -> String {
        format!("[{}] {}", self.received_at.format("%H:%M:%S"), self.text)
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::classify(&self.text)
    }
}

/// Append-only log of one panel. Cloning shares the buffer.
///
/// The buffer can be closed to stream input: lines that arrive while closed are discarded.
/// Clearing reopens it.
#[derive(Clone)]
pub struct LogBuffer {
    lines: Arc<Mutex<Vec<LogLine>>>,
    accepting: Arc<AtomicBool>,
    len_tx: Arc<watch::Sender<usize>>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        let (len_tx, _) = watch::channel(0);
        Self {
            lines: Arc::new(Mutex::new(Vec::new())),
            accepting: Arc::new(AtomicBool::new(true)),
            len_tx: Arc::new(len_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogLine>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stamp with the local clock and append.
    pub fn push(&self, text: impl Into<String>) {
        self.push_line(LogLine::now(text));
    }

    pub fn push_line(&self, line: LogLine) {
        let mut lines = self.lock();
        lines.push(line);
        self.len_tx.send_replace(lines.len());
    }

    /// Append a line received from a stream; dropped if the buffer is closed to stream input.
    pub fn push_streamed(&self, text: impl Into<String>) -> bool {
        if !self.accepting.load(Ordering::SeqCst) {
            return false;
        }
        self.push(text);
        true
    }

    pub fn close_stream(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    /// Empty the buffer and reopen it to stream input.
    pub fn clear(&self) {
        let mut lines = self.lock();
        lines.clear();
        self.accepting.store(true, Ordering::SeqCst);
        self.len_tx.send_replace(0);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Lines from `offset` on. An offset past the end (after a clear) yields everything.
    pub fn since(&self, offset: usize) -> Vec<LogLine> {
        let lines = self.lock();
        if offset > lines.len() {
            lines.clone()
        } else {
            lines[offset..].to_vec()
        }
    }

    #[cfg(test)]
    pub fn texts(&self) -> Vec<String> {
        self.lock().iter().map(|l| l.text.clone()).collect()
    }

    /// Watch the line count to re-render on change.
    pub fn watch(&self) -> watch::Receiver<usize> {
        self.len_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_preserves_order() {
        let buffer = LogBuffer::new();
        buffer.push("one");
        buffer.push("two");
        buffer.push("three");
        assert_eq!(buffer.texts(), vec!["one", "two", "three"]);
    }

    #[test]
    fn render_prefixes_time() {
        let line = LogLine::now("Connecting...");
        let rendered = line.render();
        assert!(rendered.starts_with('['));
        assert!(rendered.ends_with("] Connecting..."));
        assert_eq!(rendered.len(), "[00:00:00] Connecting...".len());
    }

    #[test]
    fn closed_buffer_discards_streamed_lines_until_cleared() {
        let buffer = LogBuffer::new();
        assert!(buffer.push_streamed("kept"));
        buffer.close_stream();
        assert!(!buffer.push_streamed("dropped"));
        buffer.push("local note");
        assert_eq!(buffer.texts(), vec!["kept", "local note"]);

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.push_streamed("fresh"));
    }

    #[test]
    fn since_handles_offsets() {
        let buffer = LogBuffer::new();
        buffer.push("a");
        buffer.push("b");
        assert_eq!(buffer.since(1).len(), 1);
        assert_eq!(buffer.since(2).len(), 0);
        assert_eq!(buffer.since(5).len(), 2);
    }

    #[test]
    fn watch_tracks_length() {
        let buffer = LogBuffer::new();
        let rx = buffer.watch();
        buffer.push("a");
        buffer.push("b");
        assert_eq!(*rx.borrow(), 2);
        buffer.clear();
        assert_eq!(*rx.borrow(), 0);
    }
}

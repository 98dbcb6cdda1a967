//! Tracing setup for the CLI.
//!
//! Every formatted record goes to a broadcast diagnostics feed. `run --quiet` keeps stderr clean
//! and replays the feed only when an operation fails. Without `--quiet` records are also written
//! to stderr, so stdout carries nothing but operation output.

use std::io::Write;
use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

pub(crate) const DIAGNOSTICS_CAPACITY: usize = 500;

#[derive(Clone)]
pub(crate) struct DiagnosticsTee {
    feed: broadcast::Sender<String>,
    quiet: bool,
}

impl DiagnosticsTee {
    pub(crate) fn new(feed: broadcast::Sender<String>, quiet: bool) -> Self {
        Self { feed, quiet }
    }
}

impl<'a> MakeWriter<'a> for DiagnosticsTee {
    type Writer = RecordWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RecordWriter {
            tee: self.clone(),
            record: Vec::new(),
        }
    }
}

/// Collects one formatted record. The feed receives it as a single line when the writer is
/// flushed or dropped.
pub(crate) struct RecordWriter {
    tee: DiagnosticsTee,
    record: Vec<u8>,
}

impl RecordWriter {
    fn publish(&mut self) {
        if self.record.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&self.record).trim_end().to_string();
        self.record.clear();
        if !text.is_empty() {
            // Nobody listening outside a failing quiet run.
            let _ = self.tee.feed.send(text);
        }
    }
}

impl Write for RecordWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.record.extend_from_slice(buf);
        if !self.tee.quiet {
            std::io::stderr().write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.publish();
        if !self.tee.quiet {
            std::io::stderr().flush()?;
        }
        Ok(())
    }
}

impl Drop for RecordWriter {
    fn drop(&mut self) {
        self.publish();
    }
}

/// Install the global subscriber. Returns the diagnostics feed.
pub(crate) fn init_tracing(verbose: bool, quiet: bool) -> broadcast::Sender<String> {
    let (feed, _) = broadcast::channel::<String>(DIAGNOSTICS_CAPACITY);
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false)
        .with_writer(DiagnosticsTee::new(feed.clone(), quiet))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok(); // Already installed in tests
    feed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_reaches_the_feed_as_one_line() {
        let (tx, mut rx) = broadcast::channel(4);
        let tee = DiagnosticsTee::new(tx, true);
        let mut writer = tee.make_writer();
        writer.write_all(b"INFO vault ").unwrap();
        writer.write_all(b"hydrated\n").unwrap();
        assert!(rx.try_recv().is_err());
        drop(writer);
        assert_eq!(rx.try_recv().unwrap(), "INFO vault hydrated");
    }

    #[test]
    fn flush_publishes_once() {
        let (tx, mut rx) = broadcast::channel(4);
        let tee = DiagnosticsTee::new(tx, true);
        let mut writer = tee.make_writer();
        writer.write_all(b"WARN cancel failed\n").unwrap();
        writer.flush().unwrap();
        drop(writer);
        assert_eq!(rx.try_recv().unwrap(), "WARN cancel failed");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn blank_records_are_skipped() {
        let (tx, mut rx) = broadcast::channel(4);
        let tee = DiagnosticsTee::new(tx, true);
        let mut writer = tee.make_writer();
        writer.write_all(b"\n").unwrap();
        drop(writer);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn writer_without_receivers_still_succeeds() {
        let (tx, _) = broadcast::channel::<String>(4);
        let mut writer = DiagnosticsTee::new(tx, true).make_writer();
        assert_eq!(writer.write(b"dropped").unwrap(), 7);
    }
}

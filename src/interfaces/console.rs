//! Terminal view of a running panel: the live log and the notification feed.

use console::style;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::core::logstream::{LogBuffer, LogLevel, LogLine};
use crate::core::panel::{Notification, NotificationKind};
use crate::core::terminal::{print_error, print_info, print_success};

pub struct ConsoleView {
    logs: LogBuffer,
    printed: usize,
}

impl ConsoleView {
    pub fn new(logs: LogBuffer) -> Self {
        Self { logs, printed: 0 }
    }

    /// Lines appended since the last call. A cleared buffer restarts from the top.
    pub fn take_new(&mut self) -> Vec<LogLine> {
        if self.logs.len() < self.printed {
            self.printed = 0;
        }
        let lines = self.logs.since(self.printed);
        self.printed += lines.len();
        lines
    }

    pub fn flush(&mut self) {
        for line in self.take_new() {
            println!("{}", styled_line(&line));
        }
    }
}

pub fn styled_line(line: &LogLine) -> String {
    let rendered = line.render();
    match line.level() {
        LogLevel::Success => style(rendered).green().to_string(),
        LogLevel::Delete => style(rendered).magenta().to_string(),
        LogLevel::Error => style(rendered).red().to_string(),
        LogLevel::Warning => style(rendered).yellow().to_string(),
        LogLevel::Info => style(rendered).cyan().to_string(),
        LogLevel::Plain => rendered,
    }
}

pub fn print_notification(notification: &Notification) {
    let text = format!("{}: {}", notification.title, notification.message);
    match notification.kind {
        NotificationKind::Success => print_success(&text),
        NotificationKind::Error => print_error(&text),
        NotificationKind::Info => print_info(&text),
    }
}

/// Print every notification queued so far.
pub fn drain_notifications(rx: &mut UnboundedReceiver<Notification>) -> usize {
    let mut shown = 0;
    while let Ok(notification) = rx.try_recv() {
        print_notification(&notification);
        shown += 1;
    }
    shown
}

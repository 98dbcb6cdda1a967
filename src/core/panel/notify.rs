use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

/// Sending half of the notification feed. Cloned into every panel.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn notify(&self, kind: NotificationKind, title: &str, message: impl Into<String>) {
        let notification = Notification {
            kind,
            title: title.to_string(),
            message: message.into(),
        };
        debug!("Notification: {:?} {}", notification.kind, notification.title);
        // Receiver gone means nobody is showing notifications any more.
        let _ = self.tx.send(notification);
    }

    pub fn success(&self, title: &str, message: impl Into<String>) {
        self.notify(NotificationKind::Success, title, message);
    }

    pub fn error(&self, title: &str, message: impl Into<String>) {
        self.notify(NotificationKind::Error, title, message);
    }

    pub fn info(&self, title: &str, message: impl Into<String>) {
        self.notify(NotificationKind::Info, title, message);
    }
}

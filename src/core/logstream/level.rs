#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Success,
    Delete,
    Error,
    Warning,
    Info,
    Plain,
}

impl LogLevel {
    pub fn marker(self) -> &'static str {
        match self {
            LogLevel::Success => "[+]",
            LogLevel::Delete => "[-]",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warning => "[WARNING]",
            LogLevel::Info => "[INFO]",
            LogLevel::Plain => "",
        }
    }

    /// Classify a backend log line from the markers it carries.
    pub fn classify(line: &str) -> Self {
        if line.contains("[+]") || line.contains("SUCCESS") || line.contains('✓') {
            LogLevel::Success
        } else if line.contains("[-]") || line.contains("DELETE") {
            LogLevel::Delete
        } else if line.contains("[ERROR]") || line.contains('✗') {
            LogLevel::Error
        } else if line.contains("[WARNING]") || line.contains('⚠') {
            LogLevel::Warning
        } else if line.contains("[INFO]") || line.contains('ℹ') {
            LogLevel::Info
        } else {
            LogLevel::Plain
        }
    }
}

pub fn format_log_message(level: LogLevel, message: &str) -> String {
    match level {
        LogLevel::Plain => message.to_string(),
        _ => format!("{} {}", level.marker(), message),
    }
}

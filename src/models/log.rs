use serde::{Deserialize, Serialize};

/// Presentation hint inferred from the text of a console line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Error,
    Warning,
    Info,
    Presence,
    Default,
}

impl LogSeverity {
    pub fn classify(line: &str) -> Self {
        if line.contains("ERROR") || line.contains("Exception") || line.contains("Error") {
            LogSeverity::Error
        } else if line.contains("WARN") || line.contains("Warning") {
            LogSeverity::Warning
        } else if line.contains("INFO") {
            LogSeverity::Info
        } else if line.contains("joined the game") || line.contains("left the game") {
            LogSeverity::Presence
        } else {
            LogSeverity::Default
        }
    }
}

/// A single line of console output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub seq: u64,
    pub text: String,
    pub severity: LogSeverity,
}

pub mod event;
pub mod log;
pub mod server;

pub use event::{ProcessMetrics, SupervisorEvent};
pub use log::{LogEntry, LogSeverity};
pub use server::{LaunchMode, ServerProfile, ServerState, SharedProfile};

use serde::Serialize;

use super::ServerState;

/// One sample of the live process' resource usage.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProcessMetrics {
    /// Normalised to the whole machine, `None` until two samples exist.
    pub cpu_percent: Option<f64>,
    pub memory_mb: f64,
    pub max_memory_mb: Option<f64>,
    pub uptime_secs: u64,
}

/// Lifecycle notifications published by a supervisor.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisorEvent {
    StateChanged { state: ServerState, busy: bool },
    PlayerJoined { name: String, count: usize },
    PlayerLeft { name: String, count: usize },
    PlayersReset,
    Metrics(ProcessMetrics),
}

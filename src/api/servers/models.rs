use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::{LaunchMode, ServerProfile};
use crate::services::supervisor::SupervisorStatus;

/// Registers an existing server folder.
#[derive(Debug, Deserialize)]
pub struct ImportServerRequest {
    pub folder_path: PathBuf,
    pub display_name: Option<String>,
    /// Heap size for the generated `-Xmx/-Xms` flags.
    pub ram_gb: Option<u32>,
}

/// Partial profile update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateServerRequest {
    pub display_name: Option<String>,
    pub folder_path: Option<PathBuf>,
    pub launch_mode: Option<LaunchMode>,
    pub java_path: Option<String>,
    pub jar_name: Option<String>,
    pub batch_filename: Option<String>,
    pub jvm_arguments: Option<String>,
    pub auto_restart_enabled: Option<bool>,
    pub auto_restart_time: Option<String>,
    /// An empty string clears the webhook.
    pub discord_webhook_url: Option<String>,
    pub clear_logs_on_start: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Deserialize)]
pub struct ConsoleQuery {
    pub lines: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ServerResponse {
    pub profile: ServerProfile,
    pub status: SupervisorStatus,
    pub dir_exists: bool,
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Literal java token: resolved through `PATH` rather than checked on disk.
pub const DEFAULT_JAVA: &str = "java";

/// A profile shared between the application and its supervisor.
pub type SharedProfile = Arc<RwLock<ServerProfile>>;

/// Persisted description of one manageable server instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerProfile {
    pub id: String,
    pub display_name: String,
    pub folder_path: PathBuf,
    #[serde(default)]
    pub launch_mode: LaunchMode,
    #[serde(default = "default_java")]
    pub java_path: String,
    #[serde(default = "default_jar")]
    pub jar_name: String,
    #[serde(default)]
    pub batch_filename: String,
    #[serde(default)]
    pub jvm_arguments: String,
    #[serde(default)]
    pub auto_restart_enabled: bool,
    /// Time of day, `HH:MM`.
    #[serde(default = "default_restart_time")]
    pub auto_restart_time: String,
    #[serde(default)]
    pub discord_webhook_url: Option<String>,
    #[serde(default)]
    pub clear_logs_on_start: bool,
    pub created_at: String,
    pub updated_at: String,
}

fn default_java() -> String {
    DEFAULT_JAVA.to_string()
}

fn default_jar() -> String {
    "server.jar".to_string()
}

fn default_restart_time() -> String {
    "04:00".to_string()
}

impl ServerProfile {
    pub fn new(display_name: impl Into<String>, folder_path: impl Into<PathBuf>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: display_name.into(),
            folder_path: folder_path.into(),
            launch_mode: LaunchMode::default(),
            java_path: default_java(),
            jar_name: default_jar(),
            batch_filename: String::new(),
            jvm_arguments: String::new(),
            auto_restart_enabled: false,
            auto_restart_time: default_restart_time(),
            discord_webhook_url: None,
            clear_logs_on_start: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn into_shared(self) -> SharedProfile {
        Arc::new(RwLock::new(self))
    }

    /// Java executable to launch with; a blank path falls back to `java`.
    pub fn java_executable(&self) -> &str {
        if self.java_path.trim().is_empty() {
            DEFAULT_JAVA
        } else {
            self.java_path.trim()
        }
    }

    pub fn uses_default_java(&self) -> bool {
        self.java_executable() == DEFAULT_JAVA
    }

    /// Path of the artifact the active launch mode runs.
    pub fn launch_artifact(&self) -> PathBuf {
        match self.launch_mode {
            LaunchMode::JavaJar => self.folder_path.join(&self.jar_name),
            LaunchMode::BatchScript => self.folder_path.join(&self.batch_filename),
        }
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.discord_webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    #[default]
    JavaJar,
    BatchScript,
}

impl std::fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchMode::JavaJar => write!(f, "java_jar"),
            LaunchMode::BatchScript => write!(f, "batch_script"),
        }
    }
}

impl std::str::FromStr for LaunchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "java_jar" | "jar" | "java" => Ok(LaunchMode::JavaJar),
            "batch_script" | "batch" | "script" => Ok(LaunchMode::BatchScript),
            _ => Err(format!("Unknown launch mode: {}", s)),
        }
    }
}

/// Lifecycle state of a supervised server.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Restarting,
}

impl ServerState {
    /// Steady states are the only ones where a new operation may begin.
    pub fn is_transition(self) -> bool {
        !matches!(self, ServerState::Stopped | ServerState::Running)
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
            ServerState::Restarting => "restarting",
        };
        f.write_str(s)
    }
}

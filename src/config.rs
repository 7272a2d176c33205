use std::path::PathBuf;
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub accept_eula: bool,
    pub default_ram_gb: u32,
    pub log_display_cap: usize,
    pub launcher_process_names: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8765),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            accept_eula: std::env::var("ACCEPT_EULA")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            default_ram_gb: std::env::var("DEFAULT_RAM_GB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            log_display_cap: std::env::var("LOG_DISPLAY_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            launcher_process_names: std::env::var("LAUNCHER_PROCESS_NAMES")
                .map(|v| parse_name_list(&v))
                .unwrap_or_else(|_| default_launcher_names()),
        }
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir.join("profiles")
    }

    pub fn pids_dir(&self) -> PathBuf {
        self.data_dir.join(".pids")
    }
}

fn parse_name_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn default_launcher_names() -> Vec<String> {
    ["java", "javaw", "cmd", "sh", "bash"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Every delay the supervisor waits on. Tests shrink these.
#[derive(Debug, Clone)]
pub struct Timings {
    /// Grace period for a voluntary exit after the stop command before the process is killed.
    pub stop_timeout: Duration,
    pub crash_retry_delay: Duration,
    pub restart_delay: Duration,
    pub backup_settle: Duration,
    pub sampler_period: Duration,
    pub save_flush_interval: Duration,
    pub backup_retention: Duration,
    /// Longest a console command may block on a process that stopped reading stdin.
    pub command_write_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(15),
            crash_retry_delay: Duration::from_secs(10),
            restart_delay: Duration::from_secs(5),
            backup_settle: Duration::from_secs(3),
            sampler_period: Duration::from_secs(1),
            save_flush_interval: Duration::from_millis(500),
            backup_retention: Duration::from_secs(7 * 24 * 60 * 60),
            command_write_timeout: Duration::from_secs(5),
        }
    }
}

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use craftkeeper::config::{default_launcher_names, Timings};
use craftkeeper::models::{LaunchMode, ServerProfile};
use craftkeeper::services::confirm::AutoConfirm;
use craftkeeper::services::discord_service::Notifier;
use craftkeeper::services::pid_file::PidFiles;
use craftkeeper::services::players::PlayerPatterns;
use craftkeeper::services::SupervisorContext;

/// Echoes every command, reacts to a few test verbs and exits on `stop`.
pub const OBEDIENT_SERVER: &str = r#"echo "[Server thread/INFO]: Starting minecraft server"
echo "[Server thread/INFO]: Done (0.1s)! For help, type \"help\""
while IFS= read -r line; do
  echo "cmd: $line"
  case "$line" in
    stop) echo "[Server thread/INFO]: Stopping the server"; exit 0 ;;
    crash) echo "[Server thread/ERROR]: Simulated crash"; exit 3 ;;
    join\ *) echo "[Server thread/INFO]: ${line#join }[/127.0.0.1:51234] logged in with entity id 7 at (0.5, 64.0, 0.5)" ;;
    leave\ *) echo "[Server thread/INFO]: ${line#leave } left the game" ;;
  esac
done
"#;

/// Echoes commands but never exits on its own.
pub const STUBBORN_SERVER: &str = r#"echo "[Server thread/INFO]: Done (0.1s)!"
while IFS= read -r line; do
  echo "cmd: $line"
done
sleep 60
"#;

pub fn fast_timings() -> Timings {
    Timings {
        stop_timeout: Duration::from_millis(1500),
        crash_retry_delay: Duration::from_millis(600),
        restart_delay: Duration::from_millis(300),
        backup_settle: Duration::from_millis(50),
        sampler_period: Duration::from_millis(100),
        save_flush_interval: Duration::from_millis(50),
        backup_retention: Duration::from_secs(7 * 24 * 3600),
        command_write_timeout: Duration::from_millis(500),
    }
}

/// Records every notification it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String, u32)>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(t, _, _)| t.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, _webhook_url: &str, title: &str, body: &str, color: u32) {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string(), color));
    }
}

pub fn context(data_dir: &Path, notifier: Arc<dyn Notifier>, accept_eula: bool) -> SupervisorContext {
    SupervisorContext {
        patterns: Arc::new(PlayerPatterns::new().unwrap()),
        notifier,
        confirmer: Arc::new(AutoConfirm(accept_eula)),
        pid_files: PidFiles::new(data_dir.join(".pids"), default_launcher_names()),
        timings: fast_timings(),
        log_display_cap: 1000,
    }
}

/// A server folder with the marker files and `start.sh` holding `script`.
pub fn server_folder(root: &Path, name: &str, script: &str) -> std::path::PathBuf {
    let folder = root.join(name);
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("server.properties"), "motd=test\n").unwrap();
    std::fs::write(folder.join("eula.txt"), "eula=true\n").unwrap();
    std::fs::write(folder.join("start.sh"), script).unwrap();
    folder
}

pub fn script_profile(name: &str, folder: &Path) -> ServerProfile {
    let mut profile = ServerProfile::new(name, folder);
    profile.launch_mode = LaunchMode::BatchScript;
    profile.batch_filename = "start.sh".into();
    profile.discord_webhook_url = Some("https://discord.invalid/webhook".into());
    profile
}

pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

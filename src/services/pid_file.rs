//! Per-profile pid markers (`<profile id>.pid`, plain-text pid) used to
//! reattach to servers that outlived a previous manager session.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::process_handle::{is_alive, process_name};

#[derive(Debug, Clone)]
pub struct PidFiles {
    dir: PathBuf,
    /// Image names a reattached pid must carry (`java`, `cmd`, ...).
    launcher_names: Vec<String>,
}

impl PidFiles {
    pub fn new(dir: impl Into<PathBuf>, launcher_names: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            launcher_names,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, profile_id: &str) -> PathBuf {
        self.dir.join(format!("{}.pid", profile_id))
    }

    pub fn write(&self, profile_id: &str, pid: u32) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(profile_id), pid.to_string())
    }

    pub fn delete(&self, profile_id: &str) {
        let path = self.path_for(profile_id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete pid file {:?}: {}", path, e),
        }
    }

    pub fn read(&self, profile_id: &str) -> Option<u32> {
        fs::read_to_string(self.path_for(profile_id))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Returns the recorded pid if that process is still alive and looks like
    /// a server launcher. Stale or unrelated records are deleted.
    pub fn find_orphan(&self, profile_id: &str) -> Option<u32> {
        let path = self.path_for(profile_id);
        let raw = fs::read_to_string(&path).ok()?;

        let Ok(pid) = raw.trim().parse::<u32>() else {
            debug!("Discarding unreadable pid file {:?}", path);
            self.delete(profile_id);
            return None;
        };

        match process_name(pid) {
            Some(name) if self.launcher_names.iter().any(|n| *n == name) => {
                info!("Found orphan server process {} ({}) for profile {}", pid, name, profile_id);
                Some(pid)
            }
            Some(name) => {
                debug!("Pid {} now belongs to unrelated process '{}'", pid, name);
                self.delete(profile_id);
                None
            }
            None => {
                self.delete(profile_id);
                None
            }
        }
    }

    /// Removes every marker whose process no longer exists. Returns how many were removed.
    pub fn cleanup_stale(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("pid") {
                continue;
            }
            let alive = fs::read_to_string(&path)
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok())
                .map(is_alive)
                .unwrap_or(false);
            if !alive && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Removed {} stale pid file(s)", removed);
        }
        removed
    }
}

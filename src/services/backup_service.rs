//! World snapshots: `<server>/Backups/Backup_<timestamp>.tar.gz`.

use chrono::{DateTime, Local};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use super::console;
use super::discord_service::COLOR_BLUE;
use super::supervisor::Supervisor;
use crate::error::SupervisorError;

pub const BACKUP_DIR: &str = "Backups";
/// Held open by a running server; never archived.
pub const LOCK_FILE: &str = "session.lock";
const SNAPSHOT_PREFIX: &str = "Backup_";

#[derive(thiserror::Error, Debug)]
pub enum BackupError {
    #[error("source directory not found: {0}")]
    SourceMissing(PathBuf),

    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive task aborted: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveSummary {
    pub files: usize,
    pub skipped: usize,
    pub bytes: u64,
}

pub fn snapshot_path(backup_dir: &Path, now: DateTime<Local>) -> PathBuf {
    backup_dir.join(format!(
        "{}{}.tar.gz",
        SNAPSHOT_PREFIX,
        now.format("%Y-%m-%d_%H-%M-%S")
    ))
}

/// Deletes snapshots whose modification time is older than `retention`.
/// Files that cannot be inspected or removed are left alone.
pub fn prune_old_snapshots(backup_dir: &Path, retention: Duration) -> usize {
    let Ok(entries) = fs::read_dir(backup_dir) else {
        return 0;
    };
    let Some(cutoff) = SystemTime::now().checked_sub(retention) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let is_snapshot = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with(SNAPSHOT_PREFIX));
        if !is_snapshot || !path.is_file() {
            continue;
        }
        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_or(false, |modified| modified < cutoff);
        if !expired {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => debug!("Could not prune {:?}: {}", path, e),
        }
    }
    removed
}

/// Archives the content of `source_dir` into `dest`, skipping the backup
/// directory and any `session.lock`. Unreadable files are skipped; only a
/// failure to create or finish the archive itself is an error.
pub fn create_archive(source_dir: &Path, dest: &Path) -> Result<ArchiveSummary, BackupError> {
    if !source_dir.is_dir() {
        return Err(BackupError::SourceMissing(source_dir.to_path_buf()));
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let tar_gz = File::create(dest)?;
    let enc = GzEncoder::new(tar_gz, Compression::default());
    let mut tar = tar::Builder::new(enc);

    let backup_dir = source_dir.join(BACKUP_DIR);
    let mut summary = ArchiveSummary::default();

    let walker = WalkDir::new(source_dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.path() != backup_dir && e.file_name() != LOCK_FILE);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                summary.skipped += 1;
                continue;
            }
        };
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(source_dir) else {
            continue;
        };
        if path == dest {
            continue;
        }

        if entry.file_type().is_dir() {
            if let Err(e) = tar.append_dir(relative, path) {
                debug!("Skipping directory {:?}: {}", path, e);
            }
            continue;
        }

        // Files locked by the running server fail here and are skipped.
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                debug!("Skipping {:?}: {}", path, e);
                summary.skipped += 1;
                continue;
            }
        };
        match tar.append_file(relative, &mut file) {
            Ok(()) => summary.files += 1,
            Err(e) => {
                warn!("Failed to archive {:?}: {}", path, e);
                summary.skipped += 1;
            }
        }
    }

    tar.into_inner()?.finish()?;
    summary.bytes = fs::metadata(dest)?.len();
    Ok(summary)
}

/// Snapshot of a server folder, coordinated with world saving when the
/// server is running.
pub async fn perform_backup(supervisor: &Supervisor) -> Result<PathBuf, SupervisorError> {
    let _guard = supervisor.begin_backup()?;

    let folder = supervisor.profile().read().await.folder_path.clone();
    let was_running = supervisor.is_running();
    supervisor.lifecycle("Backup started");

    let result = snapshot(supervisor, &folder, was_running).await;

    if was_running {
        // Attempted even after a failure so autosave never stays off.
        if let Err(e) = supervisor.send_internal(console::SAVE_ON).await {
            warn!("Could not re-enable autosave on {}: {}", supervisor.id(), e);
        }
    }

    match &result {
        Ok(path) => {
            supervisor.lifecycle(format!("Backup saved to {}", path.display()));
            let name = supervisor.profile().read().await.display_name.clone();
            supervisor
                .notify("Backup completed", format!("{} was backed up.", name), COLOR_BLUE)
                .await;
        }
        Err(e) => {
            error!("Backup of {} failed: {}", supervisor.id(), e);
            supervisor.log().append(&format!("[ERROR] Backup failed: {}", e));
        }
    }
    result
}

async fn snapshot(
    supervisor: &Supervisor,
    folder: &Path,
    was_running: bool,
) -> Result<PathBuf, SupervisorError> {
    let backup_dir = folder.join(BACKUP_DIR);
    let retention = supervisor.timings().backup_retention;

    let prune_dir = backup_dir.clone();
    let pruned = tokio::task::spawn_blocking(move || prune_old_snapshots(&prune_dir, retention))
        .await
        .map_err(|e| BackupError::Task(e.to_string()))?;
    if pruned > 0 {
        info!("Pruned {} old snapshot(s) of {}", pruned, supervisor.id());
    }

    if was_running {
        // Delivery failures are logged by the supervisor; archiving proceeds regardless.
        let _ = supervisor.send_internal(console::SAVE_OFF).await;
        let _ = supervisor.send_internal(console::SAVE_ALL).await;
        tokio::time::sleep(supervisor.timings().backup_settle).await;
    }

    let dest = snapshot_path(&backup_dir, Local::now());
    let source = folder.to_path_buf();
    let archive_dest = dest.clone();
    let summary = tokio::task::spawn_blocking(move || create_archive(&source, &archive_dest))
        .await
        .map_err(|e| BackupError::Task(e.to_string()))??;

    info!(
        "Archived {} file(s) of {} ({} skipped, {} bytes)",
        summary.files,
        supervisor.id(),
        summary.skipped,
        summary.bytes
    );
    Ok(dest)
}

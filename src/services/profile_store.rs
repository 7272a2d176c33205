//! Profile persistence: one pretty-printed JSON file per profile under
//! `<data dir>/profiles/`, plus a write-coalescing save queue.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::{ServerProfile, SharedProfile};

#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Loads every readable profile, oldest first. Corrupt files are skipped.
    pub async fn load_all(&self) -> io::Result<Vec<ServerProfile>> {
        fs::create_dir_all(&self.dir).await?;

        let mut profiles = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = match fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Could not read profile {:?}: {}", path, e);
                    continue;
                }
            };
            match serde_json::from_str::<ServerProfile>(&raw) {
                Ok(profile) if is_safe_id(&profile.id) => profiles.push(profile),
                Ok(profile) => warn!("Ignoring profile with unusable id '{}'", profile.id),
                Err(e) => warn!("Skipping corrupt profile {:?}: {}", path, e),
            }
        }

        profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        info!("Loaded {} server profile(s)", profiles.len());
        Ok(profiles)
    }

    /// Writes through a temporary file so a crash never leaves half a profile.
    pub async fn save(&self, profile: &ServerProfile) -> io::Result<()> {
        if !is_safe_id(&profile.id) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unusable profile id '{}'", profile.id),
            ));
        }
        fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(profile)?;
        let target = self.path_for(&profile.id);
        let tmp = self.dir.join(format!(".{}.json.tmp", profile.id));
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &target).await
    }

    pub async fn delete(&self, id: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(id)).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

fn is_safe_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Collects profiles marked dirty and persists each once per flush, so a
/// burst of edits to one profile costs a single write.
pub struct SaveQueue {
    store: ProfileStore,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    dirty: HashMap<String, SharedProfile>,
    /// Deleted ids. A flush already holding one of these must not write it back.
    forgotten: HashSet<String>,
}

impl SaveQueue {
    pub fn new(store: ProfileStore) -> Arc<Self> {
        Arc::new(Self {
            store,
            state: Mutex::new(QueueState::default()),
        })
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn mark_dirty(&self, id: &str, profile: SharedProfile) {
        let mut state = self.lock();
        if !state.forgotten.contains(id) {
            state.dirty.insert(id.to_string(), profile);
        }
    }

    /// Drops a pending write and refuses later ones, used when the profile
    /// is deleted.
    pub fn forget(&self, id: &str) {
        let mut state = self.lock();
        state.dirty.remove(id);
        state.forgotten.insert(id.to_string());
    }

    pub fn pending(&self) -> usize {
        self.lock().dirty.len()
    }

    fn is_forgotten(&self, id: &str) -> bool {
        self.lock().forgotten.contains(id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persists every dirty profile. Failed writes are re-queued.
    pub async fn flush(&self) -> usize {
        let batch: Vec<(String, SharedProfile)> = self.lock().dirty.drain().collect();
        let mut saved = 0;
        for (id, shared) in batch {
            let snapshot = shared.read().await.clone();
            if self.is_forgotten(&id) {
                continue;
            }
            match self.store.save(&snapshot).await {
                Ok(()) if self.is_forgotten(&id) => {
                    // Deleted while the write was in flight.
                    if let Err(e) = self.store.delete(&id).await {
                        warn!("Failed to remove deleted profile {}: {}", id, e);
                    }
                }
                Ok(()) => saved += 1,
                Err(e) => {
                    warn!("Failed to save profile {}: {}", id, e);
                    self.mark_dirty(&id, shared);
                }
            }
        }
        if saved > 0 {
            debug!("Flushed {} profile(s)", saved);
        }
        saved
    }

    pub fn spawn_flusher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                queue.flush().await;
            }
        })
    }
}

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::supervisor::{StopOutcome, Supervisor, SupervisorContext};
use crate::error::SupervisorError;
use crate::models::ServerProfile;

/// Registry of one supervisor per server profile.
pub struct ProcessManager {
    supervisors: RwLock<HashMap<String, Arc<Supervisor>>>,
    ctx: SupervisorContext,
}

impl ProcessManager {
    pub fn new(ctx: SupervisorContext) -> Self {
        Self {
            supervisors: RwLock::new(HashMap::new()),
            ctx,
        }
    }

    pub fn context(&self) -> &SupervisorContext {
        &self.ctx
    }

    /// Registers a profile. If its pid marker points at a live launcher
    /// process, that process is adopted instead of being started again later.
    pub async fn add(&self, profile: ServerProfile) -> Arc<Supervisor> {
        let id = profile.id.clone();
        let supervisor = Supervisor::new(profile, self.ctx.clone());

        let pid_files = self.ctx.pid_files.clone();
        let orphan_id = id.clone();
        let orphan = tokio::task::spawn_blocking(move || pid_files.find_orphan(&orphan_id))
            .await
            .unwrap_or(None);
        if let Some(pid) = orphan {
            supervisor.adopt(pid).await;
        }

        self.supervisors
            .write()
            .await
            .insert(id, Arc::clone(&supervisor));
        supervisor
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Supervisor>> {
        self.supervisors.read().await.get(id).cloned()
    }

    pub async fn require(&self, id: &str) -> Result<Arc<Supervisor>, SupervisorError> {
        self.get(id)
            .await
            .ok_or_else(|| SupervisorError::NotFound(id.to_string()))
    }

    pub async fn list(&self) -> Vec<Arc<Supervisor>> {
        self.supervisors.read().await.values().cloned().collect()
    }

    pub async fn is_running(&self, id: &str) -> bool {
        self.get(id).await.map_or(false, |s| s.is_running())
    }

    /// Stops the server (releasing its handle) before forgetting the profile.
    pub async fn remove(&self, id: &str) -> Result<ServerProfile, SupervisorError> {
        let supervisor = self.require(id).await?;
        supervisor.shutdown().await;
        self.supervisors.write().await.remove(id);
        let profile = supervisor.profile().read().await.clone();
        info!("Removed server {}", id);
        Ok(profile)
    }

    /// Stops every server concurrently; total latency is bounded by the
    /// slowest single stop rather than their sum.
    pub async fn stop_all(&self) -> Vec<(String, StopOutcome)> {
        let supervisors = self.list().await;
        let stops = supervisors.iter().map(|s| async move {
            let outcome = s.shutdown().await;
            (s.id().to_string(), outcome)
        });
        let outcomes = join_all(stops).await;
        let stopped = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, StopOutcome::Stopped | StopOutcome::Killed))
            .count();
        info!("Stopped {} running server(s)", stopped);
        outcomes
    }
}

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use config::Settings;
use services::profile_store::SaveQueue;
use services::ProcessManager;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub process_manager: Arc<ProcessManager>,
    pub save_queue: Arc<SaveQueue>,
    pub settings: Arc<Settings>,
}

pub mod backup_service;
pub mod confirm;
pub mod console;
pub mod discord_service;
pub mod eula;
pub mod launcher;
pub mod log_sink;
pub mod metrics;
pub mod pid_file;
pub mod players;
pub mod process_handle;
pub mod process_manager;
pub mod profile_store;
pub mod scheduler;
pub mod supervisor;
pub mod validation;

pub use process_manager::ProcessManager;
pub use supervisor::{StartOutcome, StopOutcome, Supervisor, SupervisorContext};

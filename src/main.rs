use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use craftkeeper::config::{Settings, Timings};
use craftkeeper::services::confirm::AutoConfirm;
use craftkeeper::services::discord_service::DiscordNotifier;
use craftkeeper::services::pid_file::PidFiles;
use craftkeeper::services::players::PlayerPatterns;
use craftkeeper::services::profile_store::{ProfileStore, SaveQueue};
use craftkeeper::services::{ProcessManager, SupervisorContext};
use craftkeeper::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let settings = Settings::from_env();
    let timings = Timings::default();

    std::fs::create_dir_all(&settings.data_dir)?;

    info!("🚀 CraftKeeper v{}", env!("CARGO_PKG_VERSION"));
    info!("📁 Data directory: {}", settings.data_dir.display());

    if settings.accept_eula {
        warn!("ACCEPT_EULA is set: EULA prompts will be answered yes");
    }

    let pid_files = PidFiles::new(settings.pids_dir(), settings.launcher_process_names.clone());
    let ctx = SupervisorContext {
        patterns: Arc::new(PlayerPatterns::new()?),
        notifier: Arc::new(DiscordNotifier::new()),
        confirmer: Arc::new(AutoConfirm(settings.accept_eula)),
        pid_files: pid_files.clone(),
        timings: timings.clone(),
        log_display_cap: settings.log_display_cap,
    };

    // Load profiles, reattaching to servers that survived the last session
    let store = ProfileStore::new(settings.profiles_dir());
    let process_manager = Arc::new(ProcessManager::new(ctx));
    for profile in store.load_all().await? {
        let supervisor = process_manager.add(profile).await;
        if supervisor.is_running() {
            info!("♻️  {} is still running, reattached", supervisor.id());
        }
    }
    tokio::task::spawn_blocking(move || pid_files.cleanup_stale()).await?;

    let save_queue = SaveQueue::new(store);
    let flusher = save_queue.spawn_flusher(timings.save_flush_interval);

    let state = AppState {
        process_manager: Arc::clone(&process_manager),
        save_queue: Arc::clone(&save_queue),
        settings: Arc::new(settings.clone()),
    };

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("📡 Control API listening on http://{}", addr);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Shutting down, stopping all servers...");
    flusher.abort();
    save_queue.flush().await;
    process_manager.stop_all().await;
    info!("👋 Bye");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

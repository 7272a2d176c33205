use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub mod handlers;
pub mod models;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_servers).post(handlers::create_server))
        .route(
            "/:id",
            get(handlers::get_server)
                .put(handlers::update_server)
                .delete(handlers::delete_server),
        )
        .route("/:id/start", post(handlers::start_server))
        .route("/:id/stop", post(handlers::stop_server))
        .route("/:id/restart", post(handlers::restart_server))
        .route("/:id/kill", post(handlers::kill_server))
        .route("/:id/backup", post(handlers::backup_server))
        .route("/:id/command", post(handlers::send_command))
        .route("/:id/players/:name/:action", post(handlers::player_action))
        .route("/:id/console", get(handlers::get_console))
        .route("/:id/history", get(handlers::get_history))
}

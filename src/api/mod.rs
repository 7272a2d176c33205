use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod console;
pub mod servers;

pub fn routes() -> Router<AppState> {
    Router::new().nest("/servers", servers::routes())
}

/// Full control API: `/api/...` plus the console WebSocket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes())
        .route("/ws/console/:id", get(console::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

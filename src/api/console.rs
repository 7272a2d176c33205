use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use crate::error::AppError;
use crate::services::log_sink::LogEvent;
use crate::services::Supervisor;
use crate::AppState;

/// Live console: backlog, then every new line and supervisor event.
/// Text frames from the client are console commands.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let supervisor = state.process_manager.require(&id).await?;
    let backlog = state.settings.log_display_cap;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, supervisor, backlog)))
}

async fn handle_socket(socket: WebSocket, supervisor: Arc<Supervisor>, backlog: usize) {
    let (mut sender, mut receiver) = socket.split();
    // Subscribe before reading the backlog so no line falls in between.
    let mut log_rx = supervisor.log().subscribe();
    let mut event_rx = supervisor.subscribe();

    info!("Console connected for server: {}", supervisor.id());

    for entry in supervisor.log().recent(backlog) {
        let frame = json!({ "type": "line", "entry": entry });
        if sender.send(Message::Text(frame.to_string())).await.is_err() {
            return;
        }
    }

    loop {
        let frame = tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match supervisor.send_command(&text).await {
                        Ok(()) => continue,
                        Err(e) => json!({ "type": "error", "message": e.to_string() }),
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            },
            log = log_rx.recv() => match log {
                Ok(LogEvent::Line(entry)) => json!({ "type": "line", "entry": entry }),
                Ok(LogEvent::Cleared) => json!({ "type": "cleared" }),
                Err(RecvError::Lagged(skipped)) => json!({ "type": "lagged", "skipped": skipped }),
                Err(RecvError::Closed) => break,
            },
            event = event_rx.recv() => match event {
                Ok(event) => json!({ "type": "event", "event": event }),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        };

        if sender.send(Message::Text(frame.to_string())).await.is_err() {
            break;
        }
    }

    info!("Console disconnected for server: {}", supervisor.id());
}

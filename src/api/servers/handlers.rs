use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::models::{LogEntry, ServerProfile};
use crate::services::console::PlayerAction;
use crate::services::scheduler::parse_restart_time;
use crate::services::supervisor::{StartOutcome, StopOutcome, Supervisor};
use crate::services::validation::validate_server_folder;
use crate::{error::AppError, AppState};

use super::models::{CommandRequest, ConsoleQuery, ImportServerRequest, ServerResponse, UpdateServerRequest};

async fn to_response(supervisor: &Supervisor) -> ServerResponse {
    let profile = supervisor.profile().read().await.clone();
    let dir_exists = profile.folder_path.is_dir();
    ServerResponse {
        profile,
        status: supervisor.status(),
        dir_exists,
    }
}

async fn supervisor(state: &AppState, id: &str) -> Result<Arc<Supervisor>, AppError> {
    Ok(state.process_manager.require(id).await?)
}

pub async fn list_servers(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServerResponse>>, AppError> {
    let mut responses = Vec::new();
    for supervisor in state.process_manager.list().await {
        responses.push(to_response(&supervisor).await);
    }
    responses.sort_by(|a, b| {
        a.profile
            .display_name
            .to_lowercase()
            .cmp(&b.profile.display_name.to_lowercase())
    });
    Ok(Json(responses))
}

pub async fn create_server(
    State(state): State<AppState>,
    Json(body): Json<ImportServerRequest>,
) -> Result<(StatusCode, Json<ServerResponse>), AppError> {
    let folder = body.folder_path;
    validate_server_folder(&folder).map_err(AppError::Validation)?;

    for existing in state.process_manager.list().await {
        if existing.profile().read().await.folder_path == folder {
            return Err(AppError::Conflict(format!(
                "{} is already registered",
                folder.display()
            )));
        }
    }

    let name = body
        .display_name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| folder.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "Minecraft Server".to_string());

    let ram = body.ram_gb.unwrap_or(state.settings.default_ram_gb).max(1);
    let mut profile = ServerProfile::new(name, folder);
    profile.jvm_arguments = format!("-Xmx{}G -Xms{}G", ram, ram);

    state.save_queue.store().save(&profile).await?;
    info!("Imported server {} from {:?}", profile.display_name, profile.folder_path);

    let supervisor = state.process_manager.add(profile).await;
    Ok((StatusCode::CREATED, Json(to_response(&supervisor).await)))
}

pub async fn get_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServerResponse>, AppError> {
    let supervisor = supervisor(&state, &id).await?;
    Ok(Json(to_response(&supervisor).await))
}

pub async fn update_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateServerRequest>,
) -> Result<Json<ServerResponse>, AppError> {
    let supervisor = supervisor(&state, &id).await?;

    if let Some(time) = &body.auto_restart_time {
        if parse_restart_time(time).is_none() {
            return Err(AppError::BadRequest(format!(
                "Invalid restart time '{}', expected HH:MM",
                time
            )));
        }
    }

    {
        let mut profile = supervisor.profile().write().await;
        if let Some(v) = body.display_name {
            profile.display_name = v;
        }
        if let Some(v) = body.folder_path {
            profile.folder_path = v;
        }
        if let Some(v) = body.launch_mode {
            profile.launch_mode = v;
        }
        if let Some(v) = body.java_path {
            profile.java_path = v;
        }
        if let Some(v) = body.jar_name {
            profile.jar_name = v;
        }
        if let Some(v) = body.batch_filename {
            profile.batch_filename = v;
        }
        if let Some(v) = body.jvm_arguments {
            profile.jvm_arguments = v;
        }
        if let Some(v) = body.auto_restart_enabled {
            profile.auto_restart_enabled = v;
        }
        if let Some(v) = body.auto_restart_time {
            profile.auto_restart_time = v.trim().to_string();
        }
        if let Some(v) = body.discord_webhook_url {
            profile.discord_webhook_url = Some(v).filter(|u| !u.trim().is_empty());
        }
        if let Some(v) = body.clear_logs_on_start {
            profile.clear_logs_on_start = v;
        }
        profile.touch();
    }

    state
        .save_queue
        .mark_dirty(supervisor.id(), Arc::clone(supervisor.profile()));
    Ok(Json(to_response(&supervisor).await))
}

pub async fn delete_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let profile = state.process_manager.remove(&id).await?;
    state.save_queue.forget(&id);
    state.save_queue.store().delete(&id).await?;
    info!("Deleted server {} ({})", profile.display_name, id);
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn start_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StartOutcome>, AppError> {
    let supervisor = supervisor(&state, &id).await?;
    Ok(Json(supervisor.start().await?))
}

pub async fn stop_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StopOutcome>, AppError> {
    let supervisor = supervisor(&state, &id).await?;
    Ok(Json(supervisor.stop().await?))
}

pub async fn restart_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StopOutcome>, AppError> {
    let supervisor = supervisor(&state, &id).await?;
    Ok(Json(supervisor.restart().await?))
}

pub async fn kill_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StopOutcome>, AppError> {
    let supervisor = supervisor(&state, &id).await?;
    Ok(Json(supervisor.kill().await?))
}

pub async fn backup_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let supervisor = supervisor(&state, &id).await?;
    let path = supervisor.perform_backup().await?;
    Ok(Json(serde_json::json!({ "path": path })))
}

pub async fn send_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CommandRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let supervisor = supervisor(&state, &id).await?;
    supervisor.send_command(&body.command).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn player_action(
    State(state): State<AppState>,
    Path((id, name, action)): Path<(String, String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let action: PlayerAction = action.parse().map_err(AppError::BadRequest)?;
    let supervisor = supervisor(&state, &id).await?;
    supervisor.player_action(action, &name).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn get_console(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ConsoleQuery>,
) -> Result<Json<Vec<LogEntry>>, AppError> {
    let supervisor = supervisor(&state, &id).await?;
    let count = query.lines.unwrap_or(state.settings.log_display_cap);
    Ok(Json(supervisor.log().recent(count)))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let supervisor = supervisor(&state, &id).await?;
    Ok(Json(supervisor.history()))
}

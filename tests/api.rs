#![cfg(unix)]

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use craftkeeper::api;
use craftkeeper::config::{default_launcher_names, Settings};
use craftkeeper::services::discord_service::NoopNotifier;
use craftkeeper::services::profile_store::{ProfileStore, SaveQueue};
use craftkeeper::services::ProcessManager;
use craftkeeper::AppState;

use common::*;

fn app_state(data_dir: &Path) -> AppState {
    let settings = Settings {
        host: "127.0.0.1".into(),
        port: 0,
        data_dir: data_dir.to_path_buf(),
        accept_eula: false,
        default_ram_gb: 2,
        log_display_cap: 1000,
        launcher_process_names: default_launcher_names(),
    };
    AppState {
        process_manager: Arc::new(ProcessManager::new(context(
            data_dir,
            Arc::new(NoopNotifier),
            false,
        ))),
        save_queue: SaveQueue::new(ProfileStore::new(settings.profiles_dir())),
        settings: Arc::new(settings),
    }
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn import(app: &Router, folder: &Path, name: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/servers",
        Some(json!({ "folder_path": folder, "display_name": name, "ram_gb": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["profile"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn import_requires_the_marker_files() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path());
    let app = api::router(state.clone());

    let bare = dir.path().join("bare");
    std::fs::create_dir_all(&bare).unwrap();
    std::fs::write(bare.join("server.properties"), "").unwrap();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/servers",
        Some(json!({ "folder_path": bare })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"].as_array().unwrap().len(), 1);
    assert!(body["details"][0].as_str().unwrap().contains("eula.txt"));

    let folder = server_folder(dir.path(), "lobby", OBEDIENT_SERVER);
    let id = import(&app, &folder, "Lobby").await;

    let (status, body) = call(&app, Method::GET, &format!("/api/servers/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["display_name"], "Lobby");
    assert_eq!(body["profile"]["jvm_arguments"], "-Xmx3G -Xms3G");
    assert_eq!(body["status"]["state"], "stopped");
    assert_eq!(body["dir_exists"], true);

    // Persisted right away, not on the next flush.
    let stored = state.save_queue.store().load_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/servers",
        Some(json!({ "folder_path": folder })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_server_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::router(app_state(dir.path()));

    let (status, body) = call(&app, Method::GET, "/api/servers/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));

    let (status, _) = call(&app, Method::POST, "/api/servers/nope/start", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_validates_and_persists_in_the_background() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path());
    let app = api::router(state.clone());
    let id = import(&app, &server_folder(dir.path(), "smp", OBEDIENT_SERVER), "SMP").await;

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/api/servers/{id}"),
        Some(json!({ "auto_restart_time": "25:99" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/api/servers/{id}"),
        Some(json!({
            "display_name": "Survival",
            "auto_restart_enabled": true,
            "auto_restart_time": "05:30",
            "discord_webhook_url": ""
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["display_name"], "Survival");
    assert_eq!(body["profile"]["auto_restart_time"], "05:30");
    assert!(body["profile"]["discord_webhook_url"].is_null());
    assert_eq!(state.save_queue.pending(), 1);

    assert_eq!(state.save_queue.flush().await, 1);
    let stored = state.save_queue.store().load_all().await.unwrap();
    assert_eq!(stored[0].display_name, "Survival");
    assert!(stored[0].auto_restart_enabled);
}

#[tokio::test]
async fn console_routes_need_a_running_server() {
    let dir = tempfile::tempdir().unwrap();
    let app = api::router(app_state(dir.path()));
    let id = import(&app, &server_folder(dir.path(), "idle", OBEDIENT_SERVER), "Idle").await;

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/servers/{id}/command"),
        Some(json!({ "command": "list" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/servers/{id}/players/Steve/promote"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/servers/{id}/players/not%20a%20name/op"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, Method::POST, &format!("/api/servers/{id}/restart"), None).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
async fn lifecycle_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path());
    let app = api::router(state.clone());
    let id = import(&app, &server_folder(dir.path(), "live", OBEDIENT_SERVER), "Live").await;

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/api/servers/{id}"),
        Some(json!({ "launch_mode": "batch_script", "batch_filename": "start.sh" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::POST, &format!("/api/servers/{id}/start"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["outcome"], "started");
    assert!(body["pid"].as_u64().is_some());

    let (_, body) = call(&app, Method::POST, &format!("/api/servers/{id}/start"), None).await;
    assert_eq!(body["outcome"], "already_running");

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/servers/{id}/command"),
        Some(json!({ "command": "  say hi  " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/servers/{id}/command"),
        Some(json!({ "command": "say hi\nstop" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid request");
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/servers/{id}/players/Steve/whitelist-add"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let supervisor = state.process_manager.get(&id).await.unwrap();
    assert!(wait_until(Duration::from_secs(5), || supervisor
        .log()
        .contains("cmd: whitelist add Steve"))
    .await);

    let (_, history) = call(&app, Method::GET, &format!("/api/servers/{id}/history"), None).await;
    assert_eq!(history, json!(["say hi", "whitelist add Steve"]));

    let (status, lines) = call(
        &app,
        Method::GET,
        &format!("/api/servers/{id}/console?lines=2"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lines.as_array().unwrap().len(), 2);

    let (_, body) = call(&app, Method::GET, "/api/servers", None).await;
    assert_eq!(body[0]["status"]["state"], "running");
    assert_eq!(body[0]["status"]["running"], true);

    let (status, body) = call(&app, Method::POST, &format!("/api/servers/{id}/stop"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "stopped");

    let (_, body) = call(&app, Method::POST, &format!("/api/servers/{id}/stop"), None).await;
    assert_eq!(body["outcome"], "already_stopped");
}

#[tokio::test]
async fn delete_stops_and_forgets_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(dir.path());
    let app = api::router(state.clone());
    let id = import(&app, &server_folder(dir.path(), "old", OBEDIENT_SERVER), "Old").await;

    let (status, body) = call(&app, Method::DELETE, &format!("/api/servers/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    assert!(state.process_manager.get(&id).await.is_none());
    assert!(state.save_queue.store().load_all().await.unwrap().is_empty());

    let (status, _) = call(&app, Method::DELETE, &format!("/api/servers/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

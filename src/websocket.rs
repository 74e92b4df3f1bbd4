//! Browser-facing WebSocket endpoint: one event loop per client.
//!
//! Each client gets a targeted initial snapshot (or a "reconnecting"
//! advisory), then receives every broadcast message. Inbound frames are
//! parsed as commands and forwarded upstream — only while the upstream
//! session is Healthy; otherwise they are dropped.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::app::broadcast::{
    self, OVERLAY_SOURCE_NAME, push_scenes, push_sources, push_stream_status, push_text_counter,
    request,
};
use crate::obs::CallError;
use crate::obs::types::{SceneItemListResponse, StreamStatusResponse};
use crate::protocol::{ClientCommand, SceneItem, ServerMessage};

/// Gets called for every new web client and runs its event loop.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_loop(socket, state))
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("Failed to serialize websocket message: {}", e);
            Err(axum::Error::new(e))
        }
    }
}

/// Sends the complete current state to this socket alone, before it sees any
/// broadcast traffic. While the upstream is down the client gets a
/// "reconnecting" advisory instead.
async fn send_initial_state(socket: &mut WebSocket, state: &AppState) -> Result<(), axum::Error> {
    if !state.liveness_rx.borrow().is_healthy() {
        return send_message(
            socket,
            &ServerMessage::Reconnecting {
                message: Some("Attempting to reconnect to OBS...".to_string()),
            },
        )
        .await;
    }

    let upstream = &state.upstream;
    let pieces = [
        broadcast::fetch_scenes(upstream).await,
        broadcast::fetch_sources(upstream).await,
        broadcast::fetch_stream_status(upstream).await,
        broadcast::fetch_media_status(upstream).await,
    ];
    for piece in pieces {
        match piece {
            Ok(msg) => send_message(socket, &msg).await?,
            Err(e) => warn!(error = %e, "Skipping snapshot piece for new client"),
        }
    }
    match broadcast::fetch_text_counter(upstream).await {
        Ok(Some(msg)) => send_message(socket, &msg).await?,
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Skipping overlay text for new client"),
    }
    Ok(())
}

async fn client_loop(mut socket: WebSocket, state: AppState) {
    // Subscribe before the snapshot so nothing broadcast in between is lost.
    let mut rx = state.ws_tx.subscribe();
    info!("Browser client connected");

    if let Err(e) = send_initial_state(&mut socket, &state).await {
        warn!("Failed to send initial state: {}", e);
        return;
    }

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Ok(msg) => {
                        if let Err(e) = send_message(&mut socket, &msg).await {
                            debug!("Failed to send message, closing connection: {}", e);
                            break;
                        }
                    }
                    // Delivery is best-effort: a slow client skips what it
                    // missed, nothing is replayed.
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Client lagged, skipped {} messages", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_text(&text, &state).await,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Browser client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("WebSocket receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

async fn handle_text(text: &str, state: &AppState) {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            debug!("Ignoring malformed client message: {}", e);
            return;
        }
    };
    handle_command(command, state).await;
}

/// Dispatches one client command. Commands arriving while the upstream is
/// not Healthy are dropped without issuing any upstream call.
async fn handle_command(command: ClientCommand, state: &AppState) {
    if !state.liveness_rx.borrow().is_healthy() {
        debug!(?command, "Dropping command while OBS is unavailable");
        return;
    }

    let result = match command {
        ClientCommand::ChangeScene { scene } => change_scene(state, scene).await,
        ClientCommand::ToggleSource { scene, source } => toggle_source(state, scene, source).await,
        ClientCommand::ToggleStream => toggle_stream(state).await,
        ClientCommand::ChangeTextCounter { new_text } => change_text_counter(state, new_text).await,
    };
    if let Err(e) = result {
        warn!(error = %e, "Client command failed");
    }
}

async fn change_scene(state: &AppState, scene: String) -> Result<(), CallError> {
    state
        .upstream
        .call("SetCurrentProgramScene", json!({"sceneName": scene}))
        .await?;
    push_scenes(state).await;
    push_sources(state).await;
    Ok(())
}

async fn toggle_source(state: &AppState, scene: String, source: String) -> Result<(), CallError> {
    let items: SceneItemListResponse = request(
        &state.upstream,
        "GetSceneItemList",
        json!({"sceneName": scene}),
    )
    .await?;
    let Some(item) = find_scene_item(&items.scene_items, &source) else {
        debug!(%scene, %source, "No such scene item, dropping toggle");
        return Ok(());
    };
    state
        .upstream
        .call(
            "SetSceneItemEnabled",
            json!({
                "sceneName": scene,
                "sceneItemId": item.scene_item_id,
                "sceneItemEnabled": !item.scene_item_enabled,
            }),
        )
        .await?;
    push_sources(state).await;
    Ok(())
}

async fn toggle_stream(state: &AppState) -> Result<(), CallError> {
    let status: StreamStatusResponse =
        request(&state.upstream, "GetStreamStatus", json!({})).await?;
    state
        .upstream
        .call(stream_toggle_request(status.output_active), json!({}))
        .await?;
    push_stream_status(state).await;
    Ok(())
}

async fn change_text_counter(state: &AppState, new_text: String) -> Result<(), CallError> {
    state
        .upstream
        .call(
            "SetInputSettings",
            json!({
                "inputName": OVERLAY_SOURCE_NAME,
                "inputSettings": {"text": new_text},
            }),
        )
        .await?;
    push_text_counter(state).await;
    Ok(())
}

/// Resolves a source within a scene's item list by name; first match wins.
fn find_scene_item<'a>(items: &'a [SceneItem], source: &str) -> Option<&'a SceneItem> {
    items.iter().find(|item| item.source_name == source)
}

/// The call inverting the current stream state.
fn stream_toggle_request(is_streaming: bool) -> &'static str {
    if is_streaming { "StopStream" } else { "StartStream" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, id: i64, enabled: bool) -> SceneItem {
        SceneItem {
            source_name: name.to_string(),
            scene_item_id: id,
            scene_item_enabled: enabled,
        }
    }

    #[test]
    fn find_scene_item_first_match_wins() {
        let items = vec![item("Cam", 1, true), item("Cam", 2, false), item("Mic", 3, true)];
        let found = find_scene_item(&items, "Cam").unwrap();
        assert_eq!(found.scene_item_id, 1);
    }

    #[test]
    fn find_scene_item_absent_is_none() {
        let items = vec![item("Cam", 1, true)];
        assert!(find_scene_item(&items, "Overlay").is_none());
    }

    #[test]
    fn stream_toggle_issues_the_inverse_call() {
        assert_eq!(stream_toggle_request(false), "StartStream");
        assert_eq!(stream_toggle_request(true), "StopStream");
    }
}

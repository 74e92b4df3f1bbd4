//! Snapshot fetchers and the fan-out push helpers.
//!
//! Each push is independently fallible: a failed fetch is logged with the
//! operation name and that one piece is skipped, never retried.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::app::state::{AppState, Upstream};
use crate::obs::CallError;
use crate::obs::types::{
    CurrentSceneResponse, InputSettingsResponse, MediaInputStatusResponse, SceneItemListResponse,
    SceneListResponse, StreamStatusResponse,
};
use crate::protocol::{MediaStatus, ServerMessage};

/// The fixed text-overlay source the relay mirrors and updates.
pub const OVERLAY_SOURCE_NAME: &str = "TXTTHCounter";
/// Input kind identifying a media playback source.
pub const MEDIA_SOURCE_KIND: &str = "ffmpeg_source";

/// Issues a request and deserializes its response data.
pub(crate) async fn request<T: DeserializeOwned>(
    upstream: &Upstream,
    request_type: &str,
    request_data: Value,
) -> Result<T, CallError> {
    let response = upstream.call(request_type, request_data).await?;
    serde_json::from_value(response).map_err(|e| CallError::Malformed(e.to_string()))
}

pub(crate) async fn current_scene(upstream: &Upstream) -> Result<String, CallError> {
    let current: CurrentSceneResponse =
        request(upstream, "GetCurrentProgramScene", json!({})).await?;
    Ok(current.current_program_scene_name)
}

pub(crate) async fn fetch_scenes(upstream: &Upstream) -> Result<ServerMessage, CallError> {
    let list: SceneListResponse = request(upstream, "GetSceneList", json!({})).await?;
    let active_scene = current_scene(upstream).await?;
    Ok(ServerMessage::Scenes {
        scenes: list.scenes.into_iter().map(|s| s.scene_name).collect(),
        active_scene,
    })
}

/// Items of the currently active scene.
pub(crate) async fn fetch_sources(upstream: &Upstream) -> Result<ServerMessage, CallError> {
    let scene = current_scene(upstream).await?;
    let items: SceneItemListResponse =
        request(upstream, "GetSceneItemList", json!({"sceneName": scene})).await?;
    Ok(ServerMessage::Sources {
        scene,
        sources: items.scene_items,
    })
}

pub(crate) async fn fetch_stream_status(upstream: &Upstream) -> Result<ServerMessage, CallError> {
    let status: StreamStatusResponse = request(upstream, "GetStreamStatus", json!({})).await?;
    Ok(ServerMessage::StreamStatus {
        is_streaming: status.output_active,
    })
}

/// Scans the active scene for the first media source and reports its
/// playback state, or the explicit no-media marker.
pub(crate) async fn fetch_media_status(upstream: &Upstream) -> Result<ServerMessage, CallError> {
    let scene = current_scene(upstream).await?;
    let items: SceneItemListResponse =
        request(upstream, "GetSceneItemList", json!({"sceneName": scene})).await?;

    let mut media_source = None;
    for item in items.scene_items {
        // Non-input items (groups, nested scenes) fail this lookup; skip them.
        let Ok(settings) = request::<InputSettingsResponse>(
            upstream,
            "GetInputSettings",
            json!({"inputName": item.source_name}),
        )
        .await
        else {
            continue;
        };
        if settings.input_kind.as_deref() == Some(MEDIA_SOURCE_KIND) {
            media_source = Some(item.source_name);
            break;
        }
    }

    let Some(source_name) = media_source else {
        return Ok(ServerMessage::MediaStatus(MediaStatus::no_media()));
    };

    let status: MediaInputStatusResponse = request(
        upstream,
        "GetMediaInputStatus",
        json!({"inputName": source_name}),
    )
    .await?;
    Ok(ServerMessage::MediaStatus(MediaStatus::Playing {
        state: status.media_state,
        source_name,
        current_time: status.media_cursor,
        total_time: status.media_duration,
    }))
}

/// Current overlay text, or `None` when the source has no non-empty text.
pub(crate) async fn fetch_text_counter(
    upstream: &Upstream,
) -> Result<Option<ServerMessage>, CallError> {
    let settings: InputSettingsResponse = request(
        upstream,
        "GetInputSettings",
        json!({"inputName": OVERLAY_SOURCE_NAME}),
    )
    .await?;
    Ok(settings
        .input_settings
        .get("text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(|text| ServerMessage::TextCounter {
            text: text.to_string(),
        }))
}

fn send(state: &AppState, msg: ServerMessage) {
    if state.ws_tx.send(msg).is_err() {
        debug!("No connected clients");
    }
}

pub(crate) async fn push_scenes(state: &AppState) {
    match fetch_scenes(&state.upstream).await {
        Ok(msg) => send(state, msg),
        Err(e) => warn!(error = %e, "Failed to fetch scene list"),
    }
}

pub(crate) async fn push_sources(state: &AppState) {
    match fetch_sources(&state.upstream).await {
        Ok(msg) => send(state, msg),
        Err(e) => warn!(error = %e, "Failed to fetch scene items"),
    }
}

pub(crate) async fn push_stream_status(state: &AppState) {
    match fetch_stream_status(&state.upstream).await {
        Ok(msg) => send(state, msg),
        Err(e) => warn!(error = %e, "Failed to fetch stream status"),
    }
}

pub(crate) async fn push_media_status(state: &AppState) {
    match fetch_media_status(&state.upstream).await {
        Ok(msg) => send(state, msg),
        Err(e) => warn!(error = %e, "Failed to fetch media status"),
    }
}

pub(crate) async fn push_text_counter(state: &AppState) {
    match fetch_text_counter(&state.upstream).await {
        Ok(Some(msg)) => send(state, msg),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to fetch overlay text"),
    }
}

/// Full-state push: scenes, sources, stream status, media status — each
/// piece independent of the others' failures.
pub(crate) async fn push_all(state: &AppState) {
    push_scenes(state).await;
    push_sources(state).await;
    push_stream_status(state).await;
    push_media_status(state).await;
}

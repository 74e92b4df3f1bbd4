//! Typed views over the obs-websocket responses the relay consumes.
//!
//! Unknown response fields are ignored; only what the relay reads is named.

use serde::Deserialize;
use serde_json::Value;

use crate::protocol::SceneItem;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SceneListResponse {
    pub scenes: Vec<SceneRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SceneRef {
    pub scene_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CurrentSceneResponse {
    pub current_program_scene_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SceneItemListResponse {
    pub scene_items: Vec<SceneItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StreamStatusResponse {
    pub output_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InputSettingsResponse {
    #[serde(default)]
    pub input_kind: Option<String>,
    #[serde(default)]
    pub input_settings: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MediaInputStatusResponse {
    pub media_state: String,
    #[serde(default)]
    pub media_duration: Option<f64>,
    #[serde(default)]
    pub media_cursor: Option<f64>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scene_item_list_ignores_extra_fields() {
        let response: SceneItemListResponse = serde_json::from_value(json!({
            "sceneItems": [{
                "sourceName": "Cam",
                "sceneItemId": 1,
                "sceneItemEnabled": true,
                "sceneItemIndex": 0,
                "inputKind": "v4l2_input",
            }],
        }))
        .unwrap();
        assert_eq!(response.scene_items.len(), 1);
        assert_eq!(response.scene_items[0].source_name, "Cam");
    }

    #[test]
    fn media_input_status_tolerates_null_cursor() {
        let response: MediaInputStatusResponse = serde_json::from_value(json!({
            "mediaState": "OBS_MEDIA_STATE_STOPPED",
            "mediaDuration": null,
            "mediaCursor": null,
        }))
        .unwrap();
        assert_eq!(response.media_state, "OBS_MEDIA_STATE_STOPPED");
        assert!(response.media_cursor.is_none());
        assert!(response.media_duration.is_none());
    }
}

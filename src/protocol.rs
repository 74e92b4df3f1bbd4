//! Wire format spoken with browser clients.
//!
//! Every message is a JSON object with a `type` discriminator. Server→client
//! messages carry state snapshots; client→server messages carry commands.

use serde::{Deserialize, Serialize};

/// Marker value broadcast when the active scene contains no media source.
pub const NO_MEDIA: &str = "NO_MEDIA";

/// A single item within a scene, as shown to browser clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItem {
    pub source_name: String,
    pub scene_item_id: i64,
    pub scene_item_enabled: bool,
}

/// Media playback state of the active scene, or the explicit marker that no
/// media source is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaStatus {
    #[serde(rename_all = "camelCase")]
    Playing {
        state: String,
        source_name: String,
        current_time: Option<f64>,
        total_time: Option<f64>,
    },
    NoMedia { error: String },
}

impl MediaStatus {
    /// The `{error: "NO_MEDIA"}` marker.
    pub fn no_media() -> Self {
        Self::NoMedia {
            error: NO_MEDIA.to_string(),
        }
    }
}

/// Messages pushed to browser clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Scene list plus the currently active scene.
    #[serde(rename_all = "camelCase")]
    Scenes {
        scenes: Vec<String>,
        active_scene: String,
    },
    /// Items of the named scene.
    Sources {
        scene: String,
        sources: Vec<SceneItem>,
    },
    #[serde(rename_all = "camelCase")]
    StreamStatus { is_streaming: bool },
    MediaStatus(MediaStatus),
    /// Current text of the fixed overlay source.
    TextCounter { text: String },
    /// Advisory sent while the upstream OBS connection is down.
    Reconnecting {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

/// Commands accepted from browser clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientCommand {
    ChangeScene { scene: String },
    ToggleSource { scene: String, source: String },
    ToggleStream,
    #[serde(rename_all = "camelCase")]
    ChangeTextCounter { new_text: String },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scenes_message_shape() {
        let msg = ServerMessage::Scenes {
            scenes: vec!["SceneA".to_string(), "SceneB".to_string()],
            active_scene: "SceneA".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "scenes",
                "scenes": ["SceneA", "SceneB"],
                "activeScene": "SceneA",
            })
        );
    }

    #[test]
    fn sources_message_shape() {
        let msg = ServerMessage::Sources {
            scene: "SceneA".to_string(),
            sources: vec![SceneItem {
                source_name: "Cam".to_string(),
                scene_item_id: 3,
                scene_item_enabled: true,
            }],
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "sources",
                "scene": "SceneA",
                "sources": [{
                    "sourceName": "Cam",
                    "sceneItemId": 3,
                    "sceneItemEnabled": true,
                }],
            })
        );
    }

    #[test]
    fn media_status_no_media_exact_shape() {
        let msg = ServerMessage::MediaStatus(MediaStatus::no_media());
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "mediaStatus", "error": "NO_MEDIA"})
        );
    }

    #[test]
    fn media_status_playing_shape() {
        let msg = ServerMessage::MediaStatus(MediaStatus::Playing {
            state: "OBS_MEDIA_STATE_PLAYING".to_string(),
            source_name: "Intro".to_string(),
            current_time: Some(1500.0),
            total_time: Some(60000.0),
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "mediaStatus",
                "state": "OBS_MEDIA_STATE_PLAYING",
                "sourceName": "Intro",
                "currentTime": 1500.0,
                "totalTime": 60000.0,
            })
        );
    }

    #[test]
    fn reconnecting_omits_absent_message() {
        let bare = ServerMessage::Reconnecting { message: None };
        assert_eq!(
            serde_json::to_value(&bare).unwrap(),
            json!({"type": "reconnecting"})
        );

        let with_text = ServerMessage::Reconnecting {
            message: Some("Attempting to reconnect to OBS...".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&with_text).unwrap(),
            json!({"type": "reconnecting", "message": "Attempting to reconnect to OBS..."})
        );
    }

    #[test]
    fn client_commands_parse() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"changeScene","scene":"SceneB"}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::ChangeScene {
                scene: "SceneB".to_string()
            }
        );

        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"toggleSource","scene":"SceneA","source":"Cam"}"#)
                .unwrap();
        assert_eq!(
            cmd,
            ClientCommand::ToggleSource {
                scene: "SceneA".to_string(),
                source: "Cam".to_string()
            }
        );

        let cmd: ClientCommand = serde_json::from_str(r#"{"type":"toggleStream"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::ToggleStream);

        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"changeTextCounter","newText":"7"}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::ChangeTextCounter {
                new_text: "7".to_string()
            }
        );
    }

    #[test]
    fn unknown_command_type_is_an_error() {
        let res = serde_json::from_str::<ClientCommand>(r#"{"type":"selfDestruct"}"#);
        assert!(res.is_err());
    }
}

//! Defines the WebSocket message protocol between the app and the API server.

use crate::models;
use sahay_core::language::Language;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client (the mobile app) to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Attaches to an existing session. This must be the first message.
    Init { session_id: Uuid },
    /// One user question for the narrator. A new `ask` supersedes any turn
    /// still in flight.
    Ask { text: String },
    /// The component identifiers currently mounted on the active screen.
    /// Replaces the session's registry wholesale.
    SyncMounted { components: Vec<String> },
    /// Switches the display language mid-session and persists the choice.
    SetLanguage { language: Language },
    /// A decoded QR payload from the scanning practice step.
    QrResult { payload: String },
}

/// Messages sent from the server to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms successful attachment and provides the session transcript.
    Initialized {
        session_id: Uuid,
        tutorial: String,
        language: String,
        history: Vec<models::Message>,
    },
    /// One narrator reply. `highlight` is already resolved against the
    /// mounted components and is omitted when nothing should be highlighted.
    Reply {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        highlight: Option<String>,
    },
    /// Confirms a mid-session language switch.
    LanguageChanged { language: String },
    /// Whether the scanned QR payload passed the practice check.
    PracticeResult { accepted: bool },
    /// Reports a fatal error to the client.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ask_deserializes() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"ask","text":"What is a PIN?"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ask { text } if text == "What is a PIN?"));
    }

    #[test]
    fn client_init_requires_session_id() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"init"}"#).is_err());
    }

    #[test]
    fn client_set_language_uses_language_tokens() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"set_language","language":"bengali"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::SetLanguage {
                language: Language::Bengali
            }
        ));
    }

    #[test]
    fn reply_omits_absent_highlight() {
        let with = ServerMessage::Reply {
            text: "Tap here.".to_string(),
            highlight: Some("pay".to_string()),
        };
        let without = ServerMessage::Reply {
            text: "All done.".to_string(),
            highlight: None,
        };
        assert_eq!(
            serde_json::to_string(&with).unwrap(),
            r#"{"type":"reply","text":"Tap here.","highlight":"pay"}"#
        );
        assert_eq!(
            serde_json::to_string(&without).unwrap(),
            r#"{"type":"reply","text":"All done."}"#
        );
    }
}

//! API and Database Models
//!
//! This module defines the data structures used for database mapping with
//! `sqlx` and for generating OpenAPI documentation with `utoipa`.

use chrono::{DateTime, Utc};
use sahay_core::language::Language;
use sahay_core::registry::TutorialId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(sqlx::Type, Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

#[derive(sqlx::Type, Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
#[sqlx(type_name = "message_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One tutorial session. `tutorial` and `language` are stored as their wire
/// tokens (`upi-pay`, `hindi`) and parsed into core types at the edges.
#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct Session {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub user_id: String,
    #[schema(example = "upi-pay")]
    pub tutorial: String,
    #[schema(example = "hindi")]
    pub language: String,
    #[schema(value_type = String, example = "active")]
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct Message {
    pub id: i64,
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    #[schema(value_type = String, example = "user")]
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateSessionPayload {
    #[schema(value_type = String, example = "upi-pay")]
    pub tutorial: TutorialId,
    /// Omit to use the user's saved preference (or the service default).
    #[schema(value_type = Option<String>, example = "hindi")]
    pub language: Option<Language>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateSessionStatusPayload {
    #[schema(example = "ended")]
    pub status: SessionStatus,
}

/// One entry of the tutorial catalog.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct TutorialSummary {
    #[schema(example = "upi-pay")]
    pub id: String,
    #[schema(example = "Paying with UPI")]
    pub title: String,
    #[schema(value_type = Vec<String>)]
    pub steps: Vec<String>,
    /// The closed `highlight` vocabulary of this tutorial's page.
    pub components: Vec<String>,
}

impl From<TutorialId> for TutorialSummary {
    fn from(id: TutorialId) -> Self {
        Self {
            id: id.as_str().to_string(),
            title: id.title().to_string(),
            steps: id.steps().iter().map(|s| s.as_str().to_string()).collect(),
            components: id
                .component_ids()
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_serde_uses_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Active).unwrap(),
            "\"active\""
        );
        let parsed: SessionStatus = serde_json::from_str("\"ended\"").unwrap();
        assert_eq!(parsed, SessionStatus::Ended);
    }

    #[test]
    fn test_message_role_serde_and_display() {
        assert_eq!(
            serde_json::to_string(&MessageRole::Assistant).unwrap(),
            "\"assistant\""
        );
        let parsed: MessageRole = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(parsed, MessageRole::User);
        assert_eq!(format!("{}", MessageRole::Assistant), "assistant");
    }

    #[test]
    fn test_session_round_trips_through_json() {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: "user-7".to_string(),
            tutorial: "upi-pay".to_string(),
            language: "hindi".to_string(),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&session).unwrap();
        let deserialized: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.id, session.id);
        assert_eq!(deserialized.tutorial, session.tutorial);
        assert_eq!(deserialized.language, session.language);
        assert_eq!(deserialized.status, session.status);
    }

    #[test]
    fn test_create_session_payload_deserialization() {
        let payload: CreateSessionPayload =
            serde_json::from_str(r#"{"tutorial": "qr-scan", "language": "tamil"}"#).unwrap();
        assert_eq!(payload.tutorial, TutorialId::QrScan);
        assert_eq!(payload.language, Some(Language::Tamil));

        let payload: CreateSessionPayload =
            serde_json::from_str(r#"{"tutorial": "login"}"#).unwrap();
        assert_eq!(payload.tutorial, TutorialId::Login);
        assert_eq!(payload.language, None);
    }

    #[test]
    fn test_create_session_payload_rejects_unknown_tutorial() {
        let result: Result<CreateSessionPayload, _> =
            serde_json::from_str(r#"{"tutorial": "netbanking"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_tutorial_summary_carries_vocabulary() {
        let summary = TutorialSummary::from(TutorialId::Login);
        assert_eq!(summary.id, "login");
        assert_eq!(summary.title, "Signing in");
        assert_eq!(summary.steps, vec!["walkthrough", "practice"]);
        assert_eq!(summary.components, vec!["email", "password", "login"]);
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Session not found".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&error).unwrap(),
            r#"{"message":"Session not found"}"#
        );
    }
}

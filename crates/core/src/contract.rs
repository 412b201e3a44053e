//! The assistant wire contract.
//!
//! The generative backend narrating a tutorial must answer every user turn
//! with a single JSON object of exactly two string fields:
//!
//! ```json
//! { "text": "<explanation in the user's language>", "highlight": "<component-id-or-'null'>" }
//! ```
//!
//! `text` is spoken/displayed in the user's selected language. `highlight` is
//! always an English token from the active page's closed component set, or
//! the literal string `"null"` (not a JSON null) meaning "highlight nothing".
//! Anything else is a contract violation.

use crate::registry::TutorialId;
use serde::{Deserialize, Serialize};

/// The sentinel `highlight` value meaning "no element should be highlighted".
///
/// This is the five-character string `"null"`, deliberately distinct from a
/// JSON `null` value, which the contract rejects.
pub const NO_HIGHLIGHT: &str = "null";

/// A validated assistant reply. Produced fresh per user turn and never
/// persisted beyond its transient display use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantReply {
    /// Explanation to speak/display, in the user's selected language.
    pub text: String,
    /// Component identifier to highlight, or [`NO_HIGHLIGHT`].
    pub highlight: String,
}

impl AssistantReply {
    pub fn wants_highlight(&self) -> bool {
        self.highlight != NO_HIGHLIGHT
    }
}

/// Ways a raw assistant reply can violate the contract.
///
/// Neither variant is fatal: callers degrade to displaying whatever text is
/// recoverable, with no highlight.
#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    /// The raw reply was not parseable JSON at all (e.g. surrounding prose
    /// or markdown fencing around the object).
    #[error("assistant reply is not valid JSON: {0}")]
    MalformedJson(#[source] serde_json::Error),
    /// The reply parsed as JSON but broke the two-field/known-identifier
    /// contract. `text` carries the display text when it was itself valid,
    /// so the caller can still show it highlight-free.
    #[error("assistant reply violates the contract: {reason}")]
    SchemaViolation {
        reason: String,
        text: Option<String>,
    },
}

/// Parses `raw` strictly against the contract for the given page.
///
/// A JSON `null` for `highlight`, a missing field, an empty `text`, a
/// non-string value, or an extra key are all [`ReplyError::SchemaViolation`];
/// unparseable input is [`ReplyError::MalformedJson`].
pub fn parse_assistant_reply(raw: &str, page: TutorialId) -> Result<AssistantReply, ReplyError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(ReplyError::MalformedJson)?;

    // Recover the display text up front so schema failures can still degrade
    // to showing it.
    let recovered = value
        .get("text")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .map(str::to_owned);

    let reply: AssistantReply =
        serde_json::from_value(value).map_err(|e| ReplyError::SchemaViolation {
            reason: e.to_string(),
            text: recovered.clone(),
        })?;

    if reply.text.is_empty() {
        return Err(ReplyError::SchemaViolation {
            reason: "`text` must be a non-empty string".to_string(),
            text: None,
        });
    }

    if reply.highlight != NO_HIGHLIGHT
        && !page.component_ids().contains(&reply.highlight.as_str())
    {
        return Err(ReplyError::SchemaViolation {
            reason: format!(
                "'{}' is not a component of the '{}' page",
                reply.highlight, page
            ),
            text: Some(reply.text),
        });
    }

    Ok(reply)
}

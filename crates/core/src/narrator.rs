//! The per-session narrator turn driver.
//!
//! Drives exactly one assistant call per user question and applies the
//! contract's failure semantics: a rejected reply degrades to whatever text
//! is recoverable, and repeated rejections stop being silently degraded and
//! instead tell the caller to re-prompt the user.

use crate::Directive;
use crate::assistant::{AssistantClient, TurnMessage};
use crate::contract::{AssistantReply, ReplyError, parse_assistant_reply};
use crate::language::Language;
use crate::prompt::build_system_prompt;
use crate::registry::{ComponentRegistry, TutorialId, resolve_highlight_target};
use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

/// Consecutive contract violations tolerated before the narrator gives up
/// degrading and asks the caller to re-prompt the user.
pub const MAX_CONTRACT_STRIKES: u8 = 3;

/// The result of one narrator turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The backend honored the contract.
    Reply(AssistantReply),
    /// The reply violated the contract but left usable display text; show it
    /// with no highlight.
    Degraded { text: String },
    /// Too many consecutive violations. Show the generic line and invite the
    /// user to rephrase instead of retrying the backend.
    Reprompt { text: String },
}

impl Outcome {
    /// The text to speak/display for this outcome.
    pub fn text(&self) -> &str {
        match self {
            Outcome::Reply(reply) => &reply.text,
            Outcome::Degraded { text } | Outcome::Reprompt { text } => text,
        }
    }

    /// Translates the outcome into runtime directives, resolving the
    /// highlight against the currently mounted components.
    pub fn directives(&self, registry: &ComponentRegistry) -> Vec<Directive> {
        match self {
            Outcome::Reply(reply) => {
                let highlight = match resolve_highlight_target(reply, registry) {
                    Some(target) => Directive::Highlight(target.id.clone()),
                    None => Directive::ClearHighlight,
                };
                vec![Directive::SpeakText(reply.text.clone()), highlight]
            }
            Outcome::Degraded { text } | Outcome::Reprompt { text } => {
                vec![Directive::SpeakText(text.clone()), Directive::ClearHighlight]
            }
        }
    }
}

/// Everything one backend roundtrip needs, detached from the narrator so a
/// caller holding the narrator behind a lock can release it for the duration
/// of the call and keep its event loop responsive.
pub struct PendingTurn {
    client: Arc<dyn AssistantClient>,
    system_prompt: String,
}

impl PendingTurn {
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Performs the backend call for this turn.
    pub async fn narrate(&self, turns: &[TurnMessage]) -> Result<String> {
        self.client.narrate(&self.system_prompt, turns).await
    }
}

/// Owns the assistant conversation for one mounted tutorial screen.
pub struct Narrator {
    client: Arc<dyn AssistantClient>,
    tutorial: TutorialId,
    language: Language,
    strikes: u8,
}

impl Narrator {
    pub fn new(client: Arc<dyn AssistantClient>, tutorial: TutorialId, language: Language) -> Self {
        Self {
            client,
            tutorial,
            language,
            strikes: 0,
        }
    }

    pub fn tutorial(&self) -> TutorialId {
        self.tutorial
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Switches the display language mid-session. The next prompt picks it
    /// up; no other state changes.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    /// Snapshots the client handle and system prompt for one backend call.
    ///
    /// The returned value borrows nothing from the narrator, so the call can
    /// run while the narrator itself stays free for language switches.
    pub fn begin_turn(&self) -> PendingTurn {
        PendingTurn {
            client: self.client.clone(),
            system_prompt: build_system_prompt(self.tutorial, self.language),
        }
    }

    /// Validates one raw backend reply and applies the degradation policy.
    pub fn conclude(&mut self, raw: &str) -> Outcome {
        match parse_assistant_reply(raw, self.tutorial) {
            Ok(reply) => {
                self.strikes = 0;
                Outcome::Reply(reply)
            }
            Err(err) => {
                self.strikes = self.strikes.saturating_add(1);
                warn!(
                    tutorial = %self.tutorial,
                    strikes = self.strikes,
                    error = %err,
                    "assistant reply rejected"
                );

                if self.strikes >= MAX_CONTRACT_STRIKES {
                    return Outcome::Reprompt {
                        text: self.language.rephrase_line().to_string(),
                    };
                }

                let text = match err {
                    ReplyError::SchemaViolation { text: Some(text), .. } => text,
                    _ => self.language.rephrase_line().to_string(),
                };
                Outcome::Degraded { text }
            }
        }
    }

    /// Answers one user question in a single call.
    ///
    /// `turns` is the session transcript ending with the user's latest
    /// question. Transport failures are returned as `Err` and are not
    /// counted as contract strikes. Callers sharing the narrator behind a
    /// lock should prefer `begin_turn`/`conclude` so the lock is not held
    /// across the backend roundtrip.
    pub async fn answer(&mut self, turns: &[TurnMessage]) -> Result<Outcome> {
        let pending = self.begin_turn();
        let raw = pending.narrate(turns).await?;
        Ok(self.conclude(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::MockAssistantClient;
    use anyhow::anyhow;

    fn narrator_with(raw_replies: Vec<&'static str>) -> Narrator {
        let mut client = MockAssistantClient::new();
        let mut replies = raw_replies.into_iter();
        client
            .expect_narrate()
            .returning(move |_, _| Ok(replies.next().expect("ran out of canned replies").to_string()));
        Narrator::new(Arc::new(client), TutorialId::Login, Language::Hindi)
    }

    fn question() -> Vec<TurnMessage> {
        vec![TurnMessage::user("पासवर्ड कहाँ लिखूँ?")]
    }

    #[tokio::test]
    async fn valid_reply_is_returned_and_resets_strikes() {
        let mut narrator = narrator_with(vec![
            "not json at all",
            r#"{"text":"यहाँ लिखें।","highlight":"password"}"#,
            "still not json",
        ]);

        assert!(matches!(
            narrator.answer(&question()).await.unwrap(),
            Outcome::Degraded { .. }
        ));
        let outcome = narrator.answer(&question()).await.unwrap();
        match &outcome {
            Outcome::Reply(reply) => assert_eq!(reply.highlight, "password"),
            other => panic!("expected Reply, got {other:?}"),
        }
        // The earlier strike was cleared by the success, so one more bad
        // reply degrades instead of tripping the re-prompt threshold.
        assert!(matches!(
            narrator.answer(&question()).await.unwrap(),
            Outcome::Degraded { .. }
        ));
    }

    #[tokio::test]
    async fn schema_violation_degrades_to_recovered_text() {
        let mut narrator =
            narrator_with(vec![r#"{"text":"यह बटन दबाएँ।","highlight":"passwordd"}"#]);
        let outcome = narrator.answer(&question()).await.unwrap();
        assert_eq!(outcome, Outcome::Degraded { text: "यह बटन दबाएँ।".to_string() });
    }

    #[tokio::test]
    async fn malformed_reply_degrades_to_localized_generic_line() {
        let mut narrator = narrator_with(vec!["Sure! Here you go."]);
        let outcome = narrator.answer(&question()).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Degraded {
                text: Language::Hindi.rephrase_line().to_string()
            }
        );
    }

    #[tokio::test]
    async fn repeated_violations_signal_reprompt() {
        let mut narrator = narrator_with(vec!["bad", "worse", "worst", "again"]);
        assert!(matches!(
            narrator.answer(&question()).await.unwrap(),
            Outcome::Degraded { .. }
        ));
        assert!(matches!(
            narrator.answer(&question()).await.unwrap(),
            Outcome::Degraded { .. }
        ));
        assert!(matches!(
            narrator.answer(&question()).await.unwrap(),
            Outcome::Reprompt { .. }
        ));
        // Still re-prompting until a reply finally validates.
        assert!(matches!(
            narrator.answer(&question()).await.unwrap(),
            Outcome::Reprompt { .. }
        ));
    }

    #[tokio::test]
    async fn transport_errors_propagate_and_are_not_strikes() {
        let mut client = MockAssistantClient::new();
        let mut calls = 0u8;
        client.expect_narrate().returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(anyhow!("connection reset"))
            } else {
                Ok(r#"{"text":"ठीक है।","highlight":"null"}"#.to_string())
            }
        });
        let mut narrator = Narrator::new(Arc::new(client), TutorialId::Login, Language::Hindi);

        assert!(narrator.answer(&question()).await.is_err());
        assert!(matches!(
            narrator.answer(&question()).await.unwrap(),
            Outcome::Reply(_)
        ));
    }

    #[test]
    fn directives_carry_resolved_highlight() {
        let registry = ComponentRegistry::with_all(TutorialId::Login);
        let outcome = Outcome::Reply(AssistantReply {
            text: "यहाँ लिखें।".to_string(),
            highlight: "email".to_string(),
        });
        assert_eq!(
            outcome.directives(&registry),
            vec![
                Directive::SpeakText("यहाँ लिखें।".to_string()),
                Directive::Highlight("email".to_string()),
            ]
        );
    }

    #[test]
    fn directives_clear_highlight_when_target_unmounted() {
        let registry = ComponentRegistry::new();
        let outcome = Outcome::Reply(AssistantReply {
            text: "यहाँ लिखें।".to_string(),
            highlight: "email".to_string(),
        });
        assert_eq!(
            outcome.directives(&registry),
            vec![
                Directive::SpeakText("यहाँ लिखें।".to_string()),
                Directive::ClearHighlight,
            ]
        );
    }

    #[tokio::test]
    async fn language_can_switch_while_a_turn_is_in_flight() {
        // The pending turn borrows nothing from the narrator, so a lock
        // holder can drop its guard for the backend roundtrip and handle a
        // language switch in the meantime.
        let mut client = MockAssistantClient::new();
        client
            .expect_narrate()
            .returning(|_, _| Ok("not the contract shape".to_string()));
        let mut narrator = Narrator::new(Arc::new(client), TutorialId::Login, Language::Hindi);

        let pending = narrator.begin_turn();
        assert!(pending.system_prompt().contains("Hindi"));

        narrator.set_language(Language::Tamil);
        let raw = pending.narrate(&question()).await.unwrap();

        // The reply is concluded against the narrator's current state: the
        // fallback line now comes out in the newly selected language.
        let outcome = narrator.conclude(&raw);
        assert_eq!(
            outcome,
            Outcome::Degraded {
                text: Language::Tamil.rephrase_line().to_string()
            }
        );
    }

    #[tokio::test]
    async fn set_language_changes_fallback_language() {
        let mut narrator = narrator_with(vec!["garbage"]);
        narrator.set_language(Language::Tamil);
        let outcome = narrator.answer(&question()).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Degraded {
                text: Language::Tamil.rephrase_line().to_string()
            }
        );
    }
}

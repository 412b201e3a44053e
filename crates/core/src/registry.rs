//! Tutorial pages and their component registries.
//!
//! Each tutorial page carries a closed set of component identifiers the
//! assistant is allowed to name in its `highlight` field. The registry tracks
//! which of those components are actually mounted on the active screen at any
//! given moment, so a schema-valid highlight can still resolve to nothing if
//! the user navigated away mid-response.

use crate::contract::AssistantReply;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Identifies one tutorial page, and with it the closed vocabulary of
/// component identifiers the assistant may highlight on that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TutorialId {
    /// Signing in to the app (practice account).
    Login,
    /// Making a simulated UPI payment.
    UpiPay,
    /// Scanning a merchant QR code.
    QrScan,
}

/// The kind of step a tutorial walks the learner through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Walkthrough,
    Practice,
    Assessment,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Walkthrough => "walkthrough",
            StepKind::Practice => "practice",
            StepKind::Assessment => "assessment",
        }
    }
}

impl TutorialId {
    pub const ALL: [TutorialId; 3] = [TutorialId::Login, TutorialId::UpiPay, TutorialId::QrScan];

    /// The closed set of component identifiers valid for this page.
    ///
    /// These are always English tokens, regardless of the user's display
    /// language, and matching is case-sensitive.
    pub fn component_ids(self) -> &'static [&'static str] {
        match self {
            TutorialId::Login => &["email", "password", "login"],
            TutorialId::UpiPay => &["scanner", "amount", "note", "pin_pad", "pay"],
            TutorialId::QrScan => &["camera", "gallery", "torch"],
        }
    }

    /// Human-readable title, used in prompts and the tutorial catalog.
    pub fn title(self) -> &'static str {
        match self {
            TutorialId::Login => "Signing in",
            TutorialId::UpiPay => "Paying with UPI",
            TutorialId::QrScan => "Scanning a QR code",
        }
    }

    pub fn steps(self) -> &'static [StepKind] {
        match self {
            TutorialId::Login => &[StepKind::Walkthrough, StepKind::Practice],
            TutorialId::UpiPay => &[
                StepKind::Walkthrough,
                StepKind::Practice,
                StepKind::Assessment,
            ],
            TutorialId::QrScan => &[StepKind::Walkthrough, StepKind::Practice],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TutorialId::Login => "login",
            TutorialId::UpiPay => "upi-pay",
            TutorialId::QrScan => "qr-scan",
        }
    }
}

impl fmt::Display for TutorialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TutorialId {
    type Err = UnknownTutorial;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(TutorialId::Login),
            "upi-pay" => Ok(TutorialId::UpiPay),
            "qr-scan" => Ok(TutorialId::QrScan),
            other => Err(UnknownTutorial(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown tutorial id: '{0}'")]
pub struct UnknownTutorial(pub String);

/// A handle to a component currently mounted on the active screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRef {
    pub id: String,
}

/// The set of components currently mounted on the active tutorial screen.
///
/// Owned exclusively by the active session; replaced wholesale whenever the
/// client reports a mount change.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    mounted: HashMap<String, ComponentRef>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every component identifier the page declares, for screens
    /// that mount their whole vocabulary at once.
    pub fn with_all(page: TutorialId) -> Self {
        let mut registry = Self::new();
        for id in page.component_ids() {
            registry.mount(*id);
        }
        registry
    }

    pub fn mount(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.mounted.insert(id.clone(), ComponentRef { id });
    }

    /// Replaces the registry contents with the given identifiers.
    pub fn sync(&mut self, ids: impl IntoIterator<Item = String>) {
        self.mounted.clear();
        for id in ids {
            self.mount(id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&ComponentRef> {
        self.mounted.get(id)
    }

    pub fn is_mounted(&self, id: &str) -> bool {
        self.mounted.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.mounted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty()
    }
}

/// Maps a validated reply's `highlight` to the mounted component it names.
///
/// Returns `None` when the reply asks for no highlight, or when the named
/// component is schema-valid but not currently mounted. The latter is not an
/// error: the screen may simply have navigated away mid-response.
pub fn resolve_highlight_target<'a>(
    reply: &AssistantReply,
    registry: &'a ComponentRegistry,
) -> Option<&'a ComponentRef> {
    if !reply.wants_highlight() {
        return None;
    }
    registry.get(&reply.highlight)
}

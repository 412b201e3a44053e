//! Display languages and the user's language preference.
//!
//! The assistant speaks in the user's selected language while `highlight`
//! identifiers stay English. The preference itself lives in an injected
//! [`KeyValueStore`]: load the saved selection when present, otherwise fall
//! back to the device locale, otherwise English.

use crate::store::KeyValueStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Storage key for the saved language selection.
pub const LANGUAGE_KEY: &str = "selected_language";

/// The display languages the product supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Hindi,
    Tamil,
    Bengali,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::English,
        Language::Hindi,
        Language::Tamil,
        Language::Bengali,
    ];

    /// The language's English name, used when instructing the assistant.
    pub fn english_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Tamil => "Tamil",
            Language::Bengali => "Bengali",
        }
    }

    /// Localized "please ask again" line, shown when an assistant reply had
    /// to be discarded and there is no recoverable text to display.
    pub fn rephrase_line(self) -> &'static str {
        match self {
            Language::English => "Sorry, I didn't catch that. Please ask your question again.",
            Language::Hindi => "माफ़ कीजिए, मैं समझ नहीं पाया। कृपया अपना सवाल दोबारा पूछें।",
            Language::Tamil => "மன்னிக்கவும், புரியவில்லை. உங்கள் கேள்வியை மீண்டும் கேளுங்கள்.",
            Language::Bengali => "দুঃখিত, বুঝতে পারিনি। অনুগ্রহ করে আপনার প্রশ্নটি আবার করুন।",
        }
    }

    /// Localized greeting that opens a tutorial session.
    pub fn welcome_line(self, tutorial_title: &str) -> String {
        match self {
            Language::English => format!(
                "Hello! Today we will learn about {tutorial_title}, one small step at a time. Ask me anything whenever you feel stuck."
            ),
            Language::Hindi => format!(
                "नमस्ते! आज हम \"{tutorial_title}\" सीखेंगे, धीरे-धीरे, एक-एक कदम। जब भी कुछ समझ न आए, मुझसे पूछिए।"
            ),
            Language::Tamil => format!(
                "வணக்கம்! இன்று \"{tutorial_title}\" பற்றி படிப்படியாகக் கற்போம். சந்தேகம் வந்தால் என்னிடம் கேளுங்கள்."
            ),
            Language::Bengali => format!(
                "নমস্কার! আজ আমরা \"{tutorial_title}\" শিখব, ধীরে ধীরে, এক ধাপ করে। কিছু না বুঝলে আমাকে জিজ্ঞাসা করুন।"
            ),
        }
    }

    /// Maps a BCP-47 device locale (e.g. `hi-IN`) to a supported language.
    pub fn from_locale(locale: &str) -> Option<Language> {
        let primary = locale.split(['-', '_']).next().unwrap_or(locale);
        match primary.to_ascii_lowercase().as_str() {
            "en" => Some(Language::English),
            "hi" => Some(Language::Hindi),
            "ta" => Some(Language::Tamil),
            "bn" => Some(Language::Bengali),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Hindi => "hindi",
            Language::Tamil => "tamil",
            Language::Bengali => "bengali",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "english" => Ok(Language::English),
            "hindi" => Ok(Language::Hindi),
            "tamil" => Ok(Language::Tamil),
            "bengali" => Ok(Language::Bengali),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown language: '{0}'")]
pub struct UnknownLanguage(pub String);

/// Load/save semantics for the user's language selection.
pub struct LanguagePreference;

impl LanguagePreference {
    /// The saved selection, if one exists and still parses. A saved value
    /// that no longer parses (e.g. a language the product dropped) is
    /// ignored rather than surfaced.
    pub async fn saved(store: &dyn KeyValueStore) -> Option<Language> {
        match store.get(LANGUAGE_KEY).await {
            Ok(Some(saved)) => match saved.parse::<Language>() {
                Ok(language) => Some(language),
                Err(_) => {
                    debug!(saved = %saved, "ignoring unparseable saved language");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(error = ?e, "language preference store unavailable");
                None
            }
        }
    }

    /// Resolves the display language at screen construction time.
    ///
    /// Precedence: saved selection, then device locale, then English.
    pub async fn load(store: &dyn KeyValueStore, device_locale: Option<&str>) -> Language {
        if let Some(language) = Self::saved(store).await {
            return language;
        }
        device_locale
            .and_then(Language::from_locale)
            .unwrap_or(Language::English)
    }

    pub async fn save(store: &dyn KeyValueStore, language: Language) -> Result<()> {
        store.set(LANGUAGE_KEY, language.as_str()).await
    }
}

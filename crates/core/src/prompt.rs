//! System-prompt construction for the tutorial narrator.
//!
//! The instruction text fixes everything the wire contract depends on: the
//! response language for `text`, the English-only `highlight` vocabulary for
//! the active page, the exact two-key JSON shape, and the redirect behavior
//! for off-topic questions.

use crate::language::Language;
use crate::registry::TutorialId;

const TEMPLATE: &str = r#"You are Sahay, a patient tutorial narrator inside a mobile app that teaches newcomers how to do everyday digital tasks. The learner is currently on the "{title}" page and may ask you anything about it.

Rules you must never break:
1. Reply with a single JSON object and nothing else. No text before or after it, no markdown fencing, no extra keys.
2. The object has exactly two keys: "text" and "highlight".
3. "text" is what you say to the learner. Write it in {language}, in short, simple sentences. Never use technical jargon without explaining it.
4. "highlight" names the on-screen element you are talking about, so the app can point at it. It is always an English token taken from this exact list: {components}. Do not invent, translate, or re-spell these tokens.
5. When no element should be highlighted, set "highlight" to the string "null" (the five-character string, never a JSON null).
6. If the learner asks about something unrelated to the "{title}" page, gently bring them back to the tutorial in {language} and set "highlight" to "null".
"#;

/// Builds the governing instruction sent to the generative backend for one
/// tutorial page and display language.
pub fn build_system_prompt(tutorial: TutorialId, language: Language) -> String {
    let components = tutorial
        .component_ids()
        .iter()
        .map(|id| format!("\"{id}\""))
        .collect::<Vec<_>>()
        .join(", ");

    TEMPLATE
        .replace("{title}", tutorial.title())
        .replace("{language}", language.english_name())
        .replace("{components}", &components)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_the_response_language() {
        let prompt = build_system_prompt(TutorialId::Login, Language::Hindi);
        assert!(prompt.contains("Hindi"));
        assert!(!prompt.contains("{language}"));
    }

    #[test]
    fn prompt_enumerates_the_page_vocabulary() {
        for tutorial in TutorialId::ALL {
            let prompt = build_system_prompt(tutorial, Language::English);
            for id in tutorial.component_ids() {
                assert!(
                    prompt.contains(&format!("\"{id}\"")),
                    "prompt for {tutorial} is missing component '{id}'"
                );
            }
        }
    }

    #[test]
    fn prompt_fixes_the_null_sentinel_fallback() {
        let prompt = build_system_prompt(TutorialId::QrScan, Language::Tamil);
        assert!(prompt.contains("\"null\""));
        assert!(prompt.contains("never a JSON null"));
    }

    #[test]
    fn prompt_has_no_unexpanded_placeholders() {
        let prompt = build_system_prompt(TutorialId::UpiPay, Language::Bengali);
        assert!(!prompt.contains('{'));
        assert!(!prompt.contains('}'));
    }
}

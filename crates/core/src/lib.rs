pub mod assistant;
pub mod capture;
pub mod contract;
pub mod language;
pub mod narrator;
pub mod prompt;
pub mod registry;
pub mod store;

/// Represents commands that the core logic issues to the hosting runtime.
///
/// This enum is the primary API for decoupling the narrator's decisions from
/// the runtime's execution of side effects (like speaking a line of text or
/// moving the on-screen highlight).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Command the runtime to speak/display the given text to the user.
    SpeakText(String),
    /// Command the runtime to highlight the named on-screen component.
    Highlight(String),
    /// Command the runtime to remove any active highlight.
    ClearHighlight,
}

//! Prompt construction for generative providers.

use crate::classifier::IntentResult;

/// Context accumulated for a provider call.
///
/// Providers receive the user's text with any conversation history, the
/// detected intent and partial tool data prepended as labelled sections.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    conversation: Option<String>,
    intent: Option<IntentResult>,
    tool_notes: Vec<String>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach prior conversation text. Blank text is ignored.
    pub fn with_conversation(mut self, conversation: Option<&str>) -> Self {
        self.conversation = conversation
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        self
    }

    pub fn with_intent(mut self, intent: &IntentResult) -> Self {
        self.intent = Some(intent.clone());
        self
    }

    /// Add a line of tool output the provider may use.
    pub fn add_tool_note(&mut self, note: impl Into<String>) {
        self.tool_notes.push(note.into());
    }

    pub fn has_tool_notes(&self) -> bool {
        !self.tool_notes.is_empty()
    }

    /// Build the prompt for `user_text`.
    ///
    /// With nothing gathered the prompt is the user's text unchanged.
    pub fn build(&self, user_text: &str) -> String {
        let mut sections = Vec::new();

        if let Some(conversation) = &self.conversation {
            sections.push(format!("[CONVERSATION CONTEXT]\n{}", conversation));
        }

        if let Some(intent) = &self.intent {
            let mut line = format!("{} ({:.2})", intent.intent, intent.confidence);
            for (key, value) in &intent.entities {
                line.push_str(&format!(" {}={}", key, value));
            }
            sections.push(format!("[DETECTED INTENT]\n{}", line));
        }

        if !self.tool_notes.is_empty() {
            sections.push(format!("[TOOL DATA]\n{}", self.tool_notes.join("\n")));
        }

        if sections.is_empty() {
            return user_text.to_string();
        }

        sections.push(format!("[USER MESSAGE]\n{}", user_text));
        sections.join("\n\n")
    }
}

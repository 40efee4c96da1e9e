//! Scripted brain implementation - replays a queue of canned outcomes.

use std::collections::VecDeque;

use brain_core::{async_trait, Brain, BrainError, BrainParams};
use tokio::sync::Mutex;

/// A provider that answers from a script, then falls back to a default reply.
///
/// Every prompt it receives is recorded.
pub struct ScriptedBrain {
    name: String,
    script: Mutex<VecDeque<Result<String, BrainError>>>,
    default_reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBrain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            default_reply: "ok".to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply.
    pub fn then_reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    /// Queue a failure.
    pub fn then_fail(self, error: BrainError) -> Self {
        self.push(Err(error))
    }

    /// Reply used once the script is exhausted.
    pub fn with_default_reply(mut self, text: impl Into<String>) -> Self {
        self.default_reply = text.into();
        self
    }

    fn push(mut self, outcome: Result<String, BrainError>) -> Self {
        self.script.get_mut().push_back(outcome);
        self
    }

    /// Prompts received so far, oldest first.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl Brain for ScriptedBrain {
    async fn generate(&self, prompt: &str, _params: &BrainParams) -> Result<String, BrainError> {
        self.prompts.lock().await.push(prompt.to_string());
        match self.script.lock().await.pop_front() {
            Some(outcome) => outcome,
            None => Ok(self.default_reply.clone()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

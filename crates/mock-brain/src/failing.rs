//! Failing brain implementation - always returns the same error.

use std::sync::atomic::{AtomicUsize, Ordering};

use brain_core::{async_trait, Brain, BrainError, BrainParams};

/// A provider that fails every call with a fixed error.
///
/// Counts calls so tests can assert a broken provider stopped being called.
pub struct FailingBrain {
    name: String,
    error: BrainError,
    calls: AtomicUsize,
}

impl FailingBrain {
    pub fn new(name: impl Into<String>, error: BrainError) -> Self {
        Self {
            name: name.into(),
            error,
            calls: AtomicUsize::new(0),
        }
    }

    /// A provider that is down.
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self::new(name, BrainError::Unavailable("service down".to_string()))
    }

    /// A provider that returns garbage.
    pub fn malformed(name: impl Into<String>) -> Self {
        Self::new(name, BrainError::Malformed("unparseable completion".to_string()))
    }

    /// Number of calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Brain for FailingBrain {
    async fn generate(&self, _prompt: &str, _params: &BrainParams) -> Result<String, BrainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_fails() {
        let brain = FailingBrain::unavailable("down");
        for _ in 0..3 {
            let result = brain.generate("hi", &BrainParams::new()).await;
            assert!(matches!(result, Err(BrainError::Unavailable(_))));
        }
        assert_eq!(brain.calls(), 3);
        assert_eq!(brain.name(), "down");
    }
}

//! Per-user provider preferences.

use std::collections::HashMap;

use tokio::sync::RwLock;

/// A user's provider preference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UserPreference {
    /// Let the selector decide.
    #[default]
    Default,
    /// Favour the named provider when it is viable.
    Provider(String),
}

impl UserPreference {
    /// The preferred provider, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::Provider(name) => Some(name),
        }
    }
}

/// Thread-safe storage mapping sender IDs to their preference.
#[derive(Debug, Default)]
pub struct PreferenceStore {
    preferences: RwLock<HashMap<String, UserPreference>>,
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the preference for a sender, or default if not set.
    pub async fn get(&self, sender: &str) -> UserPreference {
        self.preferences
            .read()
            .await
            .get(sender)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn set(&self, sender: &str, preference: UserPreference) {
        self.preferences
            .write()
            .await
            .insert(sender.to_string(), preference);
    }

    /// Reset a sender to the default preference.
    pub async fn clear(&self, sender: &str) {
        self.preferences.write().await.remove(sender);
    }

    pub async fn clear_all(&self) {
        self.preferences.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.preferences.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_preference_store_default() {
        let store = PreferenceStore::new();
        assert_eq!(store.get("user1").await, UserPreference::Default);
        assert_eq!(store.get("user1").await.provider(), None);
    }

    #[tokio::test]
    async fn test_preference_store_set_and_clear() {
        let store = PreferenceStore::new();
        store
            .set("user1", UserPreference::Provider("grok".into()))
            .await;
        store
            .set("user2", UserPreference::Provider("local".into()))
            .await;

        assert_eq!(store.get("user1").await.provider(), Some("grok"));
        assert_eq!(store.len().await, 2);

        store.clear("user1").await;
        assert_eq!(store.get("user1").await, UserPreference::Default);

        store.clear_all().await;
        assert_eq!(store.len().await, 0);
    }
}

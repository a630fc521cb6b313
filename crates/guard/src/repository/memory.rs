//! `RwLock<HashMap<...>>`-backed implementations satisfying every
//! repository trait without an external store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::types::{Policy, SpendingLimit, User};

use super::{PolicyRepository, SettingsRepository, SpendingLimitRepository, UserRepository};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> User {
        self.users.write().await.insert(user.id.clone(), user.clone());
        user
    }

    async fn get(&self, id: &str) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }

    async fn list(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }

    async fn update(&self, user: User) -> Option<User> {
        let mut guard = self.users.write().await;
        if guard.contains_key(&user.id) {
            guard.insert(user.id.clone(), user.clone());
            Some(user)
        } else {
            None
        }
    }

    async fn delete(&self, id: &str) -> bool {
        self.users.write().await.remove(id).is_some()
    }
}

#[derive(Default)]
pub struct InMemoryPolicyRepository {
    policies: RwLock<HashMap<String, Policy>>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn create(&self, policy: Policy) -> Policy {
        self.policies.write().await.insert(policy.id.clone(), policy.clone());
        policy
    }

    async fn get(&self, id: &str) -> Option<Policy> {
        self.policies.read().await.get(id).cloned()
    }

    async fn list(&self) -> Vec<Policy> {
        self.policies.read().await.values().cloned().collect()
    }

    async fn update(&self, policy: Policy) -> Option<Policy> {
        let mut guard = self.policies.write().await;
        if guard.contains_key(&policy.id) {
            guard.insert(policy.id.clone(), policy.clone());
            Some(policy)
        } else {
            None
        }
    }

    async fn delete(&self, id: &str) -> bool {
        self.policies.write().await.remove(id).is_some()
    }
}

#[derive(Default)]
pub struct InMemorySpendingLimitRepository {
    limits: RwLock<HashMap<String, SpendingLimit>>,
}

impl InMemorySpendingLimitRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SpendingLimitRepository for InMemorySpendingLimitRepository {
    async fn create(&self, limit: SpendingLimit) -> SpendingLimit {
        self.limits.write().await.insert(limit.id.clone(), limit.clone());
        limit
    }

    async fn get(&self, id: &str) -> Option<SpendingLimit> {
        self.limits.read().await.get(id).cloned()
    }

    async fn list(&self) -> Vec<SpendingLimit> {
        self.limits.read().await.values().cloned().collect()
    }

    async fn update(&self, limit: SpendingLimit) -> Option<SpendingLimit> {
        let mut guard = self.limits.write().await;
        guard.insert(limit.id.clone(), limit.clone());
        Some(limit)
    }
}

#[derive(Default)]
pub struct InMemorySettingsRepository {
    settings: RwLock<HashMap<String, String>>,
}

impl InMemorySettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn get(&self, key: &str) -> Option<String> {
        self.settings.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) {
        self.settings.write().await.insert(key.to_string(), value);
    }

    async fn get_all(&self) -> HashMap<String, String> {
        self.settings.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PolicyAction, PolicyConfig, PolicyStatus, PolicyType, Targets};
    use chrono::Utc;

    fn sample_policy() -> Policy {
        Policy {
            id: "p1".to_string(),
            name: "test".to_string(),
            policy_type: PolicyType::Content,
            status: PolicyStatus::Active,
            priority: 1,
            config: PolicyConfig::default(),
            rules: vec![],
            targets: Targets::default(),
            actions: crate::types::Actions {
                action: PolicyAction::Allow,
                notify: vec![],
                webhook_url: None,
                log_level: None,
                message: None,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn update_on_missing_id_returns_none() {
        let repo = InMemoryPolicyRepository::new();
        assert!(repo.update(sample_policy()).await.is_none());
    }

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let repo = InMemoryPolicyRepository::new();
        repo.create(sample_policy()).await;
        assert!(repo.get("p1").await.is_some());
        assert_eq!(repo.list().await.len(), 1);
    }

    #[tokio::test]
    async fn settings_roundtrip() {
        let repo = InMemorySettingsRepository::new();
        assert!(repo.get("k").await.is_none());
        repo.set("k", "v".to_string()).await;
        assert_eq!(repo.get("k").await, Some("v".to_string()));
        assert_eq!(repo.get_all().await.len(), 1);
    }
}

//! Repository interfaces the pipeline and control plane consume from the
//! storage collaborator: one `async_trait` per collection, in-memory
//! implementations satisfy everything out of the box, an optional
//! Postgres-backed implementation covers `users`/`settings` only.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::types::{Policy, SpendingLimit, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> User;
    async fn get(&self, id: &str) -> Option<User>;
    async fn list(&self) -> Vec<User>;
    async fn update(&self, user: User) -> Option<User>;
    async fn delete(&self, id: &str) -> bool;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn create(&self, policy: Policy) -> Policy;
    async fn get(&self, id: &str) -> Option<Policy>;
    async fn list(&self) -> Vec<Policy>;
    async fn update(&self, policy: Policy) -> Option<Policy>;
    async fn delete(&self, id: &str) -> bool;
}

#[async_trait]
pub trait SpendingLimitRepository: Send + Sync {
    async fn create(&self, limit: SpendingLimit) -> SpendingLimit;
    async fn get(&self, id: &str) -> Option<SpendingLimit>;
    async fn list(&self) -> Vec<SpendingLimit>;
    async fn update(&self, limit: SpendingLimit) -> Option<SpendingLimit>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String);
    async fn get_all(&self) -> std::collections::HashMap<String, String>;
}

//! Postgres-backed `users`/`settings` repositories. Demonstrates that the
//! swap from the in-memory default happens purely at the trait-object
//! boundary; policies, spending limits, and audit/alerts stay in-memory
//! regardless.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;

use crate::types::User;

use super::{SettingsRepository, UserRepository};

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User) -> User {
        let _ = sqlx::query(
            "INSERT INTO guard_users (id, email, display_name, groups, roles, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.groups)
        .bind(&user.roles)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;
        user
    }

    async fn get(&self, id: &str) -> Option<User> {
        sqlx::query_as!(
            User,
            r#"SELECT id, email, display_name, groups, roles, is_active, created_at, updated_at
               FROM guard_users WHERE id = $1"#,
            id
        )
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten()
    }

    async fn list(&self) -> Vec<User> {
        sqlx::query_as!(
            User,
            r#"SELECT id, email, display_name, groups, roles, is_active, created_at, updated_at
               FROM guard_users ORDER BY created_at DESC"#
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_default()
    }

    async fn update(&self, user: User) -> Option<User> {
        let result = sqlx::query(
            "UPDATE guard_users SET email=$2, display_name=$3, groups=$4, roles=$5, is_active=$6, updated_at=$7
             WHERE id=$1",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.groups)
        .bind(&user.roles)
        .bind(user.is_active)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .ok()?;
        if result.rows_affected() == 0 {
            None
        } else {
            Some(user)
        }
    }

    async fn delete(&self, id: &str) -> bool {
        sqlx::query("DELETE FROM guard_users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected() > 0)
            .unwrap_or(false)
    }
}

pub struct PostgresSettingsRepository {
    pool: PgPool,
}

impl PostgresSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for PostgresSettingsRepository {
    async fn get(&self, key: &str) -> Option<String> {
        sqlx::query_scalar!("SELECT value FROM guard_settings WHERE key = $1", key)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
    }

    async fn set(&self, key: &str, value: String) {
        let _ = sqlx::query(
            "INSERT INTO guard_settings (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(&value)
        .execute(&self.pool)
        .await;
    }

    async fn get_all(&self) -> HashMap<String, String> {
        sqlx::query!("SELECT key, value FROM guard_settings")
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(|r| (r.key, r.value)).collect())
            .unwrap_or_default()
    }
}

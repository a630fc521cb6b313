//! C7: Settings Provider.
//!
//! Read-mostly cache in front of the settings key/value repository. Writes
//! invalidate by dropping the cached entry rather than updating it in place,
//! so the next read always goes back to the backing store.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::repository::SettingsRepository;

const KEY_LLM_PROVIDER: &str = "llm.provider";
const KEY_LLM_MODEL: &str = "llm.model";
const KEY_LLM_API_KEY: &str = "llm.api_key";
const KEY_LLM_BASE_URL: &str = "llm.base_url";

const KEY_SECURITY_BLOCK_THRESHOLD: &str = "security.block_threshold";
const KEY_SECURITY_PII_MASKING: &str = "security.pii_masking_enabled";

#[derive(Debug, Clone, Default)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SecuritySettings {
    pub block_threshold: Option<String>,
    pub pii_masking_enabled: Option<bool>,
}

pub struct SettingsProvider {
    repo: Arc<dyn SettingsRepository>,
    llm_cache: RwLock<Option<LlmSettings>>,
    security_cache: RwLock<Option<SecuritySettings>>,
}

impl SettingsProvider {
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self { repo, llm_cache: RwLock::new(None), security_cache: RwLock::new(None) }
    }

    /// `(provider, model, api_key, base_url)`, populated on first read.
    pub async fn get_llm_config(&self) -> (String, String, Option<String>, Option<String>) {
        if let Some(cached) = self.llm_cache.read().await.as_ref() {
            return (cached.provider.clone(), cached.model.clone(), cached.api_key.clone(), cached.base_url.clone());
        }

        let settings = LlmSettings {
            provider: self.repo.get(KEY_LLM_PROVIDER).await.unwrap_or_default(),
            model: self.repo.get(KEY_LLM_MODEL).await.unwrap_or_default(),
            api_key: self.repo.get(KEY_LLM_API_KEY).await,
            base_url: self.repo.get(KEY_LLM_BASE_URL).await,
        };
        let result = (settings.provider.clone(), settings.model.clone(), settings.api_key.clone(), settings.base_url.clone());
        *self.llm_cache.write().await = Some(settings);
        result
    }

    pub async fn update_llm_settings(&self, settings: LlmSettings) {
        self.repo.set(KEY_LLM_PROVIDER, settings.provider).await;
        self.repo.set(KEY_LLM_MODEL, settings.model).await;
        if let Some(key) = settings.api_key {
            self.repo.set(KEY_LLM_API_KEY, key).await;
        }
        if let Some(url) = settings.base_url {
            self.repo.set(KEY_LLM_BASE_URL, url).await;
        }
        *self.llm_cache.write().await = None;
    }

    pub async fn get_security_settings(&self) -> SecuritySettings {
        if let Some(cached) = self.security_cache.read().await.as_ref() {
            return cached.clone();
        }
        let settings = SecuritySettings {
            block_threshold: self.repo.get(KEY_SECURITY_BLOCK_THRESHOLD).await,
            pii_masking_enabled: self.repo.get(KEY_SECURITY_PII_MASKING).await.and_then(|v| v.parse().ok()),
        };
        *self.security_cache.write().await = Some(settings.clone());
        settings
    }

    pub async fn update_security_settings(&self, settings: SecuritySettings) {
        if let Some(threshold) = settings.block_threshold {
            self.repo.set(KEY_SECURITY_BLOCK_THRESHOLD, threshold).await;
        }
        if let Some(enabled) = settings.pii_masking_enabled {
            self.repo.set(KEY_SECURITY_PII_MASKING, enabled.to_string()).await;
        }
        *self.security_cache.write().await = None;
    }

    pub async fn get_all(&self) -> std::collections::HashMap<String, String> {
        self.repo.get_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemorySettingsRepository;

    #[tokio::test]
    async fn cache_populates_on_first_read() {
        let repo = Arc::new(InMemorySettingsRepository::new());
        repo.set(KEY_LLM_PROVIDER, "openai".to_string()).await;
        repo.set(KEY_LLM_MODEL, "gpt-4o-mini".to_string()).await;
        let provider = SettingsProvider::new(repo);
        let (p, m, _, _) = provider.get_llm_config().await;
        assert_eq!(p, "openai");
        assert_eq!(m, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn update_invalidates_cache() {
        let repo = Arc::new(InMemorySettingsRepository::new());
        let provider = SettingsProvider::new(repo);
        let _ = provider.get_llm_config().await;
        provider
            .update_llm_settings(LlmSettings {
                provider: "anthropic".to_string(),
                model: "claude-3-5-sonnet".to_string(),
                api_key: Some("sk-ant-test".to_string()),
                base_url: None,
            })
            .await;
        let (p, m, key, _) = provider.get_llm_config().await;
        assert_eq!(p, "anthropic");
        assert_eq!(m, "claude-3-5-sonnet");
        assert_eq!(key.as_deref(), Some("sk-ant-test"));
    }
}

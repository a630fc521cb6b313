//! C3: Provider Client & Factory.
//!
//! Uniform chat capability over third-party LLM providers. Each provider is
//! an `async_trait` implementation of [`ChatClient`]; the [`ProviderFactory`]
//! decides, per request, which client to use and whether the caller owns it.

mod anthropic;
mod openai_compat;

use async_trait::async_trait;
use std::sync::Arc;

use gateway_core::error::{Error, ErrorCode, Result};

use crate::settings::SettingsProvider;
use crate::types::{GuardRequest, Usage};

pub use anthropic::AnthropicClient;
pub use openai_compat::OpenAiCompatClient;

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub model: String,
    pub finish_reason: Option<String>,
    pub usage: Usage,
}

/// Per-call context threaded through to the transport layer (deadline,
/// identity triple already resolved by the factory).
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, ctx: &ChatContext, messages: &[crate::types::Message]) -> Result<ChatReply>;

    /// Accumulates streamed deltas, invoking `on_chunk` for each non-empty
    /// delta; returns the full content and last observed finish reason.
    async fn chat_stream(
        &self,
        ctx: &ChatContext,
        messages: &[crate::types::Message],
        on_chunk: &mut (dyn FnMut(&str) -> Result<()> + Send),
    ) -> Result<ChatReply> {
        // Default: non-streaming providers synthesize a single chunk.
        let reply = self.chat(ctx, messages).await?;
        if !reply.content.is_empty() {
            on_chunk(&reply.content)?;
        }
        Ok(reply)
    }

    /// Releases any per-request resources. No-op for stateless HTTP clients.
    async fn close(&self) {}
}

#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

pub struct ClientHandle {
    pub client: Arc<dyn ChatClient>,
    pub owned: bool,
}

/// Resolves which [`ChatClient`] to use for a given request, per the
/// selection order in §4.3: request override -> settings provider -> static
/// default -> error.
pub struct ProviderFactory {
    default_config: Option<ProviderConfig>,
    default_client: Option<Arc<dyn ChatClient>>,
    settings: Option<Arc<SettingsProvider>>,
}

impl ProviderFactory {
    pub fn new(default_config: Option<ProviderConfig>, settings: Option<Arc<SettingsProvider>>) -> Self {
        let default_client = default_config.as_ref().map(build_client);
        Self { default_config, default_client, settings }
    }

    pub async fn get_client(&self, request: &GuardRequest) -> Result<ClientHandle> {
        if request.provider.is_some() || request.api_key.is_some() || request.base_url.is_some() {
            let base = self.default_config.clone().unwrap_or_default();
            let merged = ProviderConfig {
                provider: request.provider.clone().unwrap_or(base.provider),
                model: request.model.clone().unwrap_or(base.model),
                api_key: request.api_key.clone().or(base.api_key),
                base_url: request.base_url.clone().or(base.base_url),
            };
            return Ok(ClientHandle { client: build_client(&merged), owned: true });
        }

        if let Some(settings) = &self.settings {
            let (provider, model, api_key, base_url) = settings.get_llm_config().await;
            if let Some(api_key) = api_key.filter(|k| !k.is_empty()) {
                let cfg = ProviderConfig { provider, model, api_key: Some(api_key), base_url };
                return Ok(ClientHandle { client: build_client(&cfg), owned: true });
            }
        }

        if let Some(client) = &self.default_client {
            return Ok(ClientHandle { client: Arc::clone(client), owned: false });
        }

        Err(Error::new(ErrorCode::LlmClientNotConfigured, "no LLM client configured"))
    }
}

fn build_client(config: &ProviderConfig) -> Arc<dyn ChatClient> {
    match config.provider.to_lowercase().as_str() {
        "anthropic" => Arc::new(AnthropicClient::new(
            config.base_url.clone().unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            config.api_key.clone(),
        )),
        // openai, ollama, xai/grok, bedrock-compat, google (compat path) all
        // speak the OpenAI-compatible `/v1/chat/completions` wire contract.
        _ => Arc::new(OpenAiCompatClient::new(
            config.base_url.clone().unwrap_or_else(|| "https://api.openai.com".to_string()),
            config.api_key.clone(),
        )),
    }
}

/// `system->system, user->user, assistant->assistant, else->user`.
pub fn map_role(role: &crate::types::Role) -> &'static str {
    match role {
        crate::types::Role::System => "system",
        crate::types::Role::User => "user",
        crate::types::Role::Assistant => "assistant",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_client_configured_is_an_error() {
        let factory = ProviderFactory::new(None, None);
        let request = GuardRequest {
            request_id: None,
            messages: vec![],
            provider: None,
            model: None,
            api_key: None,
            base_url: None,
            max_tokens: None,
            temperature: None,
            stream: None,
            user_id: None,
            metadata: Default::default(),
        };
        let result = factory.get_client(&request).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn per_request_override_yields_owned_client() {
        let factory = ProviderFactory::new(None, None);
        let request = GuardRequest {
            request_id: None,
            messages: vec![],
            provider: Some("ollama".to_string()),
            model: Some("llama3.3".to_string()),
            api_key: None,
            base_url: Some("http://host:11434".to_string()),
            max_tokens: None,
            temperature: None,
            stream: None,
            user_id: None,
            metadata: Default::default(),
        };
        let handle = factory.get_client(&request).await.unwrap();
        assert!(handle.owned);
    }

    #[tokio::test]
    async fn default_client_is_not_owned() {
        let config = ProviderConfig {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: Some("sk-test".to_string()),
            base_url: None,
        };
        let factory = ProviderFactory::new(Some(config), None);
        let request = GuardRequest {
            request_id: None,
            messages: vec![],
            provider: None,
            model: None,
            api_key: None,
            base_url: None,
            max_tokens: None,
            temperature: None,
            stream: None,
            user_id: None,
            metadata: Default::default(),
        };
        let handle = factory.get_client(&request).await.unwrap();
        assert!(!handle.owned);
    }
}

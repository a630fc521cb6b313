use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use gateway_core::error::{Error, ErrorCode, Result};

use crate::types::{Message, Usage};

use super::{map_role, ChatClient, ChatContext, ChatReply};

/// Speaks the OpenAI-compatible `/v1/chat/completions` wire contract, shared
/// by openai, ollama, xai/grok, and bedrock-compat endpoints.
pub struct OpenAiCompatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, base_url, api_key }
    }
}

#[derive(Serialize)]
struct CompatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct CompatRequest<'a> {
    model: &'a str,
    messages: Vec<CompatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[async_trait]
impl ChatClient for OpenAiCompatClient {
    async fn chat(&self, ctx: &ChatContext, messages: &[Message]) -> Result<ChatReply> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = CompatRequest {
            model: &ctx.model,
            messages: messages
                .iter()
                .map(|m| CompatMessage { role: map_role(&m.role), content: m.content.clone() })
                .collect(),
            max_tokens: ctx.max_tokens,
            temperature: ctx.temperature,
        };

        let mut req = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                req = req.bearer_auth(key);
            }
        }

        let resp = req.send().await.map_err(|e| {
            Error::new(ErrorCode::UpstreamProviderError, format!("openai-compat request failed: {e}"))
        })?;
        let raw: Value = resp.json().await.map_err(|e| {
            Error::new(ErrorCode::UpstreamProviderError, format!("openai-compat response was not JSON: {e}"))
        })?;

        let content = raw
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c0| c0.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::new(ErrorCode::UpstreamProviderError, "missing choices[0].message.content"))?
            .to_string();

        let finish_reason = raw
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c0| c0.get("finish_reason"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let prompt_tokens = raw.get("usage").and_then(|u| u.get("prompt_tokens")).and_then(|v| v.as_u64()).unwrap_or(0);
        let completion_tokens = raw.get("usage").and_then(|u| u.get("completion_tokens")).and_then(|v| v.as_u64()).unwrap_or(0);

        Ok(ChatReply {
            content,
            model: ctx.model.clone(),
            finish_reason,
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        })
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_builds_with_expected_base_url() {
        let client = OpenAiCompatClient::new("https://api.openai.com".to_string(), Some("sk-test".to_string()));
        assert_eq!(client.base_url, "https://api.openai.com");
    }
}

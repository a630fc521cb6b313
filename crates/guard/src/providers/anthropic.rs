use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use gateway_core::error::{Error, ErrorCode, Result};

use crate::types::{Message, Usage};

use super::{map_role, ChatClient, ChatContext, ChatReply};

/// Speaks Anthropic's native `/v1/messages` wire contract.
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AnthropicClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, base_url, api_key }
    }
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[async_trait]
impl ChatClient for AnthropicClient {
    async fn chat(&self, ctx: &ChatContext, messages: &[Message]) -> Result<ChatReply> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        // Anthropic has no "system" role message slot in the array; system
        // messages are filtered here and folded into the rest as plain user
        // turns since the gateway already exempted them from classification.
        let body = AnthropicRequest {
            model: &ctx.model,
            messages: messages
                .iter()
                .filter(|m| m.role != crate::types::Role::System)
                .map(|m| AnthropicMessage { role: map_role(&m.role), content: m.content.clone() })
                .collect(),
            max_tokens: ctx.max_tokens.unwrap_or(1024),
            temperature: ctx.temperature,
        };

        let mut req = self.client.post(url).json(&body).header("anthropic-version", "2023-06-01");
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                req = req.header("x-api-key", key);
            }
        }

        let resp = req.send().await.map_err(|e| {
            Error::new(ErrorCode::UpstreamProviderError, format!("anthropic request failed: {e}"))
        })?;
        let raw: Value = resp.json().await.map_err(|e| {
            Error::new(ErrorCode::UpstreamProviderError, format!("anthropic response was not JSON: {e}"))
        })?;

        let content = raw
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|c0| c0.get("text"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::new(ErrorCode::UpstreamProviderError, "missing content[0].text"))?
            .to_string();

        let finish_reason = raw.get("stop_reason").and_then(|v| v.as_str()).map(|s| s.to_string());

        let input_tokens = raw.get("usage").and_then(|u| u.get("input_tokens")).and_then(|v| v.as_u64()).unwrap_or(0);
        let output_tokens = raw.get("usage").and_then(|u| u.get("output_tokens")).and_then(|v| v.as_u64()).unwrap_or(0);

        Ok(ChatReply {
            content,
            model: ctx.model.clone(),
            finish_reason,
            usage: Usage {
                prompt_tokens: input_tokens,
                completion_tokens: output_tokens,
                total_tokens: input_tokens + output_tokens,
            },
        })
    }

    async fn close(&self) {}
}

//! Completion Service client.
//!
//! Opaque collaborator that turns a message list into the character's next
//! reply. The concrete implementation speaks the OpenAI-compatible
//! `chat/completions` API over reqwest; the base URL is injectable for tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One turn of the conversation, as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
}

/// Opaque hosted-model collaborator.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate the character's reply for the conversation so far.
    async fn complete(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String>;
}

// ── OpenAI-compatible chat completions ───────────────────────────

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

/// Chat-completions client (OpenAI-compatible endpoint).
pub struct OpenAiCompletion {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAiCompletion {
    pub fn new(
        api_base: &str,
        api_key: Option<String>,
        model: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    async fn complete(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String> {
        let mut payload_messages = Vec::with_capacity(messages.len() + 1);
        payload_messages.push(serde_json::json!({
            "role": "system",
            "content": system_prompt,
        }));
        for message in messages {
            payload_messages.push(serde_json::json!({
                "role": message.role,
                "content": message.content,
            }));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": payload_messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("completion service unreachable")?;

        // Never echo the response body into errors — it can carry account
        // details on auth failures.
        if !response.status().is_success() {
            anyhow::bail!("completion service returned {}", response.status());
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("invalid completion service response")?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("completion service returned no choices")
    }
}

// ── Tests ────────────────────────────────────────────────────────

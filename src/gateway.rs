//! Client for the hosted OpenAI-style chat completion gateway used by the proxies.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::context::ChatMessage;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("AI gateway API key is not configured")]
    MissingApiKey,
    #[error("Rate limited by the AI gateway")]
    RateLimited,
    #[error("AI gateway credits exhausted")]
    CreditsExhausted,
    #[error("AI gateway error ({status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("Failed to reach the AI gateway: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    // Kept as raw JSON so caller-supplied messages can be forwarded untouched.
    pub messages: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<serde_json::Value>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    pub fn from_chat(model: impl Into<String>, messages: &[ChatMessage]) -> Self {
        let messages = messages
            .iter()
            .map(|m| serde_json::json!({ "role": m.role, "content": m.content }))
            .collect();
        Self::new(model, messages)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
    pub usage: Option<serde_json::Value>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Choice {
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

impl ChatCompletion {
    /// `choices[0].message.content`, if the gateway sent one.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
    }
}

/// Pulls a readable message out of an upstream error body: `error.message`,
/// a string `error`, top-level `message`, or the raw text.
pub(crate) fn upstream_error_message(body: &str) -> String {
    let parsed = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(v) => v,
        Err(_) => return body.to_string(),
    };
    parsed["error"]["message"]
        .as_str()
        .or_else(|| parsed["error"].as_str())
        .or_else(|| parsed["message"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl GatewayClient {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    #[instrument(skip(self, request), fields(model = %request.model, messages = request.messages.len()))]
    pub async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or(GatewayError::MissingApiKey)?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                error!("AI gateway rate limit hit");
                Err(GatewayError::RateLimited)
            }
            StatusCode::PAYMENT_REQUIRED => {
                error!("AI gateway credits exhausted");
                Err(GatewayError::CreditsExhausted)
            }
            s if !s.is_success() => {
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(error = %e, "Could not read AI gateway error body");
                        String::new()
                    }
                };
                error!(%status, %body, "AI gateway request failed");
                Err(GatewayError::Upstream {
                    status: s.as_u16(),
                    message: upstream_error_message(&body),
                })
            }
            _ => {
                let completion = response.json::<ChatCompletion>().await?;
                debug!(has_content = completion.content().is_some(), "AI gateway replied");
                Ok(completion)
            }
        }
    }
}

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use crate::error::AssistantError;

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 2048,
        }
    }
}

// Structures matching the Gemini generateContent endpoint
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct ErrorBody {
    message: String,
    status: String,
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct ErrorDetail {
    reason: Option<String>,
}

const API_KEY_HEADER: &str = "x-goog-api-key";

/// reqwest errors print the request URL; drop it before the error leaves the client.
fn transport(e: reqwest::Error) -> AssistantError {
    AssistantError::Transport(e.without_url())
}

/// Maps a non-2xx generateContent reply onto an error kind.
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> AssistantError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let upstream_status = parsed.as_ref().map(|e| e.status.as_str()).unwrap_or("");
    let key_invalid = parsed
        .as_ref()
        .map(|e| {
            e.details
                .iter()
                .any(|d| d.reason.as_deref() == Some("API_KEY_INVALID"))
        })
        .unwrap_or(false);

    if status == StatusCode::TOO_MANY_REQUESTS || upstream_status == "RESOURCE_EXHAUSTED" {
        AssistantError::QuotaExceeded
    } else if status == StatusCode::UNAUTHORIZED || key_invalid {
        AssistantError::InvalidApiKey
    } else if status == StatusCode::FORBIDDEN || upstream_status == "PERMISSION_DENIED" {
        AssistantError::PermissionDenied
    } else {
        let message = match parsed {
            Some(e) if !e.message.is_empty() => e.message,
            _ => body.to_string(),
        };
        AssistantError::Upstream {
            status: status.as_u16(),
            message,
        }
    }
}

/// A generative model bound to one API key.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    config: GenerationConfig,
}

impl GeminiModel {
    pub fn new(api_key: String, base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            config: GenerationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Sends a single-turn prompt and returns the raw (untrimmed, possibly empty) text.
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    pub async fn generate_content(&self, prompt: &str) -> Result<String, AssistantError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: self.config,
        };

        // Header rather than `?key=` so the key never shows up in a request URL.
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e.without_url(), "Could not read Gemini error body");
                    String::new()
                }
            };
            error!(%status, "Gemini API request failed");
            return Err(classify_failure(status, &body));
        }

        let parsed = response.json::<GenerateResponse>().await.map_err(transport)?;
        let text = parsed.text();
        debug!(chars = text.len(), "Received Gemini response");
        Ok(text)
    }
}

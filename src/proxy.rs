//! HTTP proxies in front of the AI gateway.
//!
//! Three chat routes share one gateway client:
//!
//! * `POST /eliza-chat` builds Eliza's context-aware system prompt and forwards the
//!   last 10 messages.
//! * `POST /chat-lite` uses a one-line system prompt and forwards the last 3
//!   messages with their content coerced to strings.
//! * `POST /ai-chat` forwards caller-chosen model parameters unchanged.
//!
//! Every response is a JSON envelope carrying `success`; preflight `OPTIONS`
//! requests are answered by the CORS layer with an empty 200.

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::constants;
use crate::context::{last_n, ChatMessage, MiningStats, UserContext};
use crate::gateway::{ChatCompletionRequest, GatewayClient, GatewayError};
use crate::prompt;

/// Messages forwarded by `/eliza-chat`.
pub const ELIZA_CHAT_HISTORY: usize = 10;
/// Messages forwarded by `/chat-lite`.
pub const CHAT_LITE_HISTORY: usize = 3;

#[derive(Clone)]
pub struct ProxyState {
    gateway: Arc<GatewayClient>,
}

impl ProxyState {
    pub fn new(gateway: GatewayClient) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}

/// How a route reports failures that are not rate-limit or billing related.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorShape {
    /// `{"success": false, "error": {"message": ..., "type": "internal_error"}}`
    Nested,
    /// `{"success": false, "error": "..."}`
    Flat,
}

fn failure(status: StatusCode, message: &str, shape: ErrorShape) -> Response {
    let error = match shape {
        ErrorShape::Nested => json!({ "message": message, "type": "internal_error" }),
        ErrorShape::Flat => json!(message),
    };
    (status, Json(json!({ "success": false, "error": error }))).into_response()
}

fn gateway_failure(err: GatewayError, shape: ErrorShape) -> Response {
    match err {
        GatewayError::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "success": false, "error": constants::RATE_LIMIT_MESSAGE })),
        )
            .into_response(),
        GatewayError::CreditsExhausted => (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({ "success": false, "error": constants::CREDITS_EXHAUSTED_MESSAGE })),
        )
            .into_response(),
        GatewayError::Upstream { message, .. } => {
            failure(StatusCode::INTERNAL_SERVER_ERROR, &message, shape)
        }
        other => failure(StatusCode::INTERNAL_SERVER_ERROR, &other.to_string(), shape),
    }
}

fn success(reply: Option<&str>) -> Response {
    let reply = reply.unwrap_or(constants::FALLBACK_REPLY);
    (StatusCode::OK, Json(json!({ "success": true, "response": reply }))).into_response()
}

fn parse_body(body: &Bytes) -> Result<Value, String> {
    serde_json::from_slice(body).map_err(|e| format!("Invalid JSON body: {}", e))
}

fn messages_of(body: &Value) -> Option<&Vec<Value>> {
    body.get("messages").and_then(Value::as_array)
}

/// Latest entry of a conversation history, which may be a string, a list, or an
/// object carrying `summary` or `content`.
fn latest_summary(history: &Value) -> Option<&str> {
    match history {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.last().and_then(latest_summary),
        Value::Object(map) => map
            .get("summary")
            .or_else(|| map.get("content"))
            .and_then(Value::as_str),
        _ => None,
    }
}

/// Renders any JSON message content as text; strings pass through unchanged.
fn content_as_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lenient<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    value
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Full Eliza chat: context-aware system prompt plus the last 10 messages.
async fn eliza_chat(State(state): State<ProxyState>, body: Bytes) -> Response {
    const SHAPE: ErrorShape = ErrorShape::Nested;

    let body = match parse_body(&body) {
        Ok(v) => v,
        Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, &e, SHAPE),
    };
    let Some(messages) = messages_of(&body) else {
        return failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "messages must be an array",
            SHAPE,
        );
    };

    let user: Option<UserContext> = lenient(body.get("userContext"));
    let mining: Option<MiningStats> = lenient(body.get("miningStats"));
    let summary = body.get("conversationHistory").and_then(latest_summary);
    let is_founder = user.map(|u| u.is_founder).unwrap_or(false);

    let system_prompt = prompt::build_proxy_prompt(summary, mining.as_ref(), is_founder);
    let mut outgoing = vec![json!({ "role": "system", "content": system_prompt })];
    outgoing.extend(last_n(messages, ELIZA_CHAT_HISTORY).iter().cloned());

    info!(
        forwarded = outgoing.len() - 1,
        received = messages.len(),
        is_founder,
        "Forwarding Eliza chat to gateway"
    );
    let request = ChatCompletionRequest::new(constants::ELIZA_CHAT_MODEL, outgoing);
    match state.gateway.complete(&request).await {
        Ok(completion) => success(completion.content()),
        Err(e) => {
            error!(error = %e, "Eliza chat failed");
            gateway_failure(e, SHAPE)
        }
    }
}

/// Minimal chat: fixed system prompt, last 3 messages, string content only.
async fn chat_lite(State(state): State<ProxyState>, body: Bytes) -> Response {
    const SHAPE: ErrorShape = ErrorShape::Flat;

    let body = match parse_body(&body) {
        Ok(v) => v,
        Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, &e, SHAPE),
    };
    let Some(messages) = messages_of(&body) else {
        return failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "messages must be an array",
            SHAPE,
        );
    };

    let mut chat = vec![ChatMessage::system(prompt::LITE_SYSTEM_PROMPT)];
    chat.extend(last_n(messages, CHAT_LITE_HISTORY).iter().map(|m| {
        let role = m.get("role").and_then(Value::as_str).unwrap_or("user");
        let content = m.get("content").map(content_as_text).unwrap_or_default();
        ChatMessage::new(role, content)
    }));

    info!(forwarded = chat.len() - 1, "Forwarding lite chat to gateway");
    let request = ChatCompletionRequest::from_chat(constants::CHAT_LITE_MODEL, &chat);
    match state.gateway.complete(&request).await {
        Ok(completion) => success(completion.content()),
        Err(e) => {
            error!(error = %e, "Lite chat failed");
            gateway_failure(e, SHAPE)
        }
    }
}

/// Absent or `null` is `Ok(None)`; a value `parse` rejects is `Err(())`.
fn optional_param<T>(body: &Value, key: &str, parse: impl Fn(&Value) -> Option<T>) -> Result<Option<T>, ()> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse(v).map(Some).ok_or(()),
    }
}

/// Integers, including integral floats such as `256.0`, that fit a `u32`.
fn token_limit(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 {
        Some(f as u32)
    } else {
        None
    }
}

/// Pass-through chat with caller-chosen model, temperature and token limit.
async fn ai_chat(State(state): State<ProxyState>, body: Bytes) -> Response {
    const SHAPE: ErrorShape = ErrorShape::Flat;

    let body = match parse_body(&body) {
        Ok(v) => v,
        Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, &e, SHAPE),
    };
    let Some(messages) = messages_of(&body) else {
        warn!("Rejecting ai-chat request without a messages array");
        return failure(StatusCode::BAD_REQUEST, "messages array is required", SHAPE);
    };

    let model = body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(constants::AI_CHAT_DEFAULT_MODEL);
    let temperature = match optional_param(&body, "temperature", Value::as_f64) {
        Ok(t) => t.map(|t| t as f32).unwrap_or(constants::AI_CHAT_DEFAULT_TEMPERATURE),
        Err(()) => return failure(StatusCode::BAD_REQUEST, "temperature must be a number", SHAPE),
    };
    let max_tokens = match optional_param(&body, "max_tokens", token_limit) {
        Ok(t) => t.unwrap_or(constants::AI_CHAT_DEFAULT_MAX_TOKENS),
        Err(()) => {
            return failure(StatusCode::BAD_REQUEST, "max_tokens must be a non-negative integer", SHAPE)
        }
    };
    let mut request = ChatCompletionRequest::new(model, messages.clone());
    request.temperature = Some(temperature);
    request.max_tokens = Some(max_tokens);

    info!(%model, messages = messages.len(), "Forwarding ai-chat to gateway");
    match state.gateway.complete(&request).await {
        Ok(completion) => {
            let model = completion.model.clone().unwrap_or_else(|| request.model.clone());
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "response": completion.content(),
                    "usage": completion.usage,
                    "model": model,
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "ai-chat failed");
            gateway_failure(e, SHAPE)
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/eliza-chat", post(eliza_chat))
        .route("/chat-lite", post(chat_lite))
        .route("/ai-chat", post(ai_chat))
        .route("/health", get(health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer()),
        )
}

pub async fn start_proxy_server(port: u16, state: ProxyState) -> Result<()> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Proxy server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Proxy server failed")?;

    Ok(())
}

// Runtime defaults, overridable through the environment (or a .env file).

use std::env;

lazy_static::lazy_static! {
    pub static ref GATEWAY_URL: String = env::var("GATEWAY_URL")
        .unwrap_or_else(|_| "https://ai.gateway.lovable.dev/v1/chat/completions".to_string());
    pub static ref GEMINI_API_BASE: String = env::var("GEMINI_API_BASE")
        .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
    pub static ref ELIZA_GEMINI_MODEL: String = env::var("ELIZA_GEMINI_MODEL")
        .unwrap_or_else(|_| "gemini-2.0-flash".to_string());
    pub static ref ELIZA_SYSTEM_VERSION: Option<String> = env::var("ELIZA_SYSTEM_VERSION").ok();
}

// Gateway model identifiers per proxy route.
pub const ELIZA_CHAT_MODEL: &str = "google/gemini-2.5-flash";
pub const CHAT_LITE_MODEL: &str = "google/gemini-2.5-flash-lite";
pub const AI_CHAT_DEFAULT_MODEL: &str = "google/gemini-2.5-pro";

pub const AI_CHAT_DEFAULT_TEMPERATURE: f32 = 0.9;
pub const AI_CHAT_DEFAULT_MAX_TOKENS: u32 = 8000;

pub const FALLBACK_REPLY: &str =
    "I'm having trouble forming a response right now. Please try again in a moment.";
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please wait a moment and try again.";
pub const CREDITS_EXHAUSTED_MESSAGE: &str =
    "AI credits exhausted. Please add credits to your workspace to continue.";

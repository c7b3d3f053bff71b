//! Prompt assembly for the direct assistant and the gateway proxies.

use crate::context::{last_n, ChatMessage, ConversationContext, MiningStats, UserContext};
use crate::knowledge::KnowledgeEntry;

/// History turns rendered into the direct assistant prompt.
pub const DIRECT_HISTORY_LIMIT: usize = 5;
/// Hard cap on the full-chat proxy system prompt.
pub const PROXY_PROMPT_MAX_CHARS: usize = 1000;
/// Characters of the latest conversation summary kept in the proxy prompt.
pub const SUMMARY_MAX_CHARS: usize = 150;

pub const ELIZA_PERSONA: &str = "You are Eliza, the AI assistant of a community-owned crypto-mining DAO. \
You help members understand mining performance, rewards, wallets and DAO governance. \
Be warm, concise and accurate. If you are unsure about something, say so instead of guessing, \
and never ask for seed phrases or private keys.";

pub const LITE_SYSTEM_PROMPT: &str =
    "You are Eliza, a concise assistant for a crypto-mining DAO. Answer briefly and helpfully.";

/// Cuts `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn describe_user(user: &UserContext) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(name) = user.name.as_deref().filter(|n| !n.is_empty()) {
        parts.push(format!("name: {}", name));
    }
    if let Some(tier) = user.membership_tier.as_deref().filter(|t| !t.is_empty()) {
        parts.push(format!("membership: {}", tier));
    }
    if user.wallet_address.is_some() {
        parts.push("wallet connected".to_string());
    }
    if user.is_founder {
        parts.push("founding member".to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn render_history(history: &[ChatMessage]) -> String {
    last_n(history, DIRECT_HISTORY_LIMIT)
        .iter()
        .map(|msg| {
            let speaker = if msg.is_user() { "User" } else { "Eliza" };
            format!("{}: {}", speaker, msg.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the single prompt sent by the direct assistant.
pub fn build_direct_prompt(
    user_input: &str,
    context: &ConversationContext,
    knowledge: &[&KnowledgeEntry],
) -> String {
    let mut prompt = String::from(ELIZA_PERSONA);
    prompt.push_str("\n\n");

    if let Some(user) = context.user_context.as_ref().and_then(describe_user) {
        prompt.push_str(&format!("User profile: {}\n", user));
    }
    if let Some(stats) = &context.mining_stats {
        prompt.push_str(&format!("Mining status: {}\n", stats.summary()));
    }
    if let Some(version) = context.system_version.as_deref().filter(|v| !v.is_empty()) {
        prompt.push_str(&format!("System version: {}\n", version));
    }

    if !knowledge.is_empty() {
        prompt.push_str("\nRelevant knowledge:\n");
        for entry in knowledge {
            prompt.push_str(&format!(
                "- [{} / {}] {}\n",
                entry.category, entry.topic, entry.content
            ));
        }
    }

    if !context.conversation_history.is_empty() {
        prompt.push_str("\nRecent conversation:\n");
        prompt.push_str(&render_history(&context.conversation_history));
        prompt.push('\n');
    }

    prompt.push_str(&format!("\nUser: {}\nEliza:", user_input));
    prompt
}

/// System prompt for the full chat proxy, capped at `PROXY_PROMPT_MAX_CHARS`.
pub fn build_proxy_prompt(
    latest_summary: Option<&str>,
    mining: Option<&MiningStats>,
    is_founder: bool,
) -> String {
    let mut prompt = String::from(ELIZA_PERSONA);

    if let Some(summary) = latest_summary.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\nPrevious context: ");
        prompt.push_str(truncate_chars(summary, SUMMARY_MAX_CHARS));
    }
    if let Some(stats) = mining.filter(|s| s.is_online) {
        prompt.push_str("\nMining: ");
        prompt.push_str(&stats.summary());
    }
    if is_founder {
        prompt.push_str("\nThe user is a DAO founder; you may discuss roadmap and treasury details openly.");
    }

    truncate_chars(&prompt, PROXY_PROMPT_MAX_CHARS).to_string()
}

use serde::{Deserialize, Serialize};

/// One turn of a conversation. Vectors of these are kept in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn is_user(&self) -> bool {
        self.role.eq_ignore_ascii_case("user")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserContext {
    pub name: Option<String>,
    pub wallet_address: Option<String>,
    pub is_founder: bool,
    pub membership_tier: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MiningStats {
    pub is_online: bool,
    pub hashrate: Option<f64>,
    pub active_miners: Option<u32>,
    pub total_earnings: Option<f64>,
    pub currency: Option<String>,
}

impl MiningStats {
    /// Short human-readable summary, e.g. `online, 12.5 MH/s, 3 active miners`.
    pub fn summary(&self) -> String {
        let mut parts = vec![if self.is_online { "online" } else { "offline" }.to_string()];
        if let Some(rate) = self.hashrate {
            parts.push(format!("{} MH/s", rate));
        }
        if let Some(miners) = self.active_miners {
            parts.push(format!("{} active miners", miners));
        }
        if let Some(earned) = self.total_earnings {
            let currency = self.currency.as_deref().unwrap_or("tokens");
            parts.push(format!("{} {} earned", earned, currency));
        }
        parts.join(", ")
    }
}

/// Per-call input bag for the direct assistant. Nothing here is persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationContext {
    pub user_context: Option<UserContext>,
    pub mining_stats: Option<MiningStats>,
    pub conversation_history: Vec<ChatMessage>,
    pub system_version: Option<String>,
}

/// Returns the trailing `n` items of `items`, preserving order.
pub fn last_n<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_n_keeps_suffix_in_order() {
        let items = [1, 2, 3, 4, 5, 6, 7];
        assert_eq!(last_n(&items, 3), &[5, 6, 7]);
        assert_eq!(last_n(&items, 10), &items[..]);
        assert!(last_n(&items, 0).is_empty());
        assert!(last_n::<u8>(&[], 5).is_empty());
    }

    #[test]
    fn test_context_deserializes_camel_case() {
        let ctx: ConversationContext = serde_json::from_value(serde_json::json!({
            "userContext": { "name": "Ada", "isFounder": true },
            "miningStats": { "isOnline": true, "hashrate": 42.0 },
            "conversationHistory": [{ "role": "user", "content": "hi" }],
            "systemVersion": "2.1.0"
        }))
        .unwrap();

        let user = ctx.user_context.unwrap();
        assert_eq!(user.name.as_deref(), Some("Ada"));
        assert!(user.is_founder);
        assert!(ctx.mining_stats.unwrap().is_online);
        assert_eq!(ctx.conversation_history.len(), 1);
        assert_eq!(ctx.system_version.as_deref(), Some("2.1.0"));
    }

    #[test]
    fn test_empty_object_is_default_context() {
        let ctx: ConversationContext = serde_json::from_str("{}").unwrap();
        assert_eq!(ctx, ConversationContext::default());
    }

    #[test]
    fn test_mining_summary() {
        let stats = MiningStats {
            is_online: true,
            hashrate: Some(12.5),
            active_miners: Some(3),
            total_earnings: None,
            currency: None,
        };
        assert_eq!(stats.summary(), "online, 12.5 MH/s, 3 active miners");
        assert_eq!(MiningStats::default().summary(), "offline");
    }
}

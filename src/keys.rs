//! API key supply for the direct assistant.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Primary,
    /// For providers that fall back to a secondary key.
    Backup,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    pub is_valid: bool,
    pub key_type: KeyType,
}

/// Supplies the current API key and receives health signals from callers.
pub trait ApiKeyProvider: Send + Sync {
    fn current_api_key(&self) -> Option<String>;
    fn mark_key_as_working(&self);
    fn mark_key_as_failed(&self);
    fn key_status(&self) -> KeyStatus;
}

/// The key configured for this process, plus its last known health.
#[derive(Debug)]
pub struct KeyManager {
    key: Option<String>,
    working: AtomicBool,
}

impl KeyManager {
    pub fn new(key: Option<String>) -> Self {
        let key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        // Unknown until the first call succeeds or fails; assume usable if present.
        let working = key.is_some();
        Self {
            key,
            working: AtomicBool::new(working),
        }
    }

    /// Reads `GEMINI_API_KEY`.
    pub fn from_env() -> Self {
        Self::new(std::env::var("GEMINI_API_KEY").ok())
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_none()
    }
}

impl ApiKeyProvider for KeyManager {
    fn current_api_key(&self) -> Option<String> {
        self.key.clone()
    }

    fn mark_key_as_working(&self) {
        self.working.store(true, Ordering::SeqCst);
    }

    fn mark_key_as_failed(&self) {
        if self.working.swap(false, Ordering::SeqCst) {
            warn!("API key marked as failing");
        }
    }

    fn key_status(&self) -> KeyStatus {
        let key_type = if self.key.is_some() {
            KeyType::Primary
        } else {
            KeyType::None
        };
        KeyStatus {
            is_valid: key_type != KeyType::None && self.working.load(Ordering::SeqCst),
            key_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key() {
        let keys = KeyManager::new(None);
        assert!(keys.current_api_key().is_none());
        assert_eq!(
            keys.key_status(),
            KeyStatus {
                is_valid: false,
                key_type: KeyType::None
            }
        );
        // Health signals cannot make a missing key valid.
        keys.mark_key_as_working();
        assert!(!keys.key_status().is_valid);
    }

    #[test]
    fn test_blank_key_is_ignored() {
        assert!(KeyManager::new(Some("   ".to_string())).is_empty());
        let keys = KeyManager::new(Some(" abc \n".to_string()));
        assert_eq!(keys.current_api_key().as_deref(), Some("abc"));
    }

    #[test]
    fn test_health_flag_follows_signals() {
        let keys = KeyManager::new(Some("primary".to_string()));
        assert_eq!(keys.key_status().key_type, KeyType::Primary);
        assert!(keys.key_status().is_valid);
        keys.mark_key_as_failed();
        assert!(!keys.key_status().is_valid);
        keys.mark_key_as_working();
        assert!(keys.key_status().is_valid);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let value = serde_json::to_value(KeyManager::new(Some("k".to_string())).key_status()).unwrap();
        assert_eq!(value, serde_json::json!({ "isValid": true, "keyType": "primary" }));
    }
}

//! Curated DAO/mining reference snippets injected into prompts when the user's
//! message touches on their category or topic.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Upper bound on entries attached to a single prompt.
pub const MAX_RELEVANT_ENTRIES: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub category: String,
    pub topic: String,
    pub content: String,
}

impl KnowledgeEntry {
    pub fn new(category: &str, topic: &str, content: &str) -> Self {
        Self {
            category: category.to_string(),
            topic: topic.to_string(),
            content: content.to_string(),
        }
    }

    /// `lowered_input` must already be lower-cased.
    fn matches(&self, lowered_input: &str) -> bool {
        let category = self.category.to_lowercase();
        let topic = self.topic.to_lowercase();
        (!category.is_empty() && lowered_input.contains(&category))
            || (!topic.is_empty() && lowered_input.contains(&topic))
    }
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse knowledge file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }

    /// Loads a JSON array of `{category, topic, content}` records.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
            path: display.clone(),
            source,
        })?;
        let entries = serde_json::from_str(&raw).map_err(|source| KnowledgeError::Parse {
            path: display,
            source,
        })?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First `MAX_RELEVANT_ENTRIES` entries whose category or topic occurs in `input`,
    /// ignoring case. Entries keep their knowledge-base order.
    pub fn relevant(&self, input: &str) -> Vec<&KnowledgeEntry> {
        let lowered = input.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| entry.matches(&lowered))
            .take(MAX_RELEVANT_ENTRIES)
            .collect()
    }
}

/// The built-in knowledge shipped with Eliza.
pub fn default_knowledge() -> KnowledgeBase {
    KnowledgeBase::new(vec![
        KnowledgeEntry::new(
            "mining",
            "hashrate",
            "Hashrate measures how many hashes per second a rig computes. The dashboard reports it in MH/s; \
             a sudden drop usually means a miner went offline or is overheating.",
        ),
        KnowledgeEntry::new(
            "mining",
            "pool",
            "All DAO rigs mine into the shared pool. Rewards are split pro rata by submitted shares \
             and settled to member wallets once the payout threshold is reached.",
        ),
        KnowledgeEntry::new(
            "dao",
            "governance",
            "Members vote on proposals with their governance tokens. A proposal passes with a simple \
             majority once quorum (10% of circulating tokens) is reached within the 7-day voting window.",
        ),
        KnowledgeEntry::new(
            "dao",
            "proposal",
            "Any member holding at least 100 governance tokens can open a proposal from the DAO tab. \
             Proposals need a title, a description and an execution plan.",
        ),
        KnowledgeEntry::new(
            "wallet",
            "payout",
            "Payouts are sent to the wallet address linked in your profile. Double-check the address: \
             on-chain transfers cannot be reversed.",
        ),
        KnowledgeEntry::new(
            "security",
            "seed phrase",
            "Never share your seed phrase or private key. DAO staff and Eliza will never ask for it.",
        ),
        KnowledgeEntry::new(
            "founder",
            "founder benefits",
            "Founding members receive a boosted reward multiplier and early access to new mining regions.",
        ),
        KnowledgeEntry::new(
            "energy",
            "electricity",
            "Mining profitability depends heavily on electricity cost. The calculator on the dashboard \
             uses your configured price per kWh to estimate net earnings.",
        ),
    ])
}

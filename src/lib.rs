pub mod assistant;
pub mod chat;
pub mod constants;
pub mod context;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod keys;
pub mod knowledge;
pub mod prompt;
pub mod proxy;
pub mod speech;

pub use assistant::{AssistantConfig, ElizaAssistant};
pub use context::{ChatMessage, ConversationContext, MiningStats, UserContext};
pub use error::AssistantError;
pub use gateway::{GatewayClient, GatewayError};
pub use keys::{ApiKeyProvider, KeyManager, KeyStatus, KeyType};
pub use knowledge::{default_knowledge, KnowledgeBase, KnowledgeEntry};
pub use speech::{SpeakOptions, SpeechPlatform, SpeechSynthesizer};

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;

pub use config::FinsightConfig;
pub use error::FinsightError;
pub use llm::{
    create_failover_client, ChatBackend, ChatClientConfig, LlmError, OpenAiChatClient,
    ProviderFailoverClient, MIN_API_KEY_LEN,
};
pub use models::{AgentResult, AgentStatus, ConversationTurn, Role, TransactionRecord};

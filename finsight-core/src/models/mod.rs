pub mod agent_result;
pub mod conversation;
pub mod transaction;

pub use agent_result::{AgentResult, AgentStatus};
pub use conversation::{ConversationTurn, Role};
pub use transaction::TransactionRecord;

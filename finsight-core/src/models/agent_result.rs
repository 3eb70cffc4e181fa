use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a question was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Answered,
    NoData,
    SecurityViolation,
    ExecutionFailed,
    Degraded,
}

/// Response contract of the query agent.
///
/// `generated_sql` is always the text that was run, or the text that was
/// rejected / attempted when the request did not succeed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub answer: String,
    pub data_points: Vec<Map<String, Value>>,
    pub generated_sql: String,
    pub status: AgentStatus,
}

impl AgentResult {
    pub fn answered(answer: String, data_points: Vec<Map<String, Value>>, sql: String) -> Self {
        Self {
            answer,
            data_points,
            generated_sql: sql,
            status: AgentStatus::Answered,
        }
    }

    pub fn no_data(sql: String) -> Self {
        Self {
            answer: "No data found.".to_string(),
            data_points: Vec::new(),
            generated_sql: sql,
            status: AgentStatus::NoData,
        }
    }

    pub fn security_violation(sql: String) -> Self {
        Self {
            answer: "Security violation: the generated query contains a forbidden statement and was not executed.".to_string(),
            data_points: Vec::new(),
            generated_sql: sql,
            status: AgentStatus::SecurityViolation,
        }
    }

    pub fn execution_failed(sql: String, reason: impl std::fmt::Display) -> Self {
        Self {
            answer: format!("The generated query could not be executed: {}", reason),
            data_points: Vec::new(),
            generated_sql: sql,
            status: AgentStatus::ExecutionFailed,
        }
    }

    /// Synthetic, clearly labeled payload returned when every provider is down.
    pub fn degraded(question: &str) -> Self {
        let mut point = Map::new();
        point.insert("mock_revenue".to_string(), Value::from(50000));
        point.insert("mock_expense".to_string(), Value::from(12000));

        Self {
            answer: format!(
                "[DEGRADED MODE] Language model providers are unavailable. Displaying placeholder analysis for: '{}'.",
                question
            ),
            data_points: vec![point],
            generated_sql: "SELECT SUM(amount) FROM financial_records -- (Mock)".to_string(),
            status: AgentStatus::Degraded,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.status == AgentStatus::Degraded
    }
}

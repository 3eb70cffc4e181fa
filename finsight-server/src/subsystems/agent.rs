//! Query agent - answers financial questions over `financial_records`
//!
//! Each request runs generate SQL → safety gate → execute → narrate and stops
//! at the first step that produces a terminal result. Provider exhaustion
//! never reaches the caller: the agent answers with a labeled degraded payload.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use finsight_core::config::AgentConfig;
use finsight_core::{AgentResult, ChatBackend, ConversationTurn, LlmError, ProviderFailoverClient};
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::subsystems::executor::{ExecutorError, QueryExecutor};

pub const SQL_SYSTEM_PROMPT: &str = "\
You are a data analyst. Convert the user's question into one PostgreSQL SELECT statement.
Table: financial_records
Columns: transaction_date (DATE), description (TEXT), category (TEXT), amount (DOUBLE PRECISION, signed), record_type (TEXT), source (TEXT).

RULES:
1. Output ONLY raw SQL. No markdown, no explanation.
2. Revenue = SUM(amount) WHERE amount > 0
3. Expense = SUM(amount) WHERE amount < 0
4. Profit = SUM(amount)
5. Margin = Profit / Revenue
6. Use to_char(transaction_date, 'YYYY-MM') for monthly grouping.
7. Never modify data or schema.";

pub const NARRATIVE_SYSTEM_PROMPT: &str = "\
You are a CFO. Analyze the provided data and answer the user's question.
1. Be concise.
2. Highlight trends (e.g., \"up 20%\").
3. Use a professional tone.";

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Request cancelled")]
    Cancelled,
}

fn forbidden_keyword_re() -> &'static Regex {
    static FORBIDDEN_RE: OnceLock<Regex> = OnceLock::new();
    FORBIDDEN_RE.get_or_init(|| {
        Regex::new(r"(?i)\b(create|alter|drop|delete|update|insert|truncate|grant|revoke)\b")
            .expect("valid forbidden keyword regex")
    })
}

/// First mutating keyword in `sql`, uppercased.
pub fn find_forbidden_keyword(sql: &str) -> Option<String> {
    forbidden_keyword_re()
        .find(sql)
        .map(|m| m.as_str().to_uppercase())
}

/// Remove markdown code fences around model output.
pub fn strip_code_fences(text: &str) -> String {
    text.trim()
        .replace("```sql", "")
        .replace("```SQL", "")
        .replace("```", "")
        .trim()
        .to_string()
}

pub struct QueryAgent {
    llm: Arc<ProviderFailoverClient>,
    executor: Arc<dyn QueryExecutor>,
    config: AgentConfig,
}

impl QueryAgent {
    pub fn new(
        llm: Arc<ProviderFailoverClient>,
        executor: Arc<dyn QueryExecutor>,
        config: AgentConfig,
    ) -> Self {
        Self {
            llm,
            executor,
            config,
        }
    }

    /// Answer `question`. Never fails: provider outages yield a degraded result.
    pub async fn run(&self, question: &str, history: &[ConversationTurn]) -> AgentResult {
        self.answer(question, history).await
    }

    /// Like `run`, but aborts the in-flight step when `cancel` fires.
    pub async fn run_cancellable(
        &self,
        question: &str,
        history: &[ConversationTurn],
        cancel: &CancellationToken,
    ) -> Result<AgentResult, AgentError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Agent request cancelled by caller");
                Err(AgentError::Cancelled)
            }
            result = self.answer(question, history) => Ok(result),
        }
    }

    async fn answer(&self, question: &str, history: &[ConversationTurn]) -> AgentResult {
        let sql = match self.generate_sql(question, history).await {
            Ok(sql) => sql,
            Err(e) => {
                tracing::error!(error = %e, "SQL generation failed on every provider, returning degraded result");
                return AgentResult::degraded(question);
            }
        };

        if let Some(keyword) = find_forbidden_keyword(&sql) {
            tracing::warn!(keyword = %keyword, sql = %sql, "Rejected generated SQL");
            return AgentResult::security_violation(sql);
        }

        let rows = match self.execute(&sql).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, sql = %sql, "Generated SQL failed to execute");
                return AgentResult::execution_failed(sql, e);
            }
        };

        if rows.is_empty() {
            return AgentResult::no_data(sql);
        }

        match self.narrate(question, &rows).await {
            Ok(answer) => AgentResult::answered(answer, rows, sql),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    sql = %sql,
                    rows = rows.len(),
                    "Narration failed on every provider, returning degraded result"
                );
                AgentResult::degraded(question)
            }
        }
    }

    async fn generate_sql(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<String, LlmError> {
        let recent = &history[history.len().saturating_sub(self.config.history_turns)..];

        let mut messages = Vec::with_capacity(recent.len() + 2);
        messages.push(ConversationTurn::system(SQL_SYSTEM_PROMPT));
        messages.extend(recent.iter().cloned());
        messages.push(ConversationTurn::user(question));

        let raw = self
            .llm
            .complete(&messages, self.config.sql_temperature)
            .await?;
        Ok(strip_code_fences(&raw))
    }

    async fn execute(&self, sql: &str) -> Result<Vec<Map<String, Value>>, ExecutorError> {
        let limit = Duration::from_secs(self.config.query_timeout_secs);
        match tokio::time::timeout(limit, self.executor.fetch_rows(sql)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutorError::Timeout(limit)),
        }
    }

    async fn narrate(&self, question: &str, rows: &[Map<String, Value>]) -> Result<String, LlmError> {
        let data = Value::Array(rows.iter().cloned().map(Value::Object).collect());
        let messages = [
            ConversationTurn::system(NARRATIVE_SYSTEM_PROMPT),
            ConversationTurn::user(format!("Q: {}\nData: {}", question, data)),
        ];

        self.llm
            .complete(&messages, self.config.narrative_temperature)
            .await
    }
}

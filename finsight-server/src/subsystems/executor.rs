//! Read-only execution of generated SQL against `financial_records`
//!
//! The statement is wrapped in `json_agg` so arbitrary column sets come back as
//! one JSON array of row objects, and runs inside a `READ ONLY` transaction
//! with a `statement_timeout`. The transaction is always rolled back.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected result shape: {0}")]
    Shape(String),
}

/// Runs one read-only statement and returns its rows as JSON objects.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Map<String, Value>>, ExecutorError>;
}

pub struct PgQueryExecutor {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }
}

/// Drop `--` line comments, leaving `--` inside quoted literals alone.
fn strip_line_comments(sql: &str) -> String {
    sql.lines()
        .map(|line| {
            let mut quote: Option<char> = None;
            let mut prev = '\0';
            for (i, c) in line.char_indices() {
                match quote {
                    Some(q) if c == q => quote = None,
                    Some(_) => {}
                    None if c == '\'' || c == '"' => quote = Some(c),
                    None if c == '-' && prev == '-' => return &line[..i - 1],
                    None => {}
                }
                prev = c;
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap a single statement so its rows are aggregated into a JSON array.
///
/// The statement sits on its own lines so nothing it ends with can reach the
/// closing parenthesis.
pub fn wrap_as_json_rows(sql: &str) -> String {
    let cleaned = strip_line_comments(sql);
    let statement = cleaned.trim().trim_end_matches(';').trim_end();
    format!(
        "SELECT COALESCE(json_agg(q), '[]'::json) FROM (\n{}\n) AS q",
        statement
    )
}

pub fn rows_from_json(value: Value) -> Result<Vec<Map<String, Value>>, ExecutorError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(ExecutorError::Shape(format!("row is not an object: {}", other))),
            })
            .collect(),
        other => Err(ExecutorError::Shape(format!("expected an array, got {}", other))),
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Map<String, Value>>, ExecutorError> {
        let wrapped = wrap_as_json_rows(sql);
        let set_timeout = format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout.as_millis()
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;
        sqlx::query(&set_timeout).execute(&mut *tx).await?;

        let (rows,): (Value,) = sqlx::query_as(&wrapped).fetch_one(&mut *tx).await?;
        tx.rollback().await?;

        let rows = rows_from_json(rows)?;
        tracing::debug!(rows = rows.len(), "Executed generated query");
        Ok(rows)
    }
}

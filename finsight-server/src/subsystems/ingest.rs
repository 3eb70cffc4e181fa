use finsight_core::TransactionRecord;
use finsight_ingest::{parser_for, IngestError, SourceKind};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum IngestFailure {
    #[error(transparent)]
    Document(#[from] IngestError),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Outcome of one uploaded document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub parsed: usize,
    pub inserted: usize,
    pub ids: Vec<Uuid>,
}

/// Parse `content` with the parser for `source` and store every record.
///
/// The document is fully parsed before anything is written, so a rejected
/// upload leaves the table untouched.
pub async fn ingest_document(
    pool: &PgPool,
    source: SourceKind,
    content: &[u8],
) -> Result<IngestReport, IngestFailure> {
    let records = parser_for(source).parse(content)?;
    let ids = store_records(pool, source.as_str(), &records).await?;

    tracing::info!(
        source = %source,
        parsed = records.len(),
        inserted = ids.len(),
        "Ingested export document"
    );

    Ok(IngestReport {
        source: source.to_string(),
        parsed: records.len(),
        inserted: ids.len(),
        ids,
    })
}

/// Insert `records` in one transaction, returning the new row ids in order.
pub async fn store_records(
    pool: &PgPool,
    source: &str,
    records: &[TransactionRecord],
) -> Result<Vec<Uuid>, sqlx::Error> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(records.len());

    for record in records {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO financial_records
                (transaction_date, description, category, amount, record_type, source, raw_source)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(record.date)
        .bind(&record.description)
        .bind(&record.category)
        .bind(record.amount)
        .bind(&record.record_type)
        .bind(source)
        .bind(&record.raw_source)
        .fetch_one(&mut *tx)
        .await?;
        ids.push(id);
    }

    tx.commit().await?;
    Ok(ids)
}

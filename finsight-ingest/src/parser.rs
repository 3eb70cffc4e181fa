use finsight_core::TransactionRecord;
use serde_json::Value;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::error::IngestError;
use crate::normalizer::normalize_record;
use crate::scanner::{check_raw_nesting, collect_candidates};

/// Accounting platform an upload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    QuickBooks,
    Rootfi,
    Generic,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::QuickBooks => "quickbooks",
            SourceKind::Rootfi => "rootfi",
            SourceKind::Generic => "generic",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown source names fall back to `Generic`.
impl FromStr for SourceKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "quickbooks" | "qbo" => SourceKind::QuickBooks,
            "rootfi" => SourceKind::Rootfi,
            _ => SourceKind::Generic,
        })
    }
}

/// Turns one uploaded document into transaction records.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, content: &[u8]) -> Result<Vec<TransactionRecord>, IngestError>;
}

/// Structure-agnostic parser for JSON exports.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExportParser;

impl DocumentParser for JsonExportParser {
    fn parse(&self, content: &[u8]) -> Result<Vec<TransactionRecord>, IngestError> {
        parse_document(content)
    }
}

/// Every supported source currently shares the structure-agnostic parser.
pub fn parser_for(source: SourceKind) -> Box<dyn DocumentParser> {
    match source {
        SourceKind::QuickBooks | SourceKind::Rootfi | SourceKind::Generic => {
            Box::new(JsonExportParser)
        }
    }
}

/// Scan `content` for candidate records and normalize each one.
///
/// Malformed JSON fails the whole document; individual candidates that are
/// not transactions are skipped.
pub fn parse_document(content: &[u8]) -> Result<Vec<TransactionRecord>, IngestError> {
    check_raw_nesting(content)?;
    let root: Value = serde_json::from_slice(content)?;
    let candidates = collect_candidates(&root)?;

    let mut records = Vec::with_capacity(candidates.len());
    let mut skipped = 0usize;

    for candidate in &candidates {
        match normalize_record(candidate) {
            Ok(record) => records.push(record),
            Err(reason) => {
                skipped += 1;
                tracing::debug!(reason = %reason, "Skipping candidate record");
            }
        }
    }

    tracing::info!(
        candidates = candidates.len(),
        records = records.len(),
        skipped,
        "Parsed export document"
    );

    Ok(records)
}

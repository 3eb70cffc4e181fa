//! Ingestion of accounting-platform JSON exports into `TransactionRecord`s.
//!
//! Raw bytes flow through three pure steps:
//! - `scanner` finds every array of keyed records anywhere in the document
//! - `normalizer` maps each candidate record onto the canonical shape or skips it
//! - `parser` ties both together per upload source

pub mod error;
pub mod normalizer;
pub mod parser;
pub mod scanner;

pub use error::IngestError;
pub use normalizer::{normalize_record, SkipReason};
pub use parser::{parse_document, parser_for, DocumentParser, JsonExportParser, SourceKind};
pub use scanner::{check_raw_nesting, collect_candidates, find_candidate_arrays, MAX_SCAN_DEPTH};

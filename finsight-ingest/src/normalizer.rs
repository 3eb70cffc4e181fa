//! Record normalizer - maps one candidate record onto `TransactionRecord`
//!
//! Source exports disagree on key casing, field names and sign conventions.
//! Each logical attribute is resolved through a fallback chain of aliases;
//! records that cannot be read as a transaction are skipped, never failed.

use chrono::NaiveDate;
use finsight_core::TransactionRecord;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Amounts closer to zero than this are blank or placeholder cells.
pub const NOISE_THRESHOLD: f64 = 0.01;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_DATE: &str = "2024-01-01";
pub const DEFAULT_TYPE: &str = "Unknown";
pub const DEFAULT_DESCRIPTION: &str = "Unknown";
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

const AMOUNT_KEYS: &[&str] = &["amount", "value"];
const TYPE_KEYS: &[&str] = &["type", "record_type", "transaction_type"];
const DATE_KEYS: &[&str] = &["date", "transaction_date", "timestamp"];
const DESCRIPTION_KEYS: &[&str] = &["description", "memo", "name"];
const CATEGORY_KEYS: &[&str] = &["category", "account"];

const EXPENSE_MARKER: &str = "expense";

/// Why a candidate did not become a record. Not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoScalarFields,
    AmountNotNumeric(String),
    NearZeroAmount(f64),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoScalarFields => write!(f, "no scalar fields"),
            SkipReason::AmountNotNumeric(raw) => write!(f, "amount '{}' is not numeric", raw),
            SkipReason::NearZeroAmount(amount) => write!(f, "amount {} is below noise threshold", amount),
        }
    }
}

/// Lowercased view of the scalar fields of a record.
struct ScalarFields<'a>(HashMap<String, &'a Value>);

impl<'a> ScalarFields<'a> {
    fn from_record(record: &'a Map<String, Value>) -> Self {
        let fields = record
            .iter()
            .filter(|(_, v)| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self(fields)
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First alias present in the record.
    fn first(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().find_map(|k| self.0.get(*k).copied())
    }

    fn text_or(&self, keys: &[&str], default: &str) -> String {
        self.first(keys)
            .map(scalar_to_text)
            .unwrap_or_else(|| default.to_string())
    }
}

fn scalar_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn default_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

fn parse_date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).unwrap_or_else(|_| default_date())
}

/// Build a `TransactionRecord` from one candidate, or say why it was skipped.
pub fn normalize_record(record: &Map<String, Value>) -> Result<TransactionRecord, SkipReason> {
    let fields = ScalarFields::from_record(record);
    if fields.is_empty() {
        return Err(SkipReason::NoScalarFields);
    }

    let mut amount = match fields.first(AMOUNT_KEYS) {
        Some(raw) => {
            coerce_amount(raw).ok_or_else(|| SkipReason::AmountNotNumeric(scalar_to_text(raw)))?
        }
        None => 0.0,
    };

    if amount.abs() < NOISE_THRESHOLD {
        return Err(SkipReason::NearZeroAmount(amount));
    }

    let record_type = fields.text_or(TYPE_KEYS, DEFAULT_TYPE);

    // stored convention: revenue positive, expense negative
    if amount > 0.0 && record_type.to_lowercase().contains(EXPENSE_MARKER) {
        amount = -amount;
    }

    let date = parse_date(&fields.text_or(DATE_KEYS, DEFAULT_DATE));

    Ok(TransactionRecord {
        date,
        description: fields.text_or(DESCRIPTION_KEYS, DEFAULT_DESCRIPTION),
        amount,
        category: fields.text_or(CATEGORY_KEYS, DEFAULT_CATEGORY),
        record_type,
        raw_source: Value::Object(record.clone()).to_string(),
    })
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One normalized financial event.
///
/// `amount` follows the stored sign convention: positive is revenue,
/// negative is expense. `raw_source` is the compact JSON of the record the
/// event was built from and is kept for audit only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub category: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub raw_source: String,
}

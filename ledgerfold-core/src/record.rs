//! Canonical, source-agnostic shape of one statement row.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Flow direction of a raw statement row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "expense")]
    Expense,
    #[serde(rename = "income")]
    Income,
}

/// Well-known keys for [`NormalizedRecord::extra`]. Adapters fill whichever
/// of these the source export carries; the synthesizer copies them into
/// transaction metadata.
pub mod extra {
    /// Source-side transaction kind ("Purchase", "Withdrawal", "Repayment"...).
    pub const KIND: &str = "kind";
    /// Payment method / funding channel named on the row.
    pub const PAYMENT_METHOD: &str = "payment_method";
    /// Platform-side trade or order number.
    pub const TRADE_NO: &str = "trade_no";
    /// Merchant-side order number.
    pub const MERCHANT_NO: &str = "merchant_no";
    /// Free-text note column.
    pub const NOTE: &str = "note";
}

/// Normalized output of statement adapters (source-agnostic).
///
/// One per raw statement row, immutable once built. `amount` is the row's
/// magnitude; the sign lives in `direction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub occurred_at: NaiveDateTime,
    pub posted_at: Option<NaiveDate>,
    pub direction: Direction,
    pub amount: Decimal,
    pub currency: String,
    pub counterparty_raw: String,
    pub description_raw: String,
    /// Source account discriminator (e.g. card last four); may be empty.
    pub source_account_key: String,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl NormalizedRecord {
    pub fn is_expense(&self) -> bool {
        self.direction == Direction::Expense
    }

    pub fn is_income(&self) -> bool {
        self.direction == Direction::Income
    }

    /// Look up an extra field, treating an empty value as absent.
    pub fn extra_field(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .map(String::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// File-level facts an adapter provides alongside the record sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementMeta {
    /// Statement title as printed in the export.
    pub title: String,
    /// Statement date (start of the covered range).
    pub statement_date: NaiveDate,
    /// Source account identifier found on the file (e.g. card last four);
    /// empty when the source has none.
    pub source_account: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record() -> NormalizedRecord {
        NormalizedRecord {
            occurred_at: NaiveDate::from_ymd_opt(2024, 9, 30)
                .unwrap()
                .and_hms_opt(12, 1, 5)
                .unwrap(),
            posted_at: None,
            direction: Direction::Expense,
            amount: dec!(35.00),
            currency: "CNY".to_string(),
            counterparty_raw: "STARBUCKS COFFEE".to_string(),
            description_raw: "Latte".to_string(),
            source_account_key: "1234".to_string(),
            extra: BTreeMap::from([
                (extra::KIND.to_string(), "Purchase".to_string()),
                (extra::NOTE.to_string(), "  ".to_string()),
            ]),
        }
    }

    #[test]
    fn test_direction_helpers() {
        let rec = record();
        assert!(rec.is_expense());
        assert!(!rec.is_income());
    }

    #[test]
    fn test_extra_field_blank_is_absent() {
        let rec = record();
        assert_eq!(rec.extra_field(extra::KIND), Some("Purchase"));
        assert_eq!(rec.extra_field(extra::NOTE), None);
        assert_eq!(rec.extra_field(extra::TRADE_NO), None);
    }

    #[test]
    fn test_record_round_trips_through_serde() {
        let rec = record();
        let json = serde_json::to_string(&rec).unwrap();
        let back: NormalizedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
        assert!(json.contains("\"expense\""));
    }
}

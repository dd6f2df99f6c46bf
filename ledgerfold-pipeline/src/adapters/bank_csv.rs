//! Debit-card CSV export adapter (bank transaction histories).
//!
//! Expected extracted shape, rows newest-first:
//!   Debit Card Transaction History
//!   # Account No: **** **** **** 6066
//!   # Date Range: [20240901] - [20240930]
//!   Date,Time,Income,Expense,Balance,Kind,Note
//!   20240930,14:22:10,,500.00,1200.00,POS Purchase,Hotel X

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveTime};
use ledgerfold_core::record::{Direction, extra};
use ledgerfold_core::{NormalizedRecord, StatementMeta};
use log::{info, warn};
use regex::Regex;
use rust_decimal::Decimal;

use crate::adapter::{Statement, StatementAdapter};

const TITLE_MARKER: &str = "Debit Card Transaction History";
const HEADER_PREFIX: &str = "Date,";
const CURRENCY: &str = "CNY";

pub struct BankCsvAdapter;

impl StatementAdapter for BankCsvAdapter {
    fn name(&self) -> &'static str {
        "bank"
    }

    fn identify(&self, file_name: &str, text: &str) -> bool {
        if !file_name.ends_with(".csv") {
            info!("file {file_name} is not a CSV");
            return false;
        }
        if !text.lines().next().unwrap_or("").contains(TITLE_MARKER) {
            info!("file {file_name} is not a debit card transaction history");
            return false;
        }
        true
    }

    fn extract(&self, text: &str) -> Result<Statement> {
        parse_bank_csv(text)
    }
}

/// Parse a debit-card export into a statement with ascending records.
pub fn parse_bank_csv(text: &str) -> Result<Statement> {
    let title = text.lines().next().unwrap_or("").trim().to_string();
    if !title.contains(TITLE_MARKER) {
        bail!("not a debit card transaction history");
    }

    let account_re = Regex::new(r"Account No:.*?(\d{4})\s*$")?;
    let range_re = Regex::new(r"Date Range: \[(\d{8})\]")?;
    let mut card_last_four = None;
    let mut statement_date = None;
    let mut header_idx = None;
    for (idx, line) in text.lines().enumerate() {
        if let Some(caps) = account_re.captures(line) {
            card_last_four = Some(caps[1].to_string());
        }
        if let Some(caps) = range_re.captures(line) {
            statement_date = NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok();
        }
        if line.starts_with(HEADER_PREFIX) {
            header_idx = Some(idx);
            break;
        }
    }
    let header_idx = header_idx.context("no transaction header row")?;
    let card_last_four = card_last_four.context("no account number in preamble")?;
    let statement_date = statement_date.context("no date range in preamble")?;

    let body = text
        .lines()
        .skip(header_idx)
        .collect::<Vec<_>>()
        .join("\n");
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!("skipping malformed row: {err}");
                continue;
            }
        };
        match parse_row(&row, &card_last_four) {
            Some(record) => records.push(record),
            None => warn!("skipping unparseable row: {row:?}"),
        }
    }

    records.reverse(); // export lists newest first
    Ok(Statement {
        meta: StatementMeta {
            title,
            statement_date,
            source_account: card_last_four,
        },
        records,
    })
}

fn parse_row(row: &csv::StringRecord, card_last_four: &str) -> Option<NormalizedRecord> {
    let date = NaiveDate::parse_from_str(row.get(0)?.trim(), "%Y%m%d").ok()?;
    let time = NaiveTime::parse_from_str(row.get(1)?.trim(), "%H:%M:%S").ok()?;

    let income = row.get(2)?.trim();
    let expense = row.get(3)?.trim();
    let (direction, amount_str) = if income.is_empty() {
        (Direction::Expense, expense)
    } else {
        (Direction::Income, income)
    };
    let amount = Decimal::from_str(&amount_str.replace(',', "")).ok()?;

    let kind = row.get(5)?.trim().to_string();
    let note = row.get(6)?.trim().to_string();

    let mut extra_fields = BTreeMap::new();
    if !kind.is_empty() {
        extra_fields.insert(extra::KIND.to_string(), kind.clone());
    }

    Some(NormalizedRecord {
        occurred_at: date.and_time(time),
        posted_at: None,
        direction,
        amount,
        currency: CURRENCY.to_string(),
        // The note column carries the merchant text; the kind column is a
        // coarse label shared by most rows, so it becomes the narration.
        counterparty_raw: note,
        description_raw: kind,
        source_account_key: card_last_four.to_string(),
        extra: extra_fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = "\
Debit Card Transaction History
# Account No: **** **** **** 6066
# Date Range: [20240901] - [20240930]
Date,Time,Income,Expense,Balance,Kind,Note
20240930,14:22:10,,500.00,700.00,POS Purchase,Hotel X
20240929,10:05:00,2000.00,,1200.00,Transfer In,ACME CORP SALARY
20240928,08:30:45,,66.00,-800.00,POS Purchase,TenPay-Noodle House
";

    #[test]
    fn test_identifies_bank_exports_only() {
        let adapter = BankCsvAdapter;
        assert!(adapter.identify("history.csv", SAMPLE));
        assert!(!adapter.identify("history.csv", "Wallet Statement Export\n"));
    }

    #[test]
    fn test_preamble_yields_card_and_statement_date() {
        let statement = parse_bank_csv(SAMPLE).unwrap();
        assert_eq!(statement.meta.source_account, "6066");
        assert_eq!(
            statement.meta.statement_date,
            NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
        );
    }

    #[test]
    fn test_rows_reverse_to_ascending_and_split_by_column() {
        let statement = parse_bank_csv(SAMPLE).unwrap();
        assert_eq!(statement.records.len(), 3);

        let noodle = &statement.records[0];
        assert_eq!(noodle.direction, Direction::Expense);
        assert_eq!(noodle.amount, dec!(66.00));
        assert_eq!(noodle.counterparty_raw, "TenPay-Noodle House");
        assert_eq!(noodle.description_raw, "POS Purchase");
        assert_eq!(noodle.source_account_key, "6066");

        let salary = &statement.records[1];
        assert_eq!(salary.direction, Direction::Income);
        assert_eq!(salary.amount, dec!(2000.00));
        assert_eq!(salary.counterparty_raw, "ACME CORP SALARY");
    }

    #[test]
    fn test_missing_preamble_is_an_extract_error() {
        let text = "Debit Card Transaction History\nDate,Time,Income,Expense,Balance,Kind,Note\n";
        assert!(parse_bank_csv(text).is_err());
    }

    #[test]
    fn test_bad_amount_rows_are_skipped() {
        let with_noise = format!("{SAMPLE}20240927,09:00:00,,abc,0.00,POS Purchase,Somewhere\n");
        let statement = parse_bank_csv(&with_noise).unwrap();
        assert_eq!(statement.records.len(), 3);
    }
}

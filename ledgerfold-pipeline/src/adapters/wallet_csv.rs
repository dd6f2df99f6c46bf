//! Wallet app CSV export adapter (payment-platform statements).
//!
//! Expected extracted shape, rows newest-first:
//!   Wallet Statement Export
//!   Start Time: [2024-09-01 00:00:00]  End Time: [2024-09-30 23:59:59]
//!   ----------------------------------------------------------------
//!   Transaction Time,Kind,Counterparty,Product,Flow,Amount,Payment Method,Status,Trade No,Merchant No,Note
//!   2024-09-30 12:01:05,Purchase,STARBUCKS COFFEE,Latte,Expense,¥35.00,Balance,Done,T10001,/,/

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use ledgerfold_core::record::{Direction, extra};
use ledgerfold_core::{NormalizedRecord, StatementMeta};
use log::{info, warn};
use regex::Regex;
use rust_decimal::Decimal;

use crate::adapter::{Statement, StatementAdapter};

const TITLE_MARKER: &str = "Wallet Statement Export";
const HEADER_PREFIX: &str = "Transaction Time,";
const CURRENCY: &str = "CNY";

pub struct WalletCsvAdapter;

impl StatementAdapter for WalletCsvAdapter {
    fn name(&self) -> &'static str {
        "wallet"
    }

    fn identify(&self, file_name: &str, text: &str) -> bool {
        if !file_name.ends_with(".csv") {
            info!("file {file_name} is not a CSV");
            return false;
        }
        if !text.lines().next().unwrap_or("").contains(TITLE_MARKER) {
            info!("file {file_name} is not a wallet statement export");
            return false;
        }
        true
    }

    fn extract(&self, text: &str) -> Result<Statement> {
        parse_wallet_csv(text)
    }
}

/// Parse a wallet export into a statement with ascending records.
pub fn parse_wallet_csv(text: &str) -> Result<Statement> {
    let title = text.lines().next().unwrap_or("").trim().to_string();
    if !title.contains(TITLE_MARKER) {
        bail!("not a wallet statement export");
    }

    let date_re = Regex::new(r"Start Time: \[(\d{4}-\d{2}-\d{2})")?;
    let mut statement_date = None;
    let mut header_idx = None;
    for (idx, line) in text.lines().enumerate() {
        if let Some(caps) = date_re.captures(line) {
            statement_date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok();
        }
        if line.starts_with(HEADER_PREFIX) {
            header_idx = Some(idx);
            break;
        }
    }
    let header_idx = header_idx.context("no transaction header row")?;
    let statement_date = statement_date.context("no statement date in preamble")?;

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
        match parse_row(&row) {
            Some(record) => records.push(record),
            None => warn!("skipping unparseable row: {row:?}"),
        }
    }

    records.reverse(); // export lists newest first
    Ok(Statement {
        meta: StatementMeta {
            title,
            statement_date,
            source_account: String::new(),
        },
        records,
    })
}

fn parse_row(row: &csv::StringRecord) -> Option<NormalizedRecord> {
    let occurred_at =
        NaiveDateTime::parse_from_str(row.get(0)?.trim(), "%Y-%m-%d %H:%M:%S").ok()?;
    let direction = match row.get(4)?.trim() {
        "Expense" => Direction::Expense,
        "Income" => Direction::Income,
        _ => return None, // neutral rows (own-account transfers) are not ours
    };
    let amount_str = row.get(5)?.trim().trim_start_matches('¥').replace(',', "");
    let amount = Decimal::from_str(&amount_str).ok()?;

    let mut extra_fields = BTreeMap::new();
    for (key, idx) in [
        (extra::KIND, 1),
        (extra::PAYMENT_METHOD, 6),
        (extra::TRADE_NO, 8),
        (extra::MERCHANT_NO, 9),
        (extra::NOTE, 10),
    ] {
        if let Some(value) = row.get(idx).map(str::trim).filter(|v| !v.is_empty()) {
            extra_fields.insert(key.to_string(), value.to_string());
        }
    }

    Some(NormalizedRecord {
        occurred_at,
        posted_at: None,
        direction,
        amount,
        currency: CURRENCY.to_string(),
        counterparty_raw: row.get(2)?.trim().to_string(),
        description_raw: row.get(3)?.trim().to_string(),
        source_account_key: String::new(),
        extra: extra_fields,
    })
}

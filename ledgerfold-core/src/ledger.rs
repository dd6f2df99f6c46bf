//! Double-entry ledger shapes handed to the ledger-writing collaborator.
//!
//! The collaborator owns textual serialization; this module only defines the
//! in-memory contract and the balance arithmetic over it.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Classification confidence marker on a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    Confident,
    Uncertain,
}

impl Flag {
    /// Conventional single-character rendering for ledger writers.
    pub fn symbol(self) -> char {
        match self {
            Flag::Confident => '*',
            Flag::Uncertain => '!',
        }
    }
}

/// A metadata value: free text or a boolean marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Text(String),
}

/// Insertion-ordered transaction metadata.
///
/// Keys iterate in the order they were first set, so output is stable across
/// runs. Setting an existing key overwrites its value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata(Vec<(String, MetaValue)>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, key: &str, value: impl Into<String>) {
        self.set(key, MetaValue::Text(value.into()));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, MetaValue::Bool(value));
    }

    fn set(&mut self, key: &str, value: MetaValue) {
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.0.push((key.to_string(), value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, MetaValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One leg of a double-entry transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub account: String,
    /// `None` leaves the leg implicit; the writer infers the residual.
    pub amount: Option<Decimal>,
    pub currency: String,
}

impl Posting {
    pub fn explicit(
        account: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            amount: Some(amount),
            currency: currency.into(),
        }
    }

    pub fn implicit(account: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            amount: None,
            currency: currency.into(),
        }
    }
}

/// A balanced, classified ledger transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub date: NaiveDate,
    pub flag: Flag,
    pub payee: String,
    pub narration: String,
    pub tags: BTreeSet<String>,
    pub links: BTreeSet<String>,
    pub meta: Metadata,
    pub postings: Vec<Posting>,
}

impl LedgerTransaction {
    /// Sum of all explicit posting amounts in `currency`.
    pub fn residual(&self, currency: &str) -> Decimal {
        self.postings
            .iter()
            .filter(|p| p.currency == currency)
            .filter_map(|p| p.amount)
            .sum()
    }

    /// Currencies appearing on any posting, sorted.
    pub fn currencies(&self) -> BTreeSet<&str> {
        self.postings.iter().map(|p| p.currency.as_str()).collect()
    }

    /// Balance invariant: per currency, explicit amounts plus at most one
    /// implicit posting sum to exactly zero.
    pub fn is_balanced(&self) -> bool {
        if self.postings.len() < 2 {
            return false;
        }
        let mut implicit: HashMap<&str, usize> = HashMap::new();
        for posting in &self.postings {
            if posting.amount.is_none() {
                *implicit.entry(posting.currency.as_str()).or_default() += 1;
            }
        }
        for currency in self.currencies() {
            match implicit.get(currency).copied().unwrap_or(0) {
                0 if self.residual(currency) != Decimal::ZERO => return false,
                0 | 1 => {}
                _ => return false,
            }
        }
        true
    }
}

/// Identity grouping raw rows that are legs of one logical transaction
/// within a single statement file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeKey {
    pub date: NaiveDate,
    pub source_account_key: String,
    pub payee: String,
}

//! Per-file leg-merge accumulator.

use std::collections::HashMap;

use anyhow::{Result, bail};
use ledgerfold_core::{LedgerTransaction, MergeKey, Posting};
use log::debug;

/// Accumulates one statement file's transactions in row order, folding rows
/// that share a merge key into extra postings on the first transaction.
///
/// The state is an explicit value owned by one file's fold; no key survives
/// across files. The first record under a key establishes the transaction's
/// date, payee, flag, and metadata — later records only contribute postings.
#[derive(Debug, Default)]
pub struct MergeFold {
    transactions: Vec<LedgerTransaction>,
    seen: HashMap<MergeKey, usize>,
}

impl MergeFold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// True when `key` already owns a transaction in this file.
    pub fn contains(&self, key: &MergeKey) -> bool {
        self.seen.contains_key(key)
    }

    /// Insert a freshly synthesized transaction under its key.
    pub fn insert(&mut self, key: MergeKey, tx: LedgerTransaction) {
        let idx = self.transactions.len();
        self.transactions.push(tx);
        self.seen.insert(key, idx);
    }

    /// Append one leg to the transaction owning `key`. The first record
    /// under a key fixed the currency; a conflicting leg is an error the
    /// caller downgrades to a record-level skip.
    pub fn append_leg(&mut self, key: &MergeKey, leg: Posting) -> Result<()> {
        let Some(&idx) = self.seen.get(key) else {
            bail!("no transaction under merge key for payee `{}`", key.payee);
        };
        let tx = &mut self.transactions[idx];
        if let Some(first) = tx.postings.first() {
            if first.currency != leg.currency {
                bail!(
                    "leg currency `{}` conflicts with `{}` under merge key for payee `{}`",
                    leg.currency,
                    first.currency,
                    key.payee
                );
            }
        }
        debug!("appending merged leg to `{}` on {}", tx.payee, tx.date);
        tx.postings.push(leg);
        Ok(())
    }

    /// The file's transactions, still in original row order.
    pub fn finish(self) -> Vec<LedgerTransaction> {
        self.transactions
    }
}

//! Builds balanced double-entry transactions from normalized records.

use std::collections::BTreeSet;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use ledgerfold_classify::Classification;
use ledgerfold_core::record::extra;
use ledgerfold_core::{
    Flag, LedgerPolicy, LedgerTransaction, MergeKey, Metadata, NormalizedRecord, Posting,
    SourcePolicy,
};
use regex::Regex;
use rust_decimal::Decimal;

/// Placeholder several source exports print for "no value".
const PLACEHOLDER: &str = "/";

/// Compiles a source policy into a transaction builder.
///
/// Construction is the load-time boundary: a policy with a bad fee pattern
/// fails here, and a `Synthesizer` that exists never fails on configuration.
pub struct Synthesizer {
    policy: SourcePolicy,
    ledger: LedgerPolicy,
    fee_pattern: Option<Regex>,
}

impl Synthesizer {
    pub fn new(policy: SourcePolicy, ledger: LedgerPolicy) -> Result<Self> {
        let fee_pattern = policy
            .fee_note_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .with_context(|| format!("invalid fee pattern for source `{}`", policy.source))?;
        Ok(Self {
            policy,
            ledger,
            fee_pattern,
        })
    }

    pub fn policy(&self) -> &SourcePolicy {
        &self.policy
    }

    pub fn ledger(&self) -> &LedgerPolicy {
        &self.ledger
    }

    /// The date the transaction will carry: the posted date for sources
    /// that book on it, else the transaction date.
    pub fn entry_date(&self, record: &NormalizedRecord) -> NaiveDate {
        if self.policy.prefer_posted_date {
            if let Some(posted) = record.posted_at {
                return posted;
            }
        }
        record.occurred_at.date()
    }

    /// Payee and narration text, with the source's transfer-comment prefix
    /// stripped off the narration.
    pub fn payee_narration(&self, record: &NormalizedRecord) -> (String, String) {
        let payee = record.counterparty_raw.trim().to_string();
        let mut narration = record.description_raw.clone();
        if let Some(prefix) = &self.policy.note_prefix {
            narration = narration.replace(prefix.as_str(), "");
        }
        (payee, narration.trim().to_string())
    }

    /// Identity under which rows of one file merge into one transaction.
    pub fn merge_key(&self, record: &NormalizedRecord) -> MergeKey {
        let (payee, _) = self.payee_narration(record);
        MergeKey {
            date: self.entry_date(record),
            source_account_key: record.source_account_key.clone(),
            payee,
        }
    }

    /// The extra posting a repeated-key record contributes to the existing
    /// transaction, signed by its direction.
    pub fn merge_leg(&self, record: &NormalizedRecord) -> Posting {
        let amount = if record.is_expense() {
            -record.amount
        } else {
            record.amount
        };
        Posting::explicit(self.source_account(record), amount, &record.currency)
    }

    /// Gate a record against the source's expected currency. A mismatch is
    /// a recoverable record-level error: the caller logs and skips.
    pub fn check_currency(&self, record: &NormalizedRecord) -> Result<()> {
        if let Some(expected) = &self.policy.expected_currency {
            if &record.currency != expected {
                bail!(
                    "unsupported currency `{}` (expected `{expected}`)",
                    record.currency
                );
            }
        }
        Ok(())
    }

    /// Build one balanced transaction from a record and its classification.
    ///
    /// An unmatched classification never fails synthesis: the counter
    /// account falls back to the source defaults and the transaction is
    /// flagged `Uncertain` so it is kept for later reclassification.
    pub fn synthesize(
        &self,
        record: &NormalizedRecord,
        classification: &Classification,
    ) -> Result<LedgerTransaction> {
        self.check_currency(record)?;

        let (payee, narration) = self.payee_narration(record);
        let date = self.entry_date(record);
        let currency = record.currency.as_str();
        let is_withdrawal = record.is_expense()
            && record
                .extra_field(extra::KIND)
                .is_some_and(|kind| self.policy.withdrawal_kinds.iter().any(|w| w == kind));

        let mut postings = Vec::with_capacity(3);
        if is_withdrawal {
            // Balance leaves the wallet for the destination card; the fee
            // stays behind as its own leg, zero when the note names none.
            let fee = self.fee_from_note(record);
            postings.push(Posting::explicit(
                &self.policy.account,
                -record.amount,
                currency,
            ));
            postings.push(Posting::implicit(
                self.withdrawal_destination(record),
                currency,
            ));
            postings.push(Posting::explicit(&self.policy.fee_account, fee, currency));
        } else if record.is_expense() {
            let counter = classification
                .account()
                .unwrap_or(&self.policy.expense_account);
            postings.push(Posting::implicit(self.source_account(record), currency));
            postings.push(Posting::explicit(counter, record.amount, currency));
        } else {
            let counter = classification
                .account()
                .unwrap_or_else(|| self.policy.inflow_fallback());
            postings.push(Posting::explicit(
                self.source_account(record),
                record.amount,
                currency,
            ));
            postings.push(Posting::implicit(counter, currency));
        }

        let unambiguous =
            is_withdrawal || (record.is_income() && self.policy.confident_income);
        let flag = if classification.matched || unambiguous {
            Flag::Confident
        } else {
            Flag::Uncertain
        };

        Ok(LedgerTransaction {
            date,
            flag,
            payee,
            narration,
            tags: BTreeSet::new(),
            links: BTreeSet::new(),
            meta: self.metadata(record, date),
            postings,
        })
    }

    /// The account holding the source's own money for this record: the
    /// payment-method override when one is configured, else the main
    /// account suffixed with the record's account key.
    fn source_account(&self, record: &NormalizedRecord) -> String {
        if let Some(method) = record.extra_field(extra::PAYMENT_METHOD) {
            if let Some(account) = self.policy.additional_accounts.get(method) {
                return account.clone();
            }
        }
        if record.source_account_key.is_empty() {
            self.policy.account.clone()
        } else {
            format!("{}:{}", self.policy.account, record.source_account_key)
        }
    }

    /// Where a withdrawal lands: the payment-method override names the
    /// destination card, falling back to the source's asset default.
    fn withdrawal_destination(&self, record: &NormalizedRecord) -> String {
        record
            .extra_field(extra::PAYMENT_METHOD)
            .and_then(|method| self.policy.additional_accounts.get(method))
            .or(self.policy.asset_account.as_ref())
            .cloned()
            .unwrap_or_else(|| self.policy.account.clone())
    }

    /// Fee amount named in the record note, zero when absent or unparseable.
    fn fee_from_note(&self, record: &NormalizedRecord) -> Decimal {
        let Some(pattern) = &self.fee_pattern else {
            return Decimal::ZERO;
        };
        let Some(note) = record.extra_field(extra::NOTE) else {
            return Decimal::ZERO;
        };
        pattern
            .captures(note)
            .and_then(|caps| caps.get(1))
            .and_then(|m| Decimal::from_str(m.as_str()).ok())
            .unwrap_or(Decimal::ZERO)
    }

    /// Deterministic transaction metadata: the record's source-specific
    /// identifiers, in a fixed insertion order, with the export's `/`
    /// placeholder suppressed.
    fn metadata(&self, record: &NormalizedRecord, date: NaiveDate) -> Metadata {
        let mut meta = Metadata::new();
        if let Some(kind) = record.extra_field(extra::KIND) {
            meta.set_text("transaction_type", kind);
        }
        if let Some(method) = record.extra_field(extra::PAYMENT_METHOD) {
            meta.set_text("payment_method", method);
        }
        let time = record.occurred_at.time();
        // Date-only sources leave the time at midnight; skip it.
        if time != chrono::NaiveTime::MIN {
            meta.set_text("time", time.format("%H:%M:%S").to_string());
        }
        for (extra_key, meta_key) in [
            (extra::NOTE, "note"),
            (extra::TRADE_NO, "trade_no"),
            (extra::MERCHANT_NO, "merchant_no"),
        ] {
            if let Some(value) = record.extra_field(extra_key).filter(|v| *v != PLACEHOLDER) {
                meta.set_text(meta_key, value);
            }
        }
        let occurred = record.occurred_at.date();
        if date != occurred {
            meta.set_text("transaction_date", occurred.format("%Y-%m-%d").to_string());
        }
        meta
    }
}

//! Immutable configuration values consumed by the pipeline.
//!
//! Values are constructed once by the caller (the loading mechanism is out
//! of scope) and passed into each component; core logic never reaches for
//! ambient settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-source accounts and behavior toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcePolicy {
    /// Adapter id this policy applies to ("wallet", "bank", ...).
    pub source: String,
    /// Main account carrying the source's own money, without any card
    /// suffix ("Assets:Wallet", "Liabilities:Credit:Acme").
    pub account: String,
    /// Counter account for unclassified outflows.
    pub expense_account: String,
    /// Counter account for unclassified inflows.
    pub income_account: String,
    /// Counter account for inflows on credit-card sources (repayments,
    /// refunds land on an asset, not income); `None` falls back to
    /// `income_account`.
    pub asset_account: Option<String>,
    /// Account receiving withdrawal service fees.
    pub fee_account: String,
    /// Payment-method name -> asset account override.
    pub additional_accounts: BTreeMap<String, String>,
    /// Gate records to this currency; `None` accepts any.
    pub expected_currency: Option<String>,
    /// Record kinds synthesized as withdrawal-with-fee (three legs).
    pub withdrawal_kinds: Vec<String>,
    /// Record kinds flagged as duplicates: the repayment always appears on
    /// the funding bank's statement too.
    pub repayment_kinds: Vec<String>,
    /// Prefix stripped from the narration (transfer comment marker).
    pub note_prefix: Option<String>,
    /// Pattern whose first capture group extracts the fee amount from the
    /// record note.
    pub fee_note_pattern: Option<String>,
    /// Flag transactions routed through known pass-through apps.
    pub ignore_apps: bool,
    /// Pass-through app markers searched in payee and narration.
    pub app_markers: Vec<String>,
    /// Date the transaction on the posted date when the record has one.
    pub prefer_posted_date: bool,
    /// Treat inflows on this source as inherently unambiguous.
    pub confident_income: bool,
}

impl Default for SourcePolicy {
    fn default() -> Self {
        Self {
            source: String::new(),
            account: "Assets:Uncategorized".to_string(),
            expense_account: "Expenses:Uncategorized".to_string(),
            income_account: "Income:Uncategorized".to_string(),
            asset_account: None,
            fee_account: "Expenses:Fee".to_string(),
            additional_accounts: BTreeMap::new(),
            expected_currency: None,
            withdrawal_kinds: Vec::new(),
            repayment_kinds: Vec::new(),
            note_prefix: None,
            fee_note_pattern: None,
            ignore_apps: false,
            app_markers: Vec::new(),
            prefer_posted_date: false,
            confident_income: false,
        }
    }
}

impl SourcePolicy {
    /// Fallback counter account for an inflow.
    pub fn inflow_fallback(&self) -> &str {
        self.asset_account.as_deref().unwrap_or(&self.income_account)
    }
}

/// Ledger-wide conventions shared by every source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerPolicy {
    /// Reserved metadata key marking a transaction as a known duplicate of
    /// an event recorded by another source's statement.
    pub duplicate_meta: String,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            duplicate_meta: "__duplicate__".to_string(),
        }
    }
}

/// Gating for a scored classifier, when one is configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Minimum confidence for a scored prediction to count as matched.
    pub confidence_threshold: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
        }
    }
}

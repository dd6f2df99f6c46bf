//! Flags transactions expected to be recorded again by another source.

use ledgerfold_core::record::extra;
use ledgerfold_core::{LedgerPolicy, LedgerTransaction, NormalizedRecord, SourcePolicy};

/// Set the reserved duplicate marker when the transaction is a known
/// pass-through (payee or narration names an intermediary app) or a
/// repayment leg that the funding bank's statement also records. Only
/// metadata changes; postings and amounts are never touched — downstream
/// consolidation decides what to do with the marker.
pub fn flag_duplicate(
    tx: &mut LedgerTransaction,
    record: &NormalizedRecord,
    policy: &SourcePolicy,
    ledger: &LedgerPolicy,
) {
    let via_app = policy.ignore_apps
        && policy
            .app_markers
            .iter()
            .any(|marker| tx.payee.contains(marker.as_str()) || tx.narration.contains(marker.as_str()));
    let repayment = record
        .extra_field(extra::KIND)
        .is_some_and(|kind| policy.repayment_kinds.iter().any(|r| r == kind));
    if via_app || repayment {
        tx.meta.set_bool(&ledger.duplicate_meta, true);
    }
}

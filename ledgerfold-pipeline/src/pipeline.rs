//! Left-to-right fold of one statement file into ledger transactions.

use std::sync::Arc;

use anyhow::Result;
use ledgerfold_classify::{Classification, Classifier};
use ledgerfold_core::{LedgerPolicy, LedgerTransaction, NormalizedRecord, SourcePolicy};
use log::{debug, warn};

use crate::adapter::Statement;
use crate::duplicate::flag_duplicate;
use crate::merge::MergeFold;
use crate::synth::Synthesizer;

/// Per-source processing pipeline: merge fold, classification, synthesis,
/// duplicate flagging.
///
/// One instance serves many files. Each `process` call owns its fold state,
/// so independent files can run on parallel workers sharing one pipeline;
/// the classifier is read-only and `Send + Sync` by contract. Within a file,
/// records fold strictly in row order — a later row must see the merge state
/// its predecessors left behind.
pub struct FilePipeline {
    synthesizer: Synthesizer,
    classifier: Option<Arc<dyn Classifier>>,
}

impl FilePipeline {
    pub fn new(
        policy: SourcePolicy,
        ledger: LedgerPolicy,
        classifier: Option<Arc<dyn Classifier>>,
    ) -> Result<Self> {
        Ok(Self {
            synthesizer: Synthesizer::new(policy, ledger)?,
            classifier,
        })
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    /// Process one statement file into its transactions, in row order.
    /// A failing record is logged and skipped; it never aborts the file.
    pub fn process(&self, statement: &Statement) -> Vec<LedgerTransaction> {
        let mut fold = MergeFold::new();
        for (row, record) in statement.records.iter().enumerate() {
            if let Err(err) = self.fold_record(&mut fold, record) {
                warn!(
                    "{}: skipping row {row}: {err:#}",
                    statement.meta.title
                );
            }
        }
        debug!(
            "{}: {} records -> {} transactions",
            statement.meta.title,
            statement.records.len(),
            fold.len()
        );
        fold.finish()
    }

    fn fold_record(&self, fold: &mut MergeFold, record: &NormalizedRecord) -> Result<()> {
        self.synthesizer.check_currency(record)?;

        let key = self.synthesizer.merge_key(record);
        if fold.contains(&key) {
            // A later leg of an event we already hold: contribute a posting
            // and emit nothing new.
            let leg = self.synthesizer.merge_leg(record);
            return fold.append_leg(&key, leg);
        }

        let classification = self.classify(record);
        let mut tx = self.synthesizer.synthesize(record, &classification)?;
        flag_duplicate(
            &mut tx,
            record,
            self.synthesizer.policy(),
            self.synthesizer.ledger(),
        );
        fold.insert(key, tx);
        Ok(())
    }

    fn classify(&self, record: &NormalizedRecord) -> Classification {
        let (payee, narration) = self.synthesizer.payee_narration(record);
        match &self.classifier {
            Some(classifier) => classifier.classify(&payee, &narration),
            None => Classification::unmatched(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ledgerfold_classify::{Rule, RuleClassifier};
    use ledgerfold_core::record::{Direction, extra};
    use ledgerfold_core::{Flag, MetaValue, StatementMeta};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn record(
        day: u32,
        payee: &str,
        direction: Direction,
        amount: Decimal,
    ) -> NormalizedRecord {
        NormalizedRecord {
            occurred_at: NaiveDate::from_ymd_opt(2024, 9, day)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            posted_at: None,
            direction,
            amount,
            currency: "CNY".to_string(),
            counterparty_raw: payee.to_string(),
            description_raw: "".to_string(),
            source_account_key: "1234".to_string(),
            extra: BTreeMap::new(),
        }
    }

    fn statement(records: Vec<NormalizedRecord>) -> Statement {
        Statement {
            meta: StatementMeta {
                title: "Debit Card Transaction History".to_string(),
                statement_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                source_account: "1234".to_string(),
            },
            records,
        }
    }

    fn policy() -> SourcePolicy {
        SourcePolicy {
            source: "card".to_string(),
            account: "Assets:Card".to_string(),
            expected_currency: Some("CNY".to_string()),
            ..SourcePolicy::default()
        }
    }

    fn coffee_classifier() -> Arc<dyn Classifier> {
        let rules: Vec<Rule> = serde_json::from_str(
            r#"[{
                "name": "coffee",
                "condition": {"payee": {"contains": "starbucks"}},
                "account": "Expenses:Coffee"
            }]"#,
        )
        .unwrap();
        Arc::new(RuleClassifier::new(&rules).unwrap())
    }

    #[test]
    fn test_classified_and_fallback_records_both_emit() {
        let pipeline =
            FilePipeline::new(policy(), LedgerPolicy::default(), Some(coffee_classifier()))
                .unwrap();
        let out = pipeline.process(&statement(vec![
            record(1, "STARBUCKS COFFEE", Direction::Expense, dec!(35.00)),
            record(2, "Unknown Vendor", Direction::Expense, dec!(12.00)),
        ]));

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].flag, Flag::Confident);
        assert_eq!(out[0].postings[1].account, "Expenses:Coffee");
        // Unclassified is still emitted, just uncertain.
        assert_eq!(out[1].flag, Flag::Uncertain);
        assert_eq!(out[1].postings[1].account, "Expenses:Uncategorized");
        assert!(out.iter().all(|tx| tx.is_balanced()));
    }

    #[test]
    fn test_no_classifier_configured_means_fallback() {
        let pipeline = FilePipeline::new(policy(), LedgerPolicy::default(), None).unwrap();
        let out = pipeline.process(&statement(vec![record(
            1,
            "STARBUCKS COFFEE",
            Direction::Expense,
            dec!(35.00),
        )]));
        assert_eq!(out[0].flag, Flag::Uncertain);
        assert_eq!(out[0].postings[1].account, "Expenses:Uncategorized");
    }

    #[test]
    fn test_bad_record_skips_without_aborting_the_file() {
        let pipeline = FilePipeline::new(policy(), LedgerPolicy::default(), None).unwrap();
        let mut foreign = record(2, "Duty Free", Direction::Expense, dec!(30.00));
        foreign.currency = "USD".to_string();
        let out = pipeline.process(&statement(vec![
            record(1, "Noodle House", Direction::Expense, dec!(20.00)),
            foreign,
            record(3, "Corner Cafe", Direction::Expense, dec!(15.00)),
        ]));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].payee, "Noodle House");
        assert_eq!(out[1].payee, "Corner Cafe");
    }

    #[test]
    fn test_same_key_rows_merge_into_one_transaction() {
        let pipeline = FilePipeline::new(policy(), LedgerPolicy::default(), None).unwrap();
        let out = pipeline.process(&statement(vec![
            record(5, "Hotel X", Direction::Expense, dec!(500.00)),
            record(5, "Hotel X", Direction::Income, dec!(120.00)),
        ]));

        assert_eq!(out.len(), 1);
        let tx = &out[0];
        assert_eq!(tx.postings.len(), 3);
        assert_eq!(tx.postings[0].account, "Assets:Card:1234");
        assert_eq!(tx.postings[0].amount, None);
        assert_eq!(tx.postings[1].amount, Some(dec!(500.00)));
        assert_eq!(
            tx.postings[2],
            ledgerfold_core::Posting::explicit("Assets:Card:1234", dec!(120.00), "CNY"),
        );
        assert!(tx.is_balanced());
    }

    #[test]
    fn test_merge_currency_conflict_skips_the_leg_only() {
        let mut policy = policy();
        policy.expected_currency = None;
        let pipeline = FilePipeline::new(policy, LedgerPolicy::default(), None).unwrap();
        let mut foreign_leg = record(5, "Hotel X", Direction::Income, dec!(20.00));
        foreign_leg.currency = "USD".to_string();
        let out = pipeline.process(&statement(vec![
            record(5, "Hotel X", Direction::Expense, dec!(500.00)),
            foreign_leg,
        ]));

        // First record's currency wins; the USD leg was dropped.
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].postings.len(), 2);
        assert_eq!(out[0].currencies().len(), 1);
    }

    #[test]
    fn test_duplicate_policy_changes_metadata_only() {
        let flagged_policy = SourcePolicy {
            ignore_apps: true,
            app_markers: vec!["TenPay-".to_string()],
            ..policy()
        };
        let records = || {
            vec![
                record(1, "TenPay-Noodle House", Direction::Expense, dec!(66.00)),
                record(2, "Corner Cafe", Direction::Expense, dec!(15.00)),
            ]
        };

        let with = FilePipeline::new(flagged_policy, LedgerPolicy::default(), None).unwrap();
        let without = FilePipeline::new(policy(), LedgerPolicy::default(), None).unwrap();
        let flagged = with.process(&statement(records()));
        let plain = without.process(&statement(records()));

        assert_eq!(
            flagged[0].meta.get("__duplicate__"),
            Some(&MetaValue::Bool(true))
        );
        assert!(plain[0].meta.get("__duplicate__").is_none());
        for (a, b) in flagged.iter().zip(&plain) {
            assert_eq!(a.postings, b.postings);
            assert_eq!(a.flag, b.flag);
        }
        assert!(flagged[1].meta.get("__duplicate__").is_none());
    }

    #[test]
    fn test_failing_classifier_still_emits_uncertain_transactions() {
        struct BrokenModel;
        impl ledgerfold_classify::ScoredModel for BrokenModel {
            fn score(
                &self,
                _payee: &str,
                _narration: &str,
            ) -> anyhow::Result<Option<ledgerfold_classify::Scored>> {
                anyhow::bail!("model backend unavailable")
            }
        }

        let classifier = Arc::new(ledgerfold_classify::ThresholdClassifier::new(
            BrokenModel,
            ledgerfold_core::ScoreConfig::default().confidence_threshold,
        ));
        let pipeline =
            FilePipeline::new(policy(), LedgerPolicy::default(), Some(classifier)).unwrap();
        let out = pipeline.process(&statement(vec![record(
            1,
            "Noodle House",
            Direction::Expense,
            dec!(20.00),
        )]));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].flag, Flag::Uncertain);
        assert_eq!(out[0].postings[1].account, "Expenses:Uncategorized");
    }

    #[test]
    fn test_pipeline_is_shareable_across_workers() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FilePipeline>();
    }

    #[test]
    fn test_merge_key_uses_entry_date() {
        // Same payee, different days: two transactions, no merge.
        let pipeline = FilePipeline::new(policy(), LedgerPolicy::default(), None).unwrap();
        let out = pipeline.process(&statement(vec![
            record(5, "Hotel X", Direction::Expense, dec!(500.00)),
            record(6, "Hotel X", Direction::Expense, dec!(500.00)),
        ]));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_records_missing_kind_still_synthesize() {
        let mut policy = policy();
        policy.withdrawal_kinds = vec!["Balance Withdrawal".to_string()];
        let pipeline = FilePipeline::new(policy, LedgerPolicy::default(), None).unwrap();
        let mut rec = record(1, "Corner Cafe", Direction::Expense, dec!(15.00));
        rec.extra
            .insert(extra::KIND.to_string(), "Purchase".to_string());
        let out = pipeline.process(&statement(vec![rec]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].postings.len(), 2);
    }
}

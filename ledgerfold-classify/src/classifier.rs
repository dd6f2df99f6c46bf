//! Classifier capability interface and composition.

use log::warn;
use serde::{Deserialize, Serialize};

/// Outcome of classifying one transaction's text. When `matched` is false
/// the account must be ignored and the caller's fallback used instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub matched: bool,
    pub account: Option<String>,
}

impl Classification {
    pub fn matched(account: impl Into<String>) -> Self {
        Self {
            matched: true,
            account: Some(account.into()),
        }
    }

    pub fn unmatched() -> Self {
        Self {
            matched: false,
            account: None,
        }
    }

    /// The predicted account, only when the classification is trusted.
    pub fn account(&self) -> Option<&str> {
        if self.matched { self.account.as_deref() } else { None }
    }
}

/// Anything that can predict an account from payee/narration text.
///
/// Implementations are shared read-only across parallel file workers, hence
/// `Send + Sync`; they are loaded once and never mutated afterwards.
pub trait Classifier: Send + Sync {
    fn classify(&self, payee: &str, narration: &str) -> Classification;
}

/// A scored prediction from an opaque model.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub account: String,
    pub confidence: f64,
}

/// Black-box scoring capability (e.g. a trained model). Fallibility lives
/// here: a failing model is downgraded to "no match" by the wrapper, never
/// surfaced to the pipeline.
pub trait ScoredModel: Send + Sync {
    fn score(&self, payee: &str, narration: &str) -> anyhow::Result<Option<Scored>>;
}

/// Gates a [`ScoredModel`] behind a confidence threshold.
pub struct ThresholdClassifier<M> {
    model: M,
    threshold: f64,
}

impl<M: ScoredModel> ThresholdClassifier<M> {
    pub fn new(model: M, threshold: f64) -> Self {
        Self { model, threshold }
    }
}

impl<M: ScoredModel> Classifier for ThresholdClassifier<M> {
    fn classify(&self, payee: &str, narration: &str) -> Classification {
        match self.model.score(payee, narration) {
            Ok(Some(scored)) if scored.confidence >= self.threshold => {
                Classification::matched(scored.account)
            }
            Ok(_) => Classification::unmatched(),
            Err(err) => {
                warn!("scored model failed, treating as unmatched: {err:#}");
                Classification::unmatched()
            }
        }
    }
}

/// Rules first, scored fallback second. The fallback is consulted only when
/// the primary produced no match; scores are never blended.
pub struct ClassifierChain {
    primary: Box<dyn Classifier>,
    fallback: Box<dyn Classifier>,
}

impl ClassifierChain {
    pub fn new(primary: Box<dyn Classifier>, fallback: Box<dyn Classifier>) -> Self {
        Self { primary, fallback }
    }
}

impl Classifier for ClassifierChain {
    fn classify(&self, payee: &str, narration: &str) -> Classification {
        let result = self.primary.classify(payee, narration);
        if result.matched {
            return result;
        }
        self.fallback.classify(payee, narration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Rule, RuleClassifier};
    use anyhow::anyhow;
    use std::collections::BTreeMap;

    struct FixedModel {
        result: anyhow::Result<Option<Scored>>,
    }

    impl FixedModel {
        fn some(account: &str, confidence: f64) -> Self {
            Self {
                result: Ok(Some(Scored {
                    account: account.to_string(),
                    confidence,
                })),
            }
        }
    }

    impl ScoredModel for FixedModel {
        fn score(&self, _payee: &str, _narration: &str) -> anyhow::Result<Option<Scored>> {
            match &self.result {
                Ok(scored) => Ok(scored.clone()),
                Err(err) => Err(anyhow!("{err}")),
            }
        }
    }

    fn coffee_rules() -> RuleClassifier {
        let rule = Rule {
            name: "coffee".to_string(),
            condition: BTreeMap::from([(
                "payee".to_string(),
                BTreeMap::from([("contains".to_string(), "starbucks".to_string())]),
            )]),
            account: "Expenses:Coffee".to_string(),
        };
        RuleClassifier::new(&[rule]).unwrap()
    }

    #[test]
    fn test_unmatched_classification_hides_account() {
        let result = Classification::unmatched();
        assert_eq!(result.account(), None);
        let result = Classification::matched("Expenses:Coffee");
        assert_eq!(result.account(), Some("Expenses:Coffee"));
    }

    #[test]
    fn test_threshold_gates_confidence() {
        let confident = ThresholdClassifier::new(FixedModel::some("Expenses:Food", 0.93), 0.8);
        assert!(confident.classify("Noodle House", "dinner").matched);

        let hesitant = ThresholdClassifier::new(FixedModel::some("Expenses:Food", 0.42), 0.8);
        assert!(!hesitant.classify("Noodle House", "dinner").matched);

        // Exactly at the threshold counts as matched.
        let boundary = ThresholdClassifier::new(FixedModel::some("Expenses:Food", 0.8), 0.8);
        assert!(boundary.classify("Noodle House", "dinner").matched);
    }

    #[test]
    fn test_model_abstention_is_unmatched() {
        let classifier = ThresholdClassifier::new(FixedModel { result: Ok(None) }, 0.8);
        assert_eq!(
            classifier.classify("Noodle House", "dinner"),
            Classification::unmatched()
        );
    }

    #[test]
    fn test_model_failure_is_unmatched_not_fatal() {
        let _ = env_logger::builder().is_test(true).try_init();
        let classifier = ThresholdClassifier::new(
            FixedModel {
                result: Err(anyhow!("model file missing")),
            },
            0.8,
        );
        assert_eq!(
            classifier.classify("Noodle House", "dinner"),
            Classification::unmatched()
        );
    }

    #[test]
    fn test_chain_prefers_rules_over_model() {
        let chain = ClassifierChain::new(
            Box::new(coffee_rules()),
            Box::new(ThresholdClassifier::new(
                FixedModel::some("Expenses:Food", 0.99),
                0.8,
            )),
        );
        // Rule hit: the confident model never gets a say.
        let result = chain.classify("Starbucks", "Latte");
        assert_eq!(result.account(), Some("Expenses:Coffee"));
    }

    #[test]
    fn test_chain_falls_back_when_no_rule_matches() {
        let chain = ClassifierChain::new(
            Box::new(coffee_rules()),
            Box::new(ThresholdClassifier::new(
                FixedModel::some("Expenses:Food", 0.99),
                0.8,
            )),
        );
        let result = chain.classify("Noodle House", "dinner");
        assert_eq!(result.account(), Some("Expenses:Food"));
    }
}

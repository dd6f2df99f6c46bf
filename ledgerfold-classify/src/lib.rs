//! ledgerfold-classify: deterministic account classification from
//! payee/narration text — an ordered rule matcher with an optional
//! confidence-thresholded scored fallback.

pub mod classifier;
pub mod error;
pub mod predicate;
pub mod rule;

pub use classifier::{
    Classification, Classifier, ClassifierChain, Scored, ScoredModel, ThresholdClassifier,
};
pub use error::RuleError;
pub use predicate::{CompiledPredicate, PredicateKind};
pub use rule::{CompiledRule, Rule, RuleClassifier, RuleField};

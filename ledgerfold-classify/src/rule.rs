//! Ordered account-classification rules: first match in declared order wins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classifier::{Classification, Classifier};
use crate::error::RuleError;
use crate::predicate::{CompiledPredicate, PredicateKind};

/// Transaction text field a condition block applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    Payee,
    Narration,
}

impl RuleField {
    fn from_name(rule: &str, name: &str) -> Result<Self, RuleError> {
        match name {
            "payee" => Ok(Self::Payee),
            "narration" => Ok(Self::Narration),
            _ => Err(RuleError::UnknownField {
                rule: rule.to_string(),
                name: name.to_string(),
            }),
        }
    }
}

/// One rule as configured: field -> predicate name -> target.
///
/// Semantics are OR across fields and AND across the predicates within one
/// field's block. String keys keep the value deserializable from any config
/// format; names are resolved when the rule set compiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub condition: BTreeMap<String, BTreeMap<String, String>>,
    pub account: String,
}

/// A rule compiled for matching: names resolved, targets lower-cased,
/// patterns built.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    name: String,
    account: String,
    blocks: Vec<(RuleField, Vec<CompiledPredicate>)>,
}

impl CompiledRule {
    pub fn compile(rule: &Rule) -> Result<Self, RuleError> {
        let mut blocks = Vec::with_capacity(rule.condition.len());
        for (field_name, predicates) in &rule.condition {
            let field = RuleField::from_name(&rule.name, field_name)?;
            let mut compiled = Vec::with_capacity(predicates.len());
            for (predicate_name, target) in predicates {
                let kind = PredicateKind::from_name(&rule.name, predicate_name)?;
                compiled.push(CompiledPredicate::compile(&rule.name, kind, target)?);
            }
            blocks.push((field, compiled));
        }
        Ok(Self {
            name: rule.name.clone(),
            account: rule.account.clone(),
            blocks,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Check the rule against already lower-cased field values. A field with
    /// an empty value is skipped, not treated as a match; a rule with no
    /// condition blocks never matches.
    pub fn matches(&self, payee: &str, narration: &str) -> bool {
        // or
        for (field, predicates) in &self.blocks {
            let value = match field {
                RuleField::Payee => payee,
                RuleField::Narration => narration,
            };
            if value.is_empty() {
                continue;
            }
            // and
            if predicates.iter().all(|p| p.holds(value)) {
                return true;
            }
        }
        false
    }
}

/// The ordered rule set, compiled once at load and read-only afterwards.
#[derive(Debug)]
pub struct RuleClassifier {
    rules: Vec<CompiledRule>,
}

impl RuleClassifier {
    pub fn new(rules: &[Rule]) -> Result<Self, RuleError> {
        let rules = rules.iter().map(CompiledRule::compile).collect::<Result<_, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Index of the first rule matching the given text, if any.
    pub fn first_match(&self, payee: &str, narration: &str) -> Option<usize> {
        let payee = payee.to_lowercase();
        let narration = narration.to_lowercase();
        self.rules.iter().position(|r| r.matches(&payee, &narration))
    }
}

impl Classifier for RuleClassifier {
    fn classify(&self, payee: &str, narration: &str) -> Classification {
        match self.first_match(payee, narration) {
            Some(idx) => Classification::matched(self.rules[idx].account()),
            None => Classification::unmatched(),
        }
    }
}

//! Closed set of predicate kinds for rule conditions.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Comparison applied to a field value against a target string. Matching is
/// case-insensitive for every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKind {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

impl PredicateKind {
    /// Resolve a predicate by its configured name. Unknown names are a
    /// configuration error, never silently skipped.
    pub fn from_name(rule: &str, name: &str) -> Result<Self, RuleError> {
        match name {
            "equals" => Ok(Self::Equals),
            "contains" => Ok(Self::Contains),
            "starts_with" => Ok(Self::StartsWith),
            "ends_with" => Ok(Self::EndsWith),
            "matches" => Ok(Self::Matches),
            _ => Err(RuleError::UnknownPredicate {
                rule: rule.to_string(),
                name: name.to_string(),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Matches => "matches",
        }
    }
}

/// A predicate bound to its target, ready to evaluate.
///
/// Plain-string targets are lower-cased once here; `matches` keeps the
/// pattern intact and compiles it case-insensitive instead, so character
/// classes survive.
#[derive(Debug, Clone)]
pub enum CompiledPredicate {
    Equals(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Matches(Regex),
}

impl CompiledPredicate {
    pub fn compile(rule: &str, kind: PredicateKind, target: &str) -> Result<Self, RuleError> {
        Ok(match kind {
            PredicateKind::Equals => Self::Equals(target.to_lowercase()),
            PredicateKind::Contains => Self::Contains(target.to_lowercase()),
            PredicateKind::StartsWith => Self::StartsWith(target.to_lowercase()),
            PredicateKind::EndsWith => Self::EndsWith(target.to_lowercase()),
            PredicateKind::Matches => Self::Matches(
                RegexBuilder::new(target)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| RuleError::BadPattern {
                        rule: rule.to_string(),
                        pattern: target.to_string(),
                        source,
                    })?,
            ),
        })
    }

    /// Evaluate against an already lower-cased field value. `Matches` is a
    /// search, not a full match.
    pub fn holds(&self, value: &str) -> bool {
        match self {
            Self::Equals(target) => value == target,
            Self::Contains(target) => value.contains(target),
            Self::StartsWith(target) => value.starts_with(target),
            Self::EndsWith(target) => value.ends_with(target),
            Self::Matches(pattern) => pattern.is_match(value),
        }
    }
}

//! Rule-set configuration failures. All of these are fatal at load time;
//! a rule set that compiled never errors while matching.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule `{rule}`: unknown predicate `{name}`")]
    UnknownPredicate { rule: String, name: String },

    #[error("rule `{rule}`: unknown condition field `{name}`")]
    UnknownField { rule: String, name: String },

    #[error("rule `{rule}`: invalid pattern `{pattern}`: {source}")]
    BadPattern {
        rule: String,
        pattern: String,
        source: regex::Error,
    },
}

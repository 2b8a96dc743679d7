//! Shared small types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator used by the filter engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Field equals value
    Eq,
    /// Field does not equal value
    Ne,
    /// Field greater than value
    Gt,
    /// Field greater than or equal to value
    Gte,
    /// Field less than value
    Lt,
    /// Field less than or equal to value
    Lte,
}

impl FilterOp {
    /// Ordered operators compare integral text forms; Eq/Ne use native equality
    pub fn is_ordered(&self) -> bool {
        !matches!(self, FilterOp::Eq | FilterOp::Ne)
    }

    /// Apply an ordered operator to two integers
    ///
    /// Eq and Ne compare the integers too, for completeness.
    pub fn compare(&self, left: i64, right: i64) -> bool {
        match self {
            FilterOp::Eq => left == right,
            FilterOp::Ne => left != right,
            FilterOp::Gt => left > right,
            FilterOp::Gte => left >= right,
            FilterOp::Lt => left < right,
            FilterOp::Lte => left <= right,
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            FilterOp::Eq => "==",
            FilterOp::Ne => "!=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        };
        f.write_str(symbol)
    }
}

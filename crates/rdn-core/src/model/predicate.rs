use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved prefix marking the categorical working copy of a multi-class predicate.
pub const MULTICLASS_PREFIX: &str = "multiclass_";

/// Role a predicate plays in the dependency network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKind {
    /// Jointly inferred target.
    Query,
    /// Fixed, observed facts.
    Evidence,
    /// Derived from other facts and never sampled.
    Computed,
}

impl PredicateKind {
    pub const fn label(self) -> &'static str {
        match self {
            PredicateKind::Query => "query",
            PredicateKind::Evidence => "evidence",
            PredicateKind::Computed => "computed",
        }
    }
}

impl fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Strips [`MULTICLASS_PREFIX`] from `name` when present.
pub fn base_name(name: &str) -> &str {
    name.strip_prefix(MULTICLASS_PREFIX).unwrap_or(name)
}

/// Returns the prefixed working name for a multi-class predicate.
pub fn multiclass_name(name: &str) -> String {
    format!("{MULTICLASS_PREFIX}{}", base_name(name))
}

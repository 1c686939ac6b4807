//! Ground atoms, predicates, and the probability distributions attached to them.

pub mod distribution;
pub mod example;
pub mod predicate;

pub use distribution::{DistributionSource, NORMALIZATION_TOLERANCE, ProbDistribution};
pub use example::{AtomKey, Example, GroundArgs};
pub use predicate::{MULTICLASS_PREFIX, PredicateKind, base_name, multiclass_name};

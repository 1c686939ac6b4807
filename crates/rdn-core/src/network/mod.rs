//! Dependency network over predicates and the sampling order derived from it.

mod dot;
mod graph;
mod order;

pub use dot::write_dot;
pub use graph::{DependencyGraph, DependencyNode, PredicateId, UNMARKED_ORDER};
pub use order::OrderingScheduler;

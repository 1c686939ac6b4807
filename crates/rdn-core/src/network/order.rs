//! Greedy elimination ordering over target predicates.

use crate::error::ConfigurationError;

use super::graph::DependencyGraph;

/// Orders target predicates so that each one is visited after as many of its query
/// parents as possible.
///
/// The network may be cyclic, so a topological sort does not exist in general. The
/// scheduler repeatedly picks the remaining predicate with the fewest query parents that
/// have not been ranked yet, ranks it, and continues. Ties go to the candidate that comes
/// first in the input order.
#[derive(Debug, Default)]
pub struct OrderingScheduler;

impl OrderingScheduler {
    /// Ranks `targets` and records each rank on the graph node (starting at 1).
    ///
    /// A single target is returned as is, without touching the graph.
    pub fn order<S: AsRef<str>>(
        targets: &[S],
        graph: &mut DependencyGraph,
    ) -> Result<Vec<String>, ConfigurationError> {
        if targets.len() == 1 {
            return Ok(vec![targets[0].as_ref().to_string()]);
        }

        let mut remaining: Vec<&str> = targets.iter().map(AsRef::as_ref).collect();
        let mut ordered = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let mut best = 0;
            let mut fewest = usize::MAX;
            for (position, predicate) in remaining.iter().enumerate() {
                let unmarked = Self::unmarked_parents(predicate, graph)?;
                if unmarked < fewest {
                    fewest = unmarked;
                    best = position;
                }
            }

            let chosen = remaining.remove(best);
            ordered.push(chosen.to_string());
            graph.set_order(chosen, ordered.len() as i32)?;
        }

        Ok(ordered)
    }

    fn unmarked_parents(predicate: &str, graph: &DependencyGraph) -> Result<usize, ConfigurationError> {
        Ok(graph
            .query_parents(predicate)?
            .into_iter()
            .filter(|parent| !graph.node(*parent).is_marked())
            .count())
    }
}

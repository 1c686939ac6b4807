//! Shared fact store holding the evidence the conditional models read.

use std::collections::BTreeSet;

use tracing::{Level, event};

use crate::model::{AtomKey, Example};

/// Positive and negative atoms of one query predicate under the current sampled world.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidencePartition {
    pub positives: Vec<AtomKey>,
    pub negatives: Vec<AtomKey>,
}

impl EvidencePartition {
    pub fn clear(&mut self) {
        self.positives.clear();
        self.negatives.clear();
    }

    pub fn len(&self) -> usize {
        self.positives.len() + self.negatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positives.is_empty() && self.negatives.is_empty()
    }
}

/// One evidence push ahead of a conditional-model call for `target`.
#[derive(Debug, Clone)]
pub struct EvidenceUpdate<'a> {
    /// Predicate about to be inferred. Its own atoms are queries, not facts.
    pub target: &'a str,
    /// True for the first push of a call; `refreshed` then covers every query predicate.
    pub first_pass: bool,
    /// Predicate that was sampled most recently, if any.
    pub previous_target: Option<&'a str>,
    /// Partitions that changed since the previous push.
    pub refreshed: Vec<(&'a str, &'a EvidencePartition)>,
    /// Computed predicates the target's model reads.
    pub computed: &'a [String],
}

/// Mutable store of ground facts.
pub trait FactStore {
    /// Makes the store reflect `update`: positives of every refreshed non-target predicate
    /// become facts, their negatives and all atoms of the target are removed.
    fn assert_evidence(&mut self, update: &EvidenceUpdate<'_>);

    /// Removes `example` (as an atom) from the store.
    fn retract(&mut self, example: &Example);

    fn holds(&self, key: &AtomKey) -> bool;

    /// Snapshot of every fact, for inspection.
    fn facts(&self) -> Vec<AtomKey>;
}

/// In-memory, closed-world fact store.
#[derive(Debug, Default, Clone)]
pub struct MemoryFactStore {
    facts: BTreeSet<AtomKey>,
}

impl MemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fixed fact, e.g. an evidence predicate that is never sampled.
    pub fn insert_fact(&mut self, key: AtomKey) -> bool {
        self.facts.insert(key)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

impl FactStore for MemoryFactStore {
    fn assert_evidence(&mut self, update: &EvidenceUpdate<'_>) {
        for (predicate, partition) in &update.refreshed {
            if *predicate == update.target {
                for key in partition.positives.iter().chain(&partition.negatives) {
                    self.facts.remove(key);
                }
                continue;
            }
            for key in &partition.negatives {
                self.facts.remove(key);
            }
            for key in &partition.positives {
                self.facts.insert(key.clone());
            }
        }
        event!(
            target: "rdn_core::facts",
            Level::TRACE,
            target_predicate = update.target,
            first_pass = update.first_pass,
            previous = update.previous_target.unwrap_or(""),
            refreshed = update.refreshed.len(),
            facts = self.facts.len()
        );
    }

    fn retract(&mut self, example: &Example) {
        self.facts.remove(&example.key());
    }

    fn holds(&self, key: &AtomKey) -> bool {
        self.facts.contains(key)
    }

    fn facts(&self) -> Vec<AtomKey> {
        self.facts.iter().cloned().collect()
    }
}

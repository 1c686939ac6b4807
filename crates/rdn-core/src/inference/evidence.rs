//! The sampled world and its propagation into the fact store.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ConfigurationError, InferenceError};
use crate::facts::{EvidencePartition, EvidenceUpdate, FactStore};
use crate::model::{Example, base_name};

use super::multiclass::MulticlassRegistry;

/// Positive/negative partition of every query predicate under the current samples, plus
/// what the fact store has not seen yet.
#[derive(Debug, Clone, Default)]
pub struct SampleState {
    partitions: BTreeMap<String, EvidencePartition>,
    dirty: BTreeSet<String>,
    withheld: Option<String>,
    last_updated: Option<String>,
    pushed: bool,
}

impl SampleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition(&self, predicate: &str) -> Option<&EvidencePartition> {
        self.partitions.get(predicate)
    }

    /// Predicate refreshed most recently.
    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }
}

/// Keeps a [`SampleState`] consistent with the examples' sampled values and pushes it to
/// a [`FactStore`] before each model call.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceManager<'a> {
    multiclass: &'a MulticlassRegistry,
}

impl<'a> EvidenceManager<'a> {
    pub fn new(multiclass: &'a MulticlassRegistry) -> Self {
        Self { multiclass }
    }

    /// Rebuilds `target`'s partition from the sampled values of `examples`.
    ///
    /// Multi-class examples contribute one atom per class; only the sampled class is
    /// positive.
    pub fn refresh(
        &self,
        state: &mut SampleState,
        target: &str,
        examples: &[Example],
    ) -> Result<(), InferenceError> {
        if examples.is_empty() {
            return Err(ConfigurationError::EmptyExamples {
                predicate: target.to_string(),
            }
            .into());
        }

        let partition = state.partitions.entry(target.to_string()).or_default();
        partition.clear();
        let multiclass = self.multiclass.is_multiclass(target);

        for example in examples {
            if example.base_predicate() != base_name(target) {
                return Err(ConfigurationError::PredicateMismatch {
                    target: target.to_string(),
                    found: example.predicate().to_string(),
                }
                .into());
            }
            if multiclass {
                for sub in self.multiclass.expand(example) {
                    if sub.sampled_value() == 1 {
                        partition.positives.push(sub.key());
                    } else {
                        partition.negatives.push(sub.key());
                    }
                }
            } else if example.sampled_value() == 1 {
                partition.positives.push(example.key());
            } else {
                partition.negatives.push(example.key());
            }
        }

        state.dirty.insert(target.to_string());
        state.last_updated = Some(target.to_string());
        Ok(())
    }

    /// Pushes the evidence `target`'s model needs into `store`.
    ///
    /// The first push of a call covers every partition. Later pushes cover the predicates
    /// refreshed since, the predicate withheld by the previous push, and `target` itself,
    /// whose atoms are withheld from the store while it is inferred.
    pub fn materialize(
        &self,
        state: &mut SampleState,
        target: &str,
        computed: &[String],
        store: &mut dyn FactStore,
    ) {
        let first_pass = !state.pushed;
        let names: BTreeSet<&str> = if first_pass {
            state.partitions.keys().map(String::as_str).collect()
        } else {
            state
                .dirty
                .iter()
                .map(String::as_str)
                .chain(state.withheld.as_deref())
                .chain(std::iter::once(target))
                .collect()
        };

        let refreshed = names
            .into_iter()
            .filter_map(|name| state.partitions.get_key_value(name))
            .map(|(name, partition)| (name.as_str(), partition))
            .collect();

        let update = EvidenceUpdate {
            target,
            first_pass,
            previous_target: state.withheld.as_deref(),
            refreshed,
            computed,
        };
        store.assert_evidence(&update);

        state.dirty.clear();
        state.withheld = Some(target.to_string());
        state.pushed = true;
    }
}

//! Turning retained samples into probabilities and handing them back to the caller.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{ConsistencyError, InferenceError};
use crate::model::{AtomKey, DistributionSource, Example, ProbDistribution};

use super::multiclass::MulticlassRegistry;

/// Per-target, per-example, per-class tallies of retained sweeps.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    counts: BTreeMap<String, Vec<Vec<f64>>>,
    sweeps: usize,
}

impl Counters {
    pub fn new(working: &BTreeMap<String, Vec<Example>>, multiclass: &MulticlassRegistry) -> Self {
        let counts = working
            .iter()
            .map(|(target, examples)| {
                let classes = multiclass.class_count(target);
                (target.clone(), vec![vec![0.0; classes]; examples.len()])
            })
            .collect();
        Self { counts, sweeps: 0 }
    }

    /// Adds the current sampled value of every working example.
    pub fn record(&mut self, working: &BTreeMap<String, Vec<Example>>) -> Result<(), InferenceError> {
        for (target, examples) in working {
            let Some(rows) = self.counts.get_mut(target) else {
                continue;
            };
            for (row, example) in rows.iter_mut().zip(examples) {
                let value = example.sampled_value();
                let classes = row.len();
                let slot = row.get_mut(value).ok_or_else(|| ConsistencyError::ClassOutOfRange {
                    key: example.key(),
                    value,
                    classes,
                })?;
                *slot += 1.0;
            }
        }
        self.sweeps += 1;
        Ok(())
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn counts(&self, target: &str) -> Option<&[Vec<f64>]> {
        self.counts.get(target).map(Vec::as_slice)
    }
}

/// Produces final distributions and writes them onto the caller's examples.
#[derive(Debug, Clone, Copy)]
pub struct ProbabilityAggregator<'a> {
    multiclass: &'a MulticlassRegistry,
}

impl<'a> ProbabilityAggregator<'a> {
    pub fn new(multiclass: &'a MulticlassRegistry) -> Self {
        Self { multiclass }
    }

    /// Replaces the distribution of every sampled target's working examples with the
    /// relative frequencies in `counters`.
    ///
    /// Binary atoms get `count[1] / (count[0] + count[1])`; multi-class atoms get their
    /// count vector normalized by the total.
    pub fn apply_counts(
        &self,
        working: &mut BTreeMap<String, Vec<Example>>,
        counters: &Counters,
        sampled: &BTreeSet<String>,
    ) {
        for target in sampled {
            let (Some(examples), Some(rows)) = (working.get_mut(target), counters.counts(target))
            else {
                continue;
            };
            let multiclass = self.multiclass.is_multiclass(target);
            for (example, counts) in examples.iter_mut().zip(rows) {
                let distribution = if multiclass {
                    ProbDistribution::from_counts(counts, DistributionSource::Frequency)
                } else {
                    let total = counts[0] + counts[1];
                    let p = if total > 0.0 { counts[1] / total } else { 0.0 };
                    ProbDistribution::Single(p)
                };
                example.set_probability(distribution);
            }
        }
    }

    /// Copies working distributions onto `originals`.
    ///
    /// Binary targets align by position. Multi-class targets align by collapse key: a
    /// categorical original receives the full vector, a per-class view receives the
    /// probability of its class. Nothing is written unless every original resolves.
    pub fn write_back(
        &self,
        originals: &mut BTreeMap<String, Vec<Example>>,
        working: &BTreeMap<String, Vec<Example>>,
    ) -> Result<(), InferenceError> {
        let mut resolved: Vec<(&str, usize, ProbDistribution)> = Vec::new();

        for (target, work) in working {
            let Some(targets) = originals.get(target) else {
                continue;
            };

            if self.multiclass.is_multiclass(target) {
                let by_key: HashMap<AtomKey, &ProbDistribution> = work
                    .iter()
                    .filter_map(|example| {
                        example
                            .probability()
                            .map(|dist| (self.multiclass.collapse_key(example), dist))
                    })
                    .collect();
                for (index, original) in targets.iter().enumerate() {
                    let distribution = by_key
                        .get(&self.multiclass.collapse_key(original))
                        .ok_or_else(|| ConsistencyError::UnseenMulticlassKey {
                            key: original.key(),
                        })?;
                    let value = match original.class() {
                        Some(class)
                            if class < distribution.class_count()
                                && class < self.multiclass.class_count(target) =>
                        {
                            ProbDistribution::Single(distribution.value(class))
                        }
                        // Sampling only ever produces classes below the registered count.
                        Some(_) => {
                            return Err(ConsistencyError::UnseenMulticlassKey {
                                key: original.key(),
                            }
                            .into());
                        }
                        None => (*distribution).clone(),
                    };
                    resolved.push((target.as_str(), index, value));
                }
            } else {
                if targets.len() != work.len() {
                    return Err(ConsistencyError::ExampleCountMismatch {
                        predicate: target.clone(),
                        original: targets.len(),
                        working: work.len(),
                    }
                    .into());
                }
                for (index, example) in work.iter().enumerate() {
                    if let Some(distribution) = example.probability() {
                        resolved.push((target.as_str(), index, distribution.clone()));
                    }
                }
            }
        }

        for (target, index, distribution) in resolved {
            if let Some(example) = originals.get_mut(target).and_then(|list| list.get_mut(index)) {
                example.set_probability(distribution);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MulticlassRegistry {
        let mut registry = MulticlassRegistry::new();
        registry.register("color", 3);
        registry
    }

    #[test]
    fn binary_counts_become_frequency_of_true() {
        let registry = registry();
        let mut working = BTreeMap::from([(
            "smokes".to_string(),
            vec![Example::new("smokes", ["ann"]).with_sampled_value(1)],
        )]);
        let mut counters = Counters::new(&working, &registry);
        counters.record(&working).unwrap();
        counters.record(&working).unwrap();
        working.get_mut("smokes").unwrap()[0].set_sampled_value(0);
        counters.record(&working).unwrap();
        counters.record(&working).unwrap();
        assert_eq!(counters.sweeps(), 4);

        let sampled = BTreeSet::from(["smokes".to_string()]);
        ProbabilityAggregator::new(&registry).apply_counts(&mut working, &counters, &sampled);
        assert_eq!(
            working["smokes"][0].probability(),
            Some(&ProbDistribution::Single(0.5))
        );
    }

    #[test]
    fn multiclass_write_back_uses_collapse_key() {
        let registry = registry();
        let mut working_example = Example::new("multiclass_color", ["ball"]);
        working_example.set_probability(ProbDistribution::Vector(vec![0.25, 0.25, 0.5]));
        let working = BTreeMap::from([("color".to_string(), vec![working_example])]);
        let mut originals = BTreeMap::from([(
            "color".to_string(),
            vec![
                Example::new("color", ["ball"]),
                Example::new("color", ["ball"]).with_class(2),
            ],
        )]);

        ProbabilityAggregator::new(&registry)
            .write_back(&mut originals, &working)
            .unwrap();
        assert_eq!(
            originals["color"][0].probability(),
            Some(&ProbDistribution::Vector(vec![0.25, 0.25, 0.5]))
        );
        assert_eq!(
            originals["color"][1].probability(),
            Some(&ProbDistribution::Single(0.5))
        );
    }

    #[test]
    fn unseen_multiclass_key_is_fatal() {
        let registry = registry();
        let mut working_example = Example::new("multiclass_color", ["ball"]);
        working_example.set_probability(ProbDistribution::Vector(vec![0.2, 0.3, 0.5]));
        let working = BTreeMap::from([("color".to_string(), vec![working_example])]);
        let mut originals = BTreeMap::from([(
            "color".to_string(),
            vec![Example::new("color", ["cube"])],
        )]);
        let err = ProbabilityAggregator::new(&registry)
            .write_back(&mut originals, &working)
            .unwrap_err();
        assert!(matches!(
            err,
            InferenceError::Consistency(ConsistencyError::UnseenMulticlassKey { .. })
        ));
        assert!(originals["color"][0].probability().is_none());
    }

    #[test]
    fn class_view_beyond_registered_classes_is_unseen() {
        let registry = registry();
        let mut working_example = Example::new("multiclass_color", ["ball"]);
        working_example.set_probability(ProbDistribution::Vector(vec![0.1, 0.2, 0.7]));
        let working = BTreeMap::from([("color".to_string(), vec![working_example])]);
        let mut originals = BTreeMap::from([(
            "color".to_string(),
            vec![
                Example::new("color", ["ball"]).with_class(2),
                Example::new("color", ["ball"]).with_class(5),
            ],
        )]);
        let err = ProbabilityAggregator::new(&registry)
            .write_back(&mut originals, &working)
            .unwrap_err();
        assert!(matches!(
            err,
            InferenceError::Consistency(ConsistencyError::UnseenMulticlassKey { ref key })
                if key.class == Some(5)
        ));
        assert!(originals["color"].iter().all(|ex| ex.probability().is_none()));
    }

    #[test]
    fn binary_write_back_requires_matching_lengths() {
        let registry = registry();
        let working = BTreeMap::from([("smokes".to_string(), vec![Example::new("smokes", ["ann"])])]);
        let mut originals = BTreeMap::from([("smokes".to_string(), vec![])]);
        assert!(
            ProbabilityAggregator::new(&registry)
                .write_back(&mut originals, &working)
                .is_err()
        );
    }
}

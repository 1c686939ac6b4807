//! Categorical predicates expanded into per-class binary atoms.
//!
//! A `k`-class atom `color(ball)` is sampled through a single working copy
//! `multiclass_color(ball)` whose sampled value is a class index. The evidence it
//! contributes is the `k` binary atoms `color(ball)#i`, of which exactly the one with
//! `i == sampled value` is true.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::error::{ConsistencyError, InferenceError};
use crate::model::{AtomKey, Example, ProbDistribution, base_name, multiclass_name};

const BINARY_CLASSES: usize = 2;

/// Which predicates are categorical and how many classes they have.
#[derive(Debug, Clone, Default)]
pub struct MulticlassRegistry {
    classes: HashMap<String, usize>,
}

impl MulticlassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `predicate` to have `classes` values. Two classes keep it binary.
    pub fn register(&mut self, predicate: &str, classes: usize) {
        let name = base_name(predicate).to_string();
        if classes > BINARY_CLASSES {
            self.classes.insert(name, classes);
        } else {
            self.classes.remove(&name);
        }
    }

    pub fn is_multiclass(&self, predicate: &str) -> bool {
        self.classes.contains_key(base_name(predicate))
    }

    pub fn class_count(&self, predicate: &str) -> usize {
        self.classes
            .get(base_name(predicate))
            .copied()
            .unwrap_or(BINARY_CLASSES)
    }

    /// The `k` per-class binary atoms of a categorical example. Sub-example `i` is true
    /// iff the example's sampled value is `i`.
    pub fn expand(&self, example: &Example) -> Vec<Example> {
        let base = example.base_predicate().to_string();
        (0..self.class_count(&base))
            .map(|class| {
                let mut sub = example.renamed(base.clone(), Some(class));
                sub.set_sampled_value(usize::from(example.sampled_value() == class));
                if let Some(distribution) = example.probability() {
                    sub.set_probability(ProbDistribution::Single(distribution.value(class)));
                }
                sub
            })
            .collect()
    }

    /// Identity shared by a categorical atom and all of its per-class views.
    pub fn collapse_key(&self, example: &Example) -> AtomKey {
        AtomKey::new(example.base_predicate(), example.args().to_vec(), None)
    }

    /// Categorical working copy of `example`. Examples already carrying the multi-class
    /// prefix are copied unchanged.
    pub fn morph(&self, example: &Example) -> Example {
        if example.is_multiclass_working() {
            return example.clone();
        }
        example.renamed(multiclass_name(example.predicate()), None)
    }

    /// Working copies for a multi-class target, keeping only the first example per
    /// collapse key.
    pub fn working_examples(&self, examples: &[Example]) -> Vec<Example> {
        let mut seen = HashSet::new();
        examples
            .iter()
            .filter(|example| seen.insert(self.collapse_key(example)))
            .map(|example| self.morph(example))
            .collect()
    }

    /// Draws a class for `example` from its current distribution.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        example: &Example,
        rng: &mut R,
    ) -> Result<usize, InferenceError> {
        let distribution = example
            .probability()
            .ok_or_else(|| ConsistencyError::MissingDistribution { key: example.key() })?;
        let value = distribution.sample(rng)?;
        let classes = self.class_count(example.predicate());
        if value >= classes {
            return Err(ConsistencyError::ClassOutOfRange {
                key: example.key(),
                value,
                classes,
            }
            .into());
        }
        Ok(value)
    }
}

//! Conditional models and the strategies that invoke them.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ConfigurationError, ConsistencyError, InferenceError};
use crate::facts::FactStore;
use crate::model::{Example, ProbDistribution, base_name};

/// Learned model of one predicate given the facts currently in the store.
pub trait ConditionalModel {
    /// Returns one distribution per example, in the same order.
    fn infer(
        &self,
        examples: &[Example],
        facts: &dyn FactStore,
    ) -> Result<Vec<ProbDistribution>, InferenceError>;

    /// Caps the size of the model (e.g. number of boosted trees) used at inference time.
    fn set_max_complexity(&mut self, _limit: usize) {}
}

/// Conditional models keyed by predicate name.
#[derive(Default)]
pub struct JointModel {
    models: BTreeMap<String, Box<dyn ConditionalModel>>,
}

impl JointModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, predicate: &str, model: Box<dyn ConditionalModel>) {
        self.models.insert(base_name(predicate).to_string(), model);
    }

    pub fn get(&self, predicate: &str) -> Result<&dyn ConditionalModel, ConfigurationError> {
        self.models
            .get(base_name(predicate))
            .map(|model| model.as_ref())
            .ok_or_else(|| ConfigurationError::MissingModel {
                predicate: predicate.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn set_max_complexity(&mut self, limit: usize) {
        for model in self.models.values_mut() {
            model.set_max_complexity(limit);
        }
    }
}

impl fmt::Debug for JointModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JointModel")
            .field("predicates", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Inference procedure that looks at the whole joint model instead of a single
/// predicate's conditional model.
pub trait JointInference {
    fn infer(
        &self,
        target: &str,
        examples: &[Example],
        models: &JointModel,
        facts: &dyn FactStore,
    ) -> Result<Vec<ProbDistribution>, InferenceError>;
}

/// How a target's distributions are obtained during sampling.
#[derive(Default)]
pub enum InferenceStrategy {
    /// Call the target's own conditional model.
    #[default]
    ExactConditional,
    /// Delegate to an alternative joint-inference procedure.
    AlternativeJoint(Box<dyn JointInference>),
}

impl InferenceStrategy {
    pub fn infer(
        &self,
        target: &str,
        examples: &[Example],
        models: &JointModel,
        facts: &dyn FactStore,
    ) -> Result<Vec<ProbDistribution>, InferenceError> {
        let distributions = match self {
            InferenceStrategy::ExactConditional => models.get(target)?.infer(examples, facts)?,
            InferenceStrategy::AlternativeJoint(joint) => {
                joint.infer(target, examples, models, facts)?
            }
        };
        if distributions.len() != examples.len() {
            return Err(ConsistencyError::DistributionCountMismatch {
                predicate: target.to_string(),
                expected: examples.len(),
                found: distributions.len(),
            }
            .into());
        }
        Ok(distributions)
    }

    pub fn label(&self) -> &'static str {
        match self {
            InferenceStrategy::ExactConditional => "exact_conditional",
            InferenceStrategy::AlternativeJoint(_) => "alternative_joint",
        }
    }
}

impl fmt::Debug for InferenceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

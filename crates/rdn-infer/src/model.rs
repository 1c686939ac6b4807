//! Additive conditional models built from configuration.
//!
//! Each query predicate scores an example as `bias + Σ weights` over the terms whose parent
//! atom currently holds in the fact store. Binary predicates turn their single score into a
//! probability through the logistic function; `k`-class predicates use a softmax.

use rdn_core::model::DistributionSource;
use rdn_core::{
    AtomKey, ConditionalModel, DependencyGraph, Example, FactStore, InferenceError, JointModel,
    MulticlassRegistry, ProbDistribution,
};
use thiserror::Error;

use crate::config::{InferenceConfig, ModelConfig, TermConfig};

/// One argument of a parent atom.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ArgTemplate {
    /// Argument `i` of the example being scored.
    Bound(usize),
    Constant(String),
}

impl ArgTemplate {
    fn parse(raw: &str) -> Result<Self, ModelError> {
        match raw.strip_prefix('$') {
            Some(index) => index
                .parse()
                .map(ArgTemplate::Bound)
                .map_err(|_| ModelError::Placeholder {
                    placeholder: raw.to_string(),
                }),
            None => Ok(ArgTemplate::Constant(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
struct Term {
    parent: String,
    args: Vec<ArgTemplate>,
    class: Option<usize>,
    weights: Vec<f64>,
}

impl Term {
    fn from_config(config: &TermConfig) -> Result<Self, ModelError> {
        Ok(Self {
            parent: config.parent.clone(),
            args: config
                .args
                .iter()
                .map(|arg| ArgTemplate::parse(arg))
                .collect::<Result<_, _>>()?,
            class: config.class,
            weights: config.weights.clone(),
        })
    }

    fn ground(&self, predicate: &str, example: &Example) -> Result<AtomKey, InferenceError> {
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                ArgTemplate::Bound(index) => {
                    example
                        .args()
                        .get(*index)
                        .cloned()
                        .ok_or_else(|| InferenceError::Model {
                            predicate: predicate.to_string(),
                            message: format!(
                                "term on '{}' binds ${index} but {example} has {} argument(s)",
                                self.parent,
                                example.args().len()
                            ),
                        })
                }
                ArgTemplate::Constant(value) => Ok(value.clone()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AtomKey::new(self.parent.clone(), args, self.class))
    }
}

/// Logistic (binary) or softmax (multi-class) scorer over parent facts.
#[derive(Debug, Clone)]
pub struct AdditiveModel {
    predicate: String,
    bias: Vec<f64>,
    terms: Vec<Term>,
    max_terms: usize,
}

impl AdditiveModel {
    pub fn from_config(predicate: &str, config: &ModelConfig) -> Result<Self, ModelError> {
        if config.bias.is_empty() {
            return Err(ModelError::EmptyBias {
                predicate: predicate.to_string(),
            });
        }
        let terms = config
            .terms
            .iter()
            .map(Term::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(term) = terms.iter().find(|t| t.weights.len() != config.bias.len()) {
            return Err(ModelError::Width {
                predicate: predicate.to_string(),
                parent: term.parent.clone(),
                expected: config.bias.len(),
                found: term.weights.len(),
            });
        }
        Ok(Self {
            predicate: predicate.to_string(),
            bias: config.bias.clone(),
            max_terms: terms.len(),
            terms,
        })
    }

    /// Terms currently in use after the complexity cap.
    pub fn active_terms(&self) -> usize {
        self.max_terms.min(self.terms.len())
    }

    fn scores(&self, example: &Example, facts: &dyn FactStore) -> Result<Vec<f64>, InferenceError> {
        let mut scores = self.bias.clone();
        for term in &self.terms[..self.active_terms()] {
            if facts.holds(&term.ground(&self.predicate, example)?) {
                for (score, weight) in scores.iter_mut().zip(&term.weights) {
                    *score += weight;
                }
            }
        }
        Ok(scores)
    }
}

impl ConditionalModel for AdditiveModel {
    fn infer(
        &self,
        examples: &[Example],
        facts: &dyn FactStore,
    ) -> Result<Vec<ProbDistribution>, InferenceError> {
        examples
            .iter()
            .map(|example| {
                let scores = self.scores(example, facts)?;
                Ok(match scores.as_slice() {
                    [logit] => ProbDistribution::from_regression(*logit),
                    _ => ProbDistribution::from_counts(&scores, DistributionSource::ModelOutput),
                })
            })
            .collect()
    }

    fn set_max_complexity(&mut self, limit: usize) {
        self.max_terms = limit;
    }
}

/// Everything the sampler needs, assembled from an [`InferenceConfig`].
#[derive(Debug)]
pub struct Network {
    pub models: JointModel,
    pub graph: DependencyGraph,
    pub multiclass: MulticlassRegistry,
}

impl Network {
    pub fn from_config(config: &InferenceConfig) -> Result<Self, ModelError> {
        let mut models = JointModel::new();
        let mut graph = DependencyGraph::new();
        let mut multiclass = MulticlassRegistry::new();

        for predicate in &config.predicates {
            graph.add_predicate(&predicate.name, predicate.kind);
            multiclass.register(&predicate.name, predicate.classes);
        }

        for predicate in &config.predicates {
            let Some(model) = predicate.model.as_ref() else {
                continue;
            };
            for term in &model.terms {
                // Undeclared parents join the network as evidence.
                graph
                    .add_dependency(&predicate.name, &term.parent)
                    .map_err(|source| ModelError::Graph {
                        predicate: predicate.name.clone(),
                        source,
                    })?;
            }
            models.insert(
                &predicate.name,
                Box::new(AdditiveModel::from_config(&predicate.name, model)?),
            );
        }

        Ok(Self {
            models,
            graph,
            multiclass,
        })
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model for '{predicate}' has no bias")]
    EmptyBias { predicate: String },
    #[error("term on '{parent}' in model for '{predicate}' has {found} weight(s), expected {expected}")]
    Width {
        predicate: String,
        parent: String,
        expected: usize,
        found: usize,
    },
    #[error("invalid argument placeholder '{placeholder}'")]
    Placeholder { placeholder: String },
    #[error("cannot wire '{predicate}' into the network: {source}")]
    Graph {
        predicate: String,
        #[source]
        source: rdn_core::ConfigurationError,
    },
}

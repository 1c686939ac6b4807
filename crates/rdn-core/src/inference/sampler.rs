//! Gibbs sampling over the joint model.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{Level, event};

use crate::error::{ConfigurationError, InferenceError};
use crate::facts::{FactStore, MemoryFactStore};
use crate::model::{Example, PredicateKind, ProbDistribution};
use crate::network::{DependencyGraph, OrderingScheduler};

use super::aggregate::{Counters, ProbabilityAggregator};
use super::evidence::{EvidenceManager, SampleState};
use super::multiclass::MulticlassRegistry;
use super::oracle::{InferenceStrategy, JointModel};

/// Sweeps discarded before counting starts.
pub const DEFAULT_BURN_IN: usize = 200;
/// Sweeps whose samples are counted.
pub const DEFAULT_SAMPLES: usize = 1000;

const PROGRESS_INTERVAL: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub burn_in: usize,
    pub samples: usize,
    pub seed: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            burn_in: DEFAULT_BURN_IN,
            samples: DEFAULT_SAMPLES,
            seed: 0,
        }
    }
}

/// Batch inference of marginal probabilities.
pub trait MarginalInference {
    /// Sets the probability of every example in `examples`, keyed by target predicate.
    fn compute_joint_marginals(
        &mut self,
        examples: &mut BTreeMap<String, Vec<Example>>,
    ) -> Result<(), InferenceError>;

    /// Probability of a single example, for engines that can answer one at a time.
    fn example_probability(&self, example: &Example) -> Result<ProbDistribution, InferenceError>;
}

/// Computes marginals of interdependent query predicates with a Gibbs chain.
///
/// Targets are visited in the order produced by [`OrderingScheduler`]. A target whose
/// model reads no query predicate (or a call with a single target) is answered with one
/// model call. If any target does read a query predicate, the sampler runs
/// `burn_in + samples` sweeps, re-inferring and re-sampling those targets each sweep with
/// the evidence of the sweep so far, and reports the relative frequencies of the retained
/// sweeps.
pub struct JointModelSampler<F: FactStore = MemoryFactStore> {
    models: JointModel,
    graph: DependencyGraph,
    multiclass: MulticlassRegistry,
    strategy: InferenceStrategy,
    store: F,
    config: SamplerConfig,
    rng: SmallRng,
    sampled: BTreeSet<String>,
}

impl<F: FactStore> JointModelSampler<F> {
    pub fn new(models: JointModel, graph: DependencyGraph, store: F) -> Self {
        let config = SamplerConfig::default();
        Self {
            models,
            graph,
            multiclass: MulticlassRegistry::new(),
            strategy: InferenceStrategy::default(),
            store,
            rng: SmallRng::seed_from_u64(config.seed),
            config,
            sampled: BTreeSet::new(),
        }
    }

    /// Replaces the configuration and reseeds the random source.
    pub fn with_config(mut self, config: SamplerConfig) -> Self {
        self.rng = SmallRng::seed_from_u64(config.seed);
        self.config = config;
        self
    }

    pub fn with_multiclass(mut self, multiclass: MulticlassRegistry) -> Self {
        self.multiclass = multiclass;
        self
    }

    pub fn with_strategy(mut self, strategy: InferenceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn multiclass(&self) -> &MulticlassRegistry {
        &self.multiclass
    }

    /// Targets that went through the Gibbs chain in the last successful call. The others
    /// carry the exact output of their model.
    pub fn sampled_predicates(&self) -> &BTreeSet<String> {
        &self.sampled
    }

    pub fn store(&self) -> &F {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut F {
        &mut self.store
    }

    pub fn into_store(self) -> F {
        self.store
    }

    /// Forwards a complexity cap to every conditional model.
    pub fn set_max_model_complexity(&mut self, limit: usize) {
        self.models.set_max_complexity(limit);
    }

    fn working_examples(
        &self,
        originals: &BTreeMap<String, Vec<Example>>,
    ) -> BTreeMap<String, Vec<Example>> {
        originals
            .iter()
            .map(|(target, examples)| {
                let working = if self.multiclass.is_multiclass(target) {
                    self.multiclass.working_examples(examples)
                } else {
                    examples.clone()
                };
                (target.clone(), working)
            })
            .collect()
    }

    fn retract_all(
        &mut self,
        originals: &BTreeMap<String, Vec<Example>>,
        working: &BTreeMap<String, Vec<Example>>,
    ) {
        for example in originals.values().chain(working.values()).flatten() {
            self.store.retract(example);
            if self.multiclass.is_multiclass(example.predicate()) {
                for sub in self.multiclass.expand(example) {
                    self.store.retract(&sub);
                }
            }
        }
    }

    fn sample_example_probabilities(
        &mut self,
        working: &mut BTreeMap<String, Vec<Example>>,
        order: &[String],
    ) -> Result<BTreeSet<String>, InferenceError> {
        let Self {
            models,
            graph,
            multiclass,
            strategy,
            store,
            config,
            rng,
            ..
        } = self;
        let multiclass = &*multiclass;
        let evidence = EvidenceManager::new(multiclass);
        let mut state = SampleState::new();
        let mut computed: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (target, examples) in working.iter_mut() {
            if examples.is_empty() {
                continue;
            }
            let classes = multiclass.class_count(target);
            for example in examples.iter_mut() {
                example.set_sampled_value(rng.gen_range(0..classes));
            }
            evidence.refresh(&mut state, target, examples)?;
            if graph.id(target).is_some() {
                let names = graph
                    .ancestors_of_type(target, PredicateKind::Computed)?
                    .into_iter()
                    .map(|ancestor| graph.node(ancestor).name().to_string())
                    .collect();
                computed.insert(target.clone(), names);
            }
        }

        let joint = working.len() > 1;
        let mut sampled = BTreeSet::new();
        for target in order {
            let Some(examples) = working.get_mut(target) else {
                continue;
            };
            if joint && graph.has_query_parents(target)? {
                event!(
                    target: "rdn_core::sampler",
                    Level::INFO,
                    predicate = %target,
                    "need sampling"
                );
                sampled.insert(target.clone());
                continue;
            }
            if examples.is_empty() {
                tracing::warn!(predicate = %target, "no examples; skipping");
                continue;
            }
            evidence.materialize(
                &mut state,
                target,
                computed_for(&computed, target),
                &mut *store,
            );
            let distributions = strategy.infer(target, examples, models, &*store)?;
            assign(examples, distributions);
        }

        if sampled.is_empty() {
            event!(
                target: "rdn_core::sampler",
                Level::INFO,
                "no Gibbs sampling needed during inference"
            );
            return Ok(sampled);
        }

        if let Some((target, _)) = working.iter().find(|(_, examples)| examples.is_empty()) {
            return Err(ConfigurationError::EmptyExamples {
                predicate: target.clone(),
            }
            .into());
        }

        let mut counters = Counters::new(working, multiclass);
        let burn_in = config.burn_in as i64;
        let samples = config.samples as i64;

        for sweep in -burn_in..samples {
            for target in order {
                let Some(examples) = working.get_mut(target) else {
                    continue;
                };
                // Targets without query parents keep the distribution computed above; only
                // their sample changes, since dependents need a concrete value.
                if sampled.contains(target) {
                    evidence.materialize(
                        &mut state,
                        target,
                        computed_for(&computed, target),
                        &mut *store,
                    );
                    let distributions = strategy.infer(target, examples, models, &*store)?;
                    assign(examples, distributions);
                }
                for example in examples.iter_mut() {
                    let value = multiclass.sample(example, &mut *rng)?;
                    example.set_sampled_value(value);
                }
                evidence.refresh(&mut state, target, examples)?;
            }

            if sweep % PROGRESS_INTERVAL == 0 && sweep != 0 {
                event!(target: "rdn_core::sampler", Level::DEBUG, sweep, "sample");
            }
            if sweep >= 0 {
                counters.record(working)?;
            }
        }

        ProbabilityAggregator::new(multiclass).apply_counts(working, &counters, &sampled);
        event!(
            target: "rdn_core::sampler",
            Level::INFO,
            sampled = sampled.len(),
            retained = counters.sweeps(),
            burn_in = config.burn_in,
            "gibbs sampling complete"
        );
        Ok(sampled)
    }
}

impl<F: FactStore> MarginalInference for JointModelSampler<F> {
    fn compute_joint_marginals(
        &mut self,
        examples: &mut BTreeMap<String, Vec<Example>>,
    ) -> Result<(), InferenceError> {
        self.sampled.clear();
        if examples.is_empty() {
            return Ok(());
        }

        let targets: Vec<&str> = examples.keys().map(String::as_str).collect();
        self.graph.reset_order();
        let order = OrderingScheduler::order(&targets, &mut self.graph)?;
        event!(
            target: "rdn_core::sampler",
            Level::INFO,
            targets = targets.len(),
            order = ?order,
            strategy = self.strategy.label(),
            "computing joint marginals"
        );

        let mut working = self.working_examples(examples);
        let outcome = self.sample_example_probabilities(&mut working, &order);
        self.retract_all(examples, &working);
        let sampled = outcome?;

        ProbabilityAggregator::new(&self.multiclass).write_back(examples, &working)?;
        self.sampled = sampled;
        Ok(())
    }

    fn example_probability(&self, _example: &Example) -> Result<ProbDistribution, InferenceError> {
        Err(InferenceError::Unsupported {
            operation: "single-example probability from a joint sampler",
        })
    }
}

fn computed_for<'a>(computed: &'a BTreeMap<String, Vec<String>>, target: &str) -> &'a [String] {
    computed.get(target).map(Vec::as_slice).unwrap_or(&[])
}

fn assign(examples: &mut [Example], distributions: Vec<ProbDistribution>) {
    for (example, distribution) in examples.iter_mut().zip(distributions) {
        example.set_probability(distribution);
    }
}

//! Joint inference over interdependent query predicates.
//!
//! This module is composed of:
//! - `oracle`: the conditional-model contract and the strategy used to invoke it.
//! - `multiclass`: expansion of categorical predicates into per-class binary atoms.
//! - `evidence`: the sampled world and how it reaches the fact store.
//! - `aggregate`: counting retained sweeps and writing probabilities back.
//! - `sampler`: the Gibbs-sampling control loop tying the pieces together.

mod aggregate;
mod evidence;
mod multiclass;
mod oracle;
mod sampler;

pub use aggregate::{Counters, ProbabilityAggregator};
pub use evidence::{EvidenceManager, SampleState};
pub use multiclass::MulticlassRegistry;
pub use oracle::{ConditionalModel, InferenceStrategy, JointInference, JointModel};
pub use sampler::{
    DEFAULT_BURN_IN, DEFAULT_SAMPLES, JointModelSampler, MarginalInference, SamplerConfig,
};

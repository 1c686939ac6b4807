//! Joint Gibbs-sampling inference for relational dependency networks.

pub mod error;
pub mod facts;
pub mod inference;
pub mod model;
pub mod network;

pub use error::{ConfigurationError, ConsistencyError, ErrorKind, InferenceError};
pub use facts::{EvidencePartition, EvidenceUpdate, FactStore, MemoryFactStore};
pub use inference::{
    ConditionalModel, InferenceStrategy, JointInference, JointModel, JointModelSampler,
    MarginalInference, MulticlassRegistry, SamplerConfig,
};
pub use model::{AtomKey, Example, PredicateKind, ProbDistribution};
pub use network::{DependencyGraph, OrderingScheduler};

pub struct AppInfo;

impl AppInfo {
    pub const fn name() -> &'static str {
        "rdn-core"
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

//! Error taxonomy for joint inference.
//!
//! Every error here is fatal for the call that produced it: they signal a caller or
//! configuration defect, never a transient condition.

use thiserror::Error;

use crate::model::AtomKey;

/// Coarse classification of an [`InferenceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Consistency,
    Unsupported,
    Model,
}

/// Errors surfaced by the joint sampler and its collaborators.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: &'static str },
    #[error("conditional model for '{predicate}' failed: {message}")]
    Model { predicate: String, message: String },
}

impl InferenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InferenceError::Configuration(_) => ErrorKind::Configuration,
            InferenceError::Consistency(_) => ErrorKind::Consistency,
            InferenceError::Unsupported { .. } => ErrorKind::Unsupported,
            InferenceError::Model { .. } => ErrorKind::Model,
        }
    }
}

/// Invalid input handed to the sampler.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("expected a non-empty example list for '{predicate}'")]
    EmptyExamples { predicate: String },
    #[error("found example of '{found}' while sampling for '{target}'")]
    PredicateMismatch { target: String, found: String },
    #[error("no conditional model registered for '{predicate}'")]
    MissingModel { predicate: String },
    #[error("predicate '{predicate}' is not part of the dependency network")]
    UnknownPredicate { predicate: String },
    #[error("probability {value} is outside [0, 1]")]
    ProbabilityOutOfRange { value: f64 },
}

/// Internal bookkeeping that no longer lines up.
#[derive(Debug, Error, PartialEq)]
pub enum ConsistencyError {
    #[error("cumulative distribution doesn't sum to 1 (sum: {sum})")]
    DistributionNotNormalized { sum: f64 },
    #[error("unseen example during sampling: {key}")]
    UnseenMulticlassKey { key: AtomKey },
    #[error("no distribution to sample from for {key}")]
    MissingDistribution { key: AtomKey },
    #[error("sampled class {value} for {key} but the predicate has {classes} classes")]
    ClassOutOfRange {
        key: AtomKey,
        value: usize,
        classes: usize,
    },
    #[error("model for '{predicate}' returned {found} distributions for {expected} examples")]
    DistributionCountMismatch {
        predicate: String,
        expected: usize,
        found: usize,
    },
    #[error("'{predicate}' has {original} caller examples but {working} working examples")]
    ExampleCountMismatch {
        predicate: String,
        original: usize,
        working: usize,
    },
}

//! Per-example probability distributions.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ConfigurationError, ConsistencyError};

/// Maximum deviation from one tolerated when drawing from a class vector.
pub const NORMALIZATION_TOLERANCE: f64 = 1e-6;

/// How a class-count vector should be turned into probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionSource {
    /// Relative frequencies: divide by the total.
    Frequency,
    /// Raw model scores: exponentiate and normalize.
    ModelOutput,
}

/// Probability of a binary atom being true, or a distribution over the classes of a
/// multi-class atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProbDistribution {
    Single(f64),
    Vector(Vec<f64>),
}

impl ProbDistribution {
    /// Wraps a single probability of being true.
    pub fn from_probability(probability: f64) -> Result<Self, ConfigurationError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ConfigurationError::ProbabilityOutOfRange { value: probability });
        }
        Ok(ProbDistribution::Single(probability))
    }

    /// Maps a regression value through the logistic function.
    pub fn from_regression(value: f64) -> Self {
        ProbDistribution::Single(sigmoid(value))
    }

    pub fn from_counts(counts: &[f64], source: DistributionSource) -> Self {
        match source {
            DistributionSource::Frequency => {
                let total: f64 = counts.iter().sum();
                if total <= 0.0 {
                    let uniform = 1.0 / counts.len().max(1) as f64;
                    return ProbDistribution::Vector(vec![uniform; counts.len()]);
                }
                ProbDistribution::Vector(counts.iter().map(|c| c / total).collect())
            }
            DistributionSource::ModelOutput => {
                let max = counts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let exp: Vec<f64> = counts.iter().map(|c| (c - max).exp()).collect();
                let total: f64 = exp.iter().sum();
                ProbDistribution::Vector(
                    exp.iter()
                        .map(|e| {
                            let p = e / total;
                            if p.is_nan() { 1.0 } else { p }
                        })
                        .collect(),
                )
            }
        }
    }

    /// Number of classes described (two for a single probability).
    pub fn class_count(&self) -> usize {
        match self {
            ProbDistribution::Single(_) => 2,
            ProbDistribution::Vector(values) => values.len(),
        }
    }

    /// Probability mass assigned to `class`.
    pub fn value(&self, class: usize) -> f64 {
        match self {
            ProbDistribution::Single(p) => match class {
                0 => 1.0 - p,
                1 => *p,
                _ => 0.0,
            },
            ProbDistribution::Vector(values) => values.get(class).copied().unwrap_or(0.0),
        }
    }

    pub fn probability_of_true(&self) -> Option<f64> {
        match self {
            ProbDistribution::Single(p) => Some(*p),
            ProbDistribution::Vector(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            ProbDistribution::Single(_) => None,
            ProbDistribution::Vector(values) => Some(values),
        }
    }

    /// Draws a class index.
    ///
    /// Binary distributions yield `1` with probability `p`. Class vectors must sum to one
    /// within [`NORMALIZATION_TOLERANCE`]; anything else is reported rather than silently
    /// mapped onto an index.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<usize, ConsistencyError> {
        match self {
            ProbDistribution::Single(p) => Ok(usize::from(rng.r#gen::<f64>() < *p)),
            ProbDistribution::Vector(values) => {
                let sum: f64 = values.iter().sum();
                if !sum.is_finite() || (sum - 1.0).abs() > NORMALIZATION_TOLERANCE {
                    return Err(ConsistencyError::DistributionNotNormalized { sum });
                }
                let draw = rng.r#gen::<f64>();
                let mut cumulative = 0.0;
                for (index, value) in values.iter().enumerate() {
                    cumulative += value;
                    if draw < cumulative {
                        return Ok(index);
                    }
                }
                // Rounding left the draw just past the last boundary.
                values
                    .iter()
                    .rposition(|value| *value > 0.0)
                    .ok_or(ConsistencyError::DistributionNotNormalized { sum })
            }
        }
    }
}

impl fmt::Display for ProbDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbDistribution::Single(p) => write!(f, "{p}"),
            ProbDistribution::Vector(values) => write!(f, "{values:?}"),
        }
    }
}

pub fn sigmoid(value: f64) -> f64 {
    1.0 / (1.0 + (-value).exp())
}

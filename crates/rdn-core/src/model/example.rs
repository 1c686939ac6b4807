//! Ground atoms handed to the sampler.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::distribution::ProbDistribution;
use super::predicate::{MULTICLASS_PREFIX, base_name};

/// Opaque ground-argument tuple of an atom.
pub type GroundArgs = Vec<String>;

/// Typed identity of a ground atom: predicate, arguments, and (for per-class views of a
/// multi-class atom) the class index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AtomKey {
    pub predicate: String,
    pub args: GroundArgs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<usize>,
}

impl AtomKey {
    pub fn new(predicate: impl Into<String>, args: GroundArgs, class: Option<usize>) -> Self {
        Self {
            predicate: predicate.into(),
            args,
            class,
        }
    }
}

impl fmt::Display for AtomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.predicate, self.args.join(", "))?;
        if let Some(class) = self.class {
            write!(f, "#{class}")?;
        }
        Ok(())
    }
}

fn default_weight() -> f64 {
    1.0
}

/// One ground instance of a predicate together with its sampling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    predicate: String,
    args: GroundArgs,
    #[serde(default)]
    class: Option<usize>,
    #[serde(default)]
    sampled_value: usize,
    #[serde(default)]
    probability: Option<ProbDistribution>,
    #[serde(default = "default_weight")]
    weight: f64,
}

impl Example {
    pub fn new<S: Into<String>>(
        predicate: impl Into<String>,
        args: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            predicate: predicate.into(),
            args: args.into_iter().map(Into::into).collect(),
            class: None,
            sampled_value: 0,
            probability: None,
            weight: default_weight(),
        }
    }

    /// Marks this example as the binary view of class `class` of a multi-class atom.
    pub fn with_class(mut self, class: usize) -> Self {
        self.class = Some(class);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_sampled_value(mut self, value: usize) -> Self {
        self.sampled_value = value;
        self
    }

    /// Copy of this example under a different predicate name, keeping the sampling state.
    pub(crate) fn renamed(&self, predicate: String, class: Option<usize>) -> Self {
        Self {
            predicate,
            args: self.args.clone(),
            class,
            sampled_value: self.sampled_value,
            probability: self.probability.clone(),
            weight: self.weight,
        }
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    /// Predicate name without the multi-class prefix.
    pub fn base_predicate(&self) -> &str {
        base_name(&self.predicate)
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn class(&self) -> Option<usize> {
        self.class
    }

    pub fn sampled_value(&self) -> usize {
        self.sampled_value
    }

    pub fn set_sampled_value(&mut self, value: usize) {
        self.sampled_value = value;
    }

    pub fn probability(&self) -> Option<&ProbDistribution> {
        self.probability.as_ref()
    }

    pub fn set_probability(&mut self, distribution: ProbDistribution) {
        self.probability = Some(distribution);
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// True for categorical working copies carrying [`MULTICLASS_PREFIX`].
    pub fn is_multiclass_working(&self) -> bool {
        self.predicate.starts_with(MULTICLASS_PREFIX)
    }

    pub fn key(&self) -> AtomKey {
        AtomKey::new(self.predicate.clone(), self.args.clone(), self.class)
    }
}

impl fmt::Display for Example {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key().fmt(f)
    }
}

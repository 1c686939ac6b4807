use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rdn_core::{Example, ProbDistribution};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

const CONFIDENCE_LEVEL: f64 = 0.95;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("example {0} has no probability after inference")]
    MissingProbability(String),
    #[error("invalid normal distribution: {0}")]
    Stats(String),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Per-predicate view of the inferred marginals.
#[derive(Debug, Clone, Serialize)]
pub struct PredicateReport {
    pub predicate: String,
    pub examples: usize,
    pub classes: usize,
    /// Weighted mean marginal per class (one entry for binary predicates).
    pub mean: Vec<f64>,
    /// Range of P(true), or of the modal class probability for multi-class predicates.
    pub min: f64,
    pub max: f64,
    /// Half-width of the Monte Carlo interval around a marginal of 0.5, the widest case.
    pub mc_half_width: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarginalSummary {
    pub run_id: String,
    pub seed: u64,
    pub burn_in: usize,
    pub samples: usize,
    pub predicates: Vec<PredicateReport>,
}

impl MarginalSummary {
    /// Builds reports for every target. `sampled` predicates get a Monte Carlo error bound
    /// from the number of retained sweeps.
    pub fn collect(
        run_id: &str,
        seed: u64,
        burn_in: usize,
        samples: usize,
        examples: &BTreeMap<String, Vec<Example>>,
        sampled: impl Fn(&str) -> bool,
    ) -> Result<Self, AnalyticsError> {
        let z = z_score(CONFIDENCE_LEVEL)?;
        let mut predicates = Vec::new();
        for (predicate, list) in examples {
            if list.is_empty() {
                continue;
            }
            let mut weighted = Vec::new();
            let mut total_weight = 0.0;
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for example in list {
                let distribution = example
                    .probability()
                    .ok_or_else(|| AnalyticsError::MissingProbability(example.to_string()))?;
                let values = reported_values(distribution);
                if weighted.len() < values.len() {
                    weighted.resize(values.len(), 0.0);
                }
                for (slot, value) in weighted.iter_mut().zip(&values) {
                    *slot += example.weight() * value;
                }
                let headline = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                min = min.min(headline);
                max = max.max(headline);
                total_weight += example.weight();
            }
            let mean = weighted.iter().map(|sum| sum / total_weight).collect::<Vec<_>>();
            let mc_half_width = sampled(predicate).then(|| z * (0.25 / samples as f64).sqrt());
            predicates.push(PredicateReport {
                predicate: predicate.clone(),
                examples: list.len(),
                classes: mean.len().max(2),
                mean,
                min,
                max,
                mc_half_width,
            });
        }

        Ok(Self {
            run_id: run_id.to_string(),
            seed,
            burn_in,
            samples,
            predicates,
        })
    }

    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        let mut rows = String::new();
        rows.push_str(&format!("# Marginals for {}\n\n", self.run_id));
        rows.push_str(&format!(
            "Seed {}, {} burn-in sweeps, {} retained sweeps\n\n",
            self.seed, self.burn_in, self.samples
        ));
        rows.push_str("| Predicate | Examples | Classes | Mean marginal | Min | Max | ±95% MC |\n");
        rows.push_str("|-----------|----------|---------|---------------|-----|-----|---------|\n");

        for report in &self.predicates {
            let mean = report
                .mean
                .iter()
                .map(|value| format!("{value:.3}"))
                .collect::<Vec<_>>()
                .join(" / ");
            let half_width = report
                .mc_half_width
                .map(|h| format!("{h:.3}"))
                .unwrap_or_else(|| "exact".to_string());
            rows.push_str(&format!(
                "| {name} | {examples} | {classes} | {mean} | {min:.3} | {max:.3} | {half_width} |\n",
                name = report.predicate,
                examples = report.examples,
                classes = report.classes,
                min = report.min,
                max = report.max,
            ));
        }

        fs::write(path, rows).map_err(|source| AnalyticsError::Io {
            context: "writing summary markdown",
            source,
        })
    }
}

/// Binary marginals report P(true); class vectors report every class.
fn reported_values(distribution: &ProbDistribution) -> Vec<f64> {
    match distribution {
        ProbDistribution::Single(p) => vec![*p],
        ProbDistribution::Vector(values) => values.clone(),
    }
}

fn z_score(level: f64) -> Result<f64, AnalyticsError> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| AnalyticsError::Stats(e.to_string()))?;
    Ok(normal.inverse_cdf(0.5 + level / 2.0))
}

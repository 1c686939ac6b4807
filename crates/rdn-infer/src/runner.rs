use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rdn_core::network::write_dot;
use rdn_core::{
    AtomKey, DependencyGraph, Example, InferenceError, JointModelSampler, MarginalInference,
    MemoryFactStore, ProbDistribution, SamplerConfig,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsError, MarginalSummary};
use crate::config::{InferenceConfig, ResolvedOutputs};
use crate::model::{ModelError, Network};

/// Loads a network from configuration, runs joint inference and writes the artifacts.
pub struct InferenceRunner {
    config: InferenceConfig,
    outputs: ResolvedOutputs,
    network: Network,
    seed: u64,
}

/// Summary details returned after a run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub seed: u64,
    pub predicates: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub dot_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct MarginalRow<'a> {
    run_id: &'a str,
    predicate: &'a str,
    args: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<usize>,
    weight: f64,
    probability: &'a ProbDistribution,
}

impl InferenceRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: InferenceConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let network = Network::from_config(&config)?;
        let seed = config.sampler.seed.unwrap_or_else(rand::random);
        Ok(Self {
            config,
            outputs,
            network,
            seed,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.network.graph
    }

    pub fn run(self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;
        ensure_parent(self.outputs.dot.parent())?;

        let Self {
            config,
            outputs,
            network,
            seed,
        } = self;

        let mut store = MemoryFactStore::new();
        for fact in &config.facts {
            store.insert_fact(AtomKey::new(
                fact.predicate.clone(),
                fact.args.clone(),
                fact.class,
            ));
        }

        let mut examples = build_examples(&config);
        let sampler_config = SamplerConfig {
            burn_in: config.sampler.burn_in,
            samples: config.sampler.samples,
            seed,
        };
        let mut sampler = JointModelSampler::new(network.models, network.graph, store)
            .with_multiclass(network.multiclass)
            .with_config(sampler_config);
        if let Some(limit) = config.sampler.max_model_complexity {
            sampler.set_max_model_complexity(limit);
        }

        event!(
            target: "rdn_infer::runner",
            Level::INFO,
            run_id = %config.run_id,
            seed,
            targets = examples.len(),
            facts = config.facts.len(),
            "starting joint inference"
        );
        sampler.compute_joint_marginals(&mut examples)?;

        let mut dot = BufWriter::new(File::create(&outputs.dot)?);
        write_dot(sampler.graph(), &mut dot)?;
        dot.flush()?;

        let mut writer = BufWriter::new(File::create(&outputs.jsonl)?);
        let rows_written = write_marginal_rows(&mut writer, &config.run_id, &examples)?;
        writer.flush()?;

        let sampled = sampler.sampled_predicates();
        let summary = MarginalSummary::collect(
            &config.run_id,
            seed,
            config.sampler.burn_in,
            config.sampler.samples,
            &examples,
            |predicate| sampled.contains(predicate),
        )?;
        summary.write_markdown(&outputs.summary_md)?;

        event!(
            target: "rdn_infer::runner",
            Level::INFO,
            run_id = %config.run_id,
            rows = rows_written,
            "joint inference complete"
        );

        Ok(RunSummary {
            run_id: config.run_id.clone(),
            seed,
            predicates: examples.len(),
            rows_written,
            jsonl_path: outputs.jsonl,
            summary_path: outputs.summary_md,
            dot_path: outputs.dot,
        })
    }
}

fn build_examples(config: &InferenceConfig) -> BTreeMap<String, Vec<Example>> {
    config
        .examples
        .iter()
        .map(|(target, list)| {
            let examples = list
                .iter()
                .map(|entry| {
                    let example =
                        Example::new(target.as_str(), entry.args.iter()).with_weight(entry.weight);
                    match entry.class {
                        Some(class) => example.with_class(class),
                        None => example,
                    }
                })
                .collect();
            (target.clone(), examples)
        })
        .collect()
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn write_marginal_rows(
    writer: &mut BufWriter<File>,
    run_id: &str,
    examples: &BTreeMap<String, Vec<Example>>,
) -> Result<usize, RunnerError> {
    let mut rows_written = 0usize;
    for (predicate, list) in examples {
        for example in list {
            let Some(probability) = example.probability() else {
                continue;
            };
            let row = MarginalRow {
                run_id,
                predicate,
                args: example.args(),
                class: example.class(),
                weight: example.weight(),
                probability,
            };
            serde_json::to_writer(&mut *writer, &row)?;
            writer.write_all(b"\n")?;
            rows_written += 1;
        }
    }
    Ok(rows_written)
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Model(#[from] ModelError),
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize marginal row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
}

use std::path::PathBuf;

use clap::Parser;

use rdn_infer::config::{InferenceConfig, ResolvedOutputs};
use rdn_infer::logging::init_logging;
use rdn_infer::runner::InferenceRunner;

/// Joint inference over a relational dependency network described in YAML.
#[derive(Debug, Parser)]
#[command(
    name = "rdn-infer",
    author,
    version,
    about = "Gibbs-sampling joint inference for relational dependency networks"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "rdn.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the sampler RNG seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the number of discarded burn-in sweeps.
    #[arg(long, value_name = "SWEEPS")]
    burn_in: Option<usize>,

    /// Override the number of retained sweeps.
    #[arg(long, value_name = "SWEEPS")]
    samples: Option<usize>,

    /// Exit after validating the configuration (no inference is run).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = InferenceConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(seed) = cli.seed {
        config.sampler.seed = Some(seed);
    }

    if let Some(burn_in) = cli.burn_in {
        config.sampler.burn_in = burn_in;
    }

    if let Some(samples) = cli.samples {
        config.sampler.samples = samples;
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let predicate_count = config.predicates.len();
    let target_count = config.examples.len();

    println!(
        "Loaded configuration '{run_id}' with {predicate_count} predicate{} ({target_count} target{}, {} burn-in, {} samples)",
        if predicate_count == 1 { "" } else { "s" },
        if target_count == 1 { "" } else { "s" },
        config.sampler.burn_in,
        config.sampler.samples
    );

    let logging_guard = init_logging(&config.logging, &outputs)?;
    let runner = InferenceRunner::new(config, outputs)?;

    if cli.validate_only {
        println!("Validation-only mode: inference skipped.");
        return Ok(());
    }

    let summary = runner.run()?;
    println!(
        "Inference complete for '{run_id}' (seed {}): {} marginals for {} predicates at {}",
        summary.seed,
        summary.rows_written,
        summary.predicates,
        summary.jsonl_path.display()
    );
    println!("Summary table: {}", summary.summary_path.display());
    println!("Dependency network: {}", summary.dot_path.display());
    if let Some(guard) = logging_guard.as_ref().filter(|guard| guard.installed) {
        println!("Telemetry log: {}", guard.telemetry_path.display());
    }

    Ok(())
}

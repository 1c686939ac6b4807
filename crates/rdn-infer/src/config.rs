use rdn_core::PredicateKind;
use rdn_core::inference::{DEFAULT_BURN_IN, DEFAULT_SAMPLES};
use rdn_core::model::MULTICLASS_PREFIX;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const DEFAULT_CLASSES: usize = 2;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root inference configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InferenceConfig {
    pub run_id: String,
    #[serde(default)]
    pub sampler: SamplerSection,
    pub predicates: Vec<PredicateConfig>,
    #[serde(default)]
    pub facts: Vec<FactConfig>,
    pub examples: BTreeMap<String, Vec<ExampleConfig>>,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl InferenceConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: InferenceConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.sampler.validate()?;
        let classes = validate_predicates(&self.predicates)?;
        validate_facts(&self.facts, &self.predicates, &classes)?;
        validate_examples(&self.examples, &self.predicates, &classes)?;
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        Ok(())
    }

    pub fn predicate(&self, name: &str) -> Option<&PredicateConfig> {
        self.predicates.iter().find(|p| p.name == name)
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
            dot: resolve_template(&self.run_id, &self.outputs.dot),
        }
    }
}

/// Gibbs sampler settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SamplerSection {
    /// Drawn at random (and reported) when absent.
    pub seed: Option<u64>,
    #[serde(default = "default_burn_in")]
    pub burn_in: usize,
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default)]
    pub max_model_complexity: Option<usize>,
}

impl Default for SamplerSection {
    fn default() -> Self {
        Self {
            seed: None,
            burn_in: DEFAULT_BURN_IN,
            samples: DEFAULT_SAMPLES,
            max_model_complexity: None,
        }
    }
}

impl SamplerSection {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.samples == 0 {
            return Err(ValidationError::InvalidField {
                field: "sampler.samples".to_string(),
                message: "number of retained samples must be greater than zero".to_string(),
            });
        }

        if self.max_model_complexity == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "sampler.max_model_complexity".to_string(),
                message: "complexity cap must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

fn default_burn_in() -> usize {
    DEFAULT_BURN_IN
}

fn default_samples() -> usize {
    DEFAULT_SAMPLES
}

/// Declaration of one predicate of the network.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PredicateConfig {
    pub name: String,
    pub kind: PredicateKind,
    #[serde(default = "default_classes")]
    pub classes: usize,
    #[serde(default)]
    pub model: Option<ModelConfig>,
}

fn default_classes() -> usize {
    DEFAULT_CLASSES
}

/// Additive scoring model: one bias per output score plus weighted parent-fact terms.
///
/// Binary predicates carry a single score (a logit); `k`-class predicates carry `k`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub bias: Vec<f64>,
    #[serde(default)]
    pub terms: Vec<TermConfig>,
}

/// Adds `weights` to the scores when `parent(args)` (optionally `#class`) holds.
///
/// `args` entries of the form `$i` bind to argument `i` of the example being scored; anything
/// else is a literal constant.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TermConfig {
    pub parent: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub class: Option<usize>,
    pub weights: Vec<f64>,
}

/// A fixed evidence atom.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FactConfig {
    pub predicate: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub class: Option<usize>,
}

/// A query atom whose marginal is requested.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExampleConfig {
    pub args: Vec<String>,
    #[serde(default)]
    pub class: Option<usize>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
    pub dot: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
            ("outputs.dot", &self.dot),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path must not be empty".to_string(),
                });
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "resolved path is invalid".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn validate_predicates(
    predicates: &[PredicateConfig],
) -> Result<HashMap<&str, usize>, ValidationError> {
    if predicates.is_empty() {
        return Err(ValidationError::InvalidField {
            field: "predicates".to_string(),
            message: "at least one predicate must be declared".to_string(),
        });
    }

    let mut classes = HashMap::new();
    for predicate in predicates {
        let name = predicate.name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidField {
                field: "predicates.name".to_string(),
                message: "predicate name must not be empty".to_string(),
            });
        }
        if name.starts_with(MULTICLASS_PREFIX) {
            return Err(ValidationError::InvalidField {
                field: format!("predicates[{name}].name"),
                message: format!("prefix '{MULTICLASS_PREFIX}' is reserved for working copies"),
            });
        }
        if predicate.classes < DEFAULT_CLASSES {
            return Err(ValidationError::InvalidField {
                field: format!("predicates[{name}].classes"),
                message: "a predicate needs at least two classes".to_string(),
            });
        }
        if classes.insert(name, predicate.classes).is_some() {
            return Err(ValidationError::InvalidField {
                field: "predicates".to_string(),
                message: format!("predicate '{name}' defined more than once"),
            });
        }
    }

    for predicate in predicates {
        let name = predicate.name.trim();
        match (&predicate.model, predicate.kind) {
            (None, PredicateKind::Query) => {
                return Err(ValidationError::InvalidField {
                    field: format!("predicates[{name}].model"),
                    message: "query predicates need a model".to_string(),
                });
            }
            (Some(model), _) => validate_model(name, predicate.classes, model, &classes)?,
            (None, _) => {}
        }
    }

    Ok(classes)
}

fn validate_model(
    name: &str,
    classes: usize,
    model: &ModelConfig,
    declared: &HashMap<&str, usize>,
) -> Result<(), ValidationError> {
    let scores = score_count(classes);
    if model.bias.len() != scores {
        return Err(ValidationError::InvalidField {
            field: format!("predicates[{name}].model.bias"),
            message: format!("expected {scores} value(s), found {}", model.bias.len()),
        });
    }

    for (index, term) in model.terms.iter().enumerate() {
        let field = format!("predicates[{name}].model.terms[{index}]");
        if term.weights.len() != scores {
            return Err(ValidationError::InvalidField {
                field: format!("{field}.weights"),
                message: format!("expected {scores} value(s), found {}", term.weights.len()),
            });
        }
        if let Some(arg) = term.args.iter().find(|arg| !is_valid_template(arg)) {
            return Err(ValidationError::InvalidField {
                field: format!("{field}.args"),
                message: format!("'{arg}' is neither a constant nor a $index placeholder"),
            });
        }
        if let (Some(class), Some(parent_classes)) =
            (term.class, declared.get(term.parent.as_str()))
        {
            if class >= *parent_classes {
                return Err(ValidationError::InvalidField {
                    field: format!("{field}.class"),
                    message: format!(
                        "'{}' has {parent_classes} classes, {class} is out of range",
                        term.parent
                    ),
                });
            }
        }
    }

    Ok(())
}

fn validate_facts(
    facts: &[FactConfig],
    predicates: &[PredicateConfig],
    classes: &HashMap<&str, usize>,
) -> Result<(), ValidationError> {
    for (index, fact) in facts.iter().enumerate() {
        let field = format!("facts[{index}]");
        if fact.predicate.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field,
                message: "fact predicate must not be empty".to_string(),
            });
        }
        let declared = predicates.iter().find(|p| p.name == fact.predicate);
        if declared.is_some_and(|p| p.kind == PredicateKind::Query) {
            return Err(ValidationError::InvalidField {
                field,
                message: format!(
                    "'{}' is a query predicate; its atoms are sampled, not fixed",
                    fact.predicate
                ),
            });
        }
        if let (Some(class), Some(count)) = (fact.class, classes.get(fact.predicate.as_str())) {
            if class >= *count {
                return Err(ValidationError::InvalidField {
                    field: format!("{field}.class"),
                    message: format!("class {class} is out of range for {count} classes"),
                });
            }
        }
    }
    Ok(())
}

fn validate_examples(
    examples: &BTreeMap<String, Vec<ExampleConfig>>,
    predicates: &[PredicateConfig],
    classes: &HashMap<&str, usize>,
) -> Result<(), ValidationError> {
    for (target, list) in examples {
        let Some(predicate) = predicates.iter().find(|p| &p.name == target) else {
            return Err(ValidationError::InvalidField {
                field: format!("examples.{target}"),
                message: "predicate is not declared".to_string(),
            });
        };
        if predicate.kind != PredicateKind::Query {
            return Err(ValidationError::InvalidField {
                field: format!("examples.{target}"),
                message: format!("only query predicates can be inferred, not {}", predicate.kind),
            });
        }

        let count = classes.get(target.as_str()).copied().unwrap_or(DEFAULT_CLASSES);
        for (index, example) in list.iter().enumerate() {
            let field = format!("examples.{target}[{index}]");
            if let Some(class) = example.class {
                if count == DEFAULT_CLASSES || class >= count {
                    return Err(ValidationError::InvalidField {
                        field: format!("{field}.class"),
                        message: format!(
                            "class views need a multi-class predicate with more than {class} classes"
                        ),
                    });
                }
            }
            if !(example.weight.is_finite() && example.weight > 0.0) {
                return Err(ValidationError::InvalidField {
                    field: format!("{field}.weight"),
                    message: "weight must be a positive number".to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Number of model scores for a predicate with `classes` values.
pub fn score_count(classes: usize) -> usize {
    if classes > DEFAULT_CLASSES { classes } else { 1 }
}

fn is_valid_template(arg: &str) -> bool {
    match arg.strip_prefix('$') {
        Some(index) => !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()),
        None => !arg.trim().is_empty(),
    }
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
    pub dot: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

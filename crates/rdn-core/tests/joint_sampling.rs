use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rdn_core::inference::{DEFAULT_BURN_IN, DEFAULT_SAMPLES};
use rdn_core::{
    AtomKey, ConditionalModel, ConfigurationError, ConsistencyError, DependencyGraph, ErrorKind,
    Example, FactStore, InferenceError, InferenceStrategy, JointInference, JointModel,
    JointModelSampler, MarginalInference, MemoryFactStore, MulticlassRegistry, PredicateKind,
    ProbDistribution, SamplerConfig,
};

struct FnModel<F> {
    infer: F,
    calls: Rc<Cell<usize>>,
    limit: Rc<Cell<usize>>,
}

impl<F> FnModel<F>
where
    F: Fn(&Example, &dyn FactStore) -> ProbDistribution + 'static,
{
    fn boxed(infer: F) -> Box<Self> {
        Box::new(Self {
            infer,
            calls: Rc::new(Cell::new(0)),
            limit: Rc::new(Cell::new(usize::MAX)),
        })
    }
}

impl<F> ConditionalModel for FnModel<F>
where
    F: Fn(&Example, &dyn FactStore) -> ProbDistribution,
{
    fn infer(
        &self,
        examples: &[Example],
        facts: &dyn FactStore,
    ) -> Result<Vec<ProbDistribution>, InferenceError> {
        self.calls.set(self.calls.get() + 1);
        Ok(examples.iter().map(|ex| (self.infer)(ex, facts)).collect())
    }

    fn set_max_complexity(&mut self, limit: usize) {
        self.limit.set(limit);
    }
}

fn holds(facts: &dyn FactStore, predicate: &str, example: &Example) -> bool {
    facts.holds(&AtomKey::new(predicate, example.args().to_vec(), None))
}

fn query_graph(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for node in nodes {
        graph.add_predicate(node, PredicateKind::Query);
    }
    for (child, parent) in edges {
        graph.add_dependency(child, parent).expect("known child");
    }
    graph
}

fn config(burn_in: usize, samples: usize, seed: u64) -> SamplerConfig {
    SamplerConfig {
        burn_in,
        samples,
        seed,
    }
}

fn examples_for(predicate: &str, args: &[&str]) -> Vec<Example> {
    args.iter().map(|arg| Example::new(predicate, [*arg])).collect()
}

fn prob(example: &Example) -> f64 {
    example
        .probability()
        .and_then(ProbDistribution::probability_of_true)
        .expect("binary probability set")
}

#[test]
fn single_target_is_one_deterministic_model_call() {
    let mut outputs = Vec::new();
    for seed in [1, 99] {
        let model = FnModel::boxed(|ex: &Example, _: &dyn FactStore| {
            ProbDistribution::Single(if ex.args()[0] == "ann" { 0.25 } else { 0.6 })
        });
        let calls = model.calls.clone();
        let mut models = JointModel::new();
        models.insert("smokes", model);
        let mut sampler =
            JointModelSampler::new(models, query_graph(&["smokes"], &[]), MemoryFactStore::new())
                .with_config(config(DEFAULT_BURN_IN, DEFAULT_SAMPLES, seed));

        let mut examples =
            BTreeMap::from([("smokes".to_string(), examples_for("smokes", &["ann", "bob"]))]);
        sampler.compute_joint_marginals(&mut examples).unwrap();

        assert_eq!(calls.get(), 1, "no sampling loop for a single target");
        outputs.push(examples["smokes"].clone());
    }
    assert_eq!(outputs[0], outputs[1]);
    assert!((prob(&outputs[0][0]) - 0.25).abs() < 1e-12);
    assert!((prob(&outputs[0][1]) - 0.6).abs() < 1e-12);
}

fn parentless_run(burn_in: usize, samples: usize) -> (f64, usize) {
    let a = FnModel::boxed(|_: &Example, _: &dyn FactStore| ProbDistribution::Single(0.3));
    let a_calls = a.calls.clone();
    let b = FnModel::boxed(|ex: &Example, facts: &dyn FactStore| {
        ProbDistribution::Single(if holds(facts, "a", ex) { 0.9 } else { 0.1 })
    });
    let mut models = JointModel::new();
    models.insert("a", a);
    models.insert("b", b);
    let mut sampler = JointModelSampler::new(
        models,
        query_graph(&["a", "b"], &[("b", "a")]),
        MemoryFactStore::new(),
    )
    .with_config(config(burn_in, samples, 7));

    let mut examples = BTreeMap::from([
        ("a".to_string(), examples_for("a", &["k"])),
        ("b".to_string(), examples_for("b", &["k"])),
    ]);
    sampler.compute_joint_marginals(&mut examples).unwrap();
    assert_eq!(
        sampler.sampled_predicates().iter().collect::<Vec<_>>(),
        vec!["b"],
        "only the predicate reading a query parent joins the chain"
    );
    (prob(&examples["a"][0]), a_calls.get())
}

#[test]
fn parentless_predicate_is_computed_once() {
    let (long, long_calls) = parentless_run(200, 1000);
    let (short, short_calls) = parentless_run(5, 20);
    assert_eq!(long_calls, 1);
    assert_eq!(short_calls, 1);
    assert_eq!(long, 0.3);
    assert_eq!(short, 0.3);
}

#[test]
fn scheduler_orders_by_unresolved_parents() {
    let constant = || FnModel::boxed(|_: &Example, _: &dyn FactStore| ProbDistribution::Single(0.5));
    let mut models = JointModel::new();
    models.insert("A", constant());
    models.insert("B", constant());
    models.insert("C", constant());
    let graph = query_graph(&["C", "B", "A"], &[("B", "A"), ("C", "A"), ("C", "B")]);
    let mut sampler = JointModelSampler::new(models, graph, MemoryFactStore::new())
        .with_config(config(2, 5, 0));

    let mut examples = BTreeMap::from([
        ("C".to_string(), examples_for("C", &["x"])),
        ("B".to_string(), examples_for("B", &["x"])),
        ("A".to_string(), examples_for("A", &["x"])),
    ]);
    sampler.compute_joint_marginals(&mut examples).unwrap();

    let graph = sampler.graph();
    assert_eq!(graph.order("A").unwrap(), 1);
    assert_eq!(graph.order("B").unwrap(), 2);
    assert_eq!(graph.order("C").unwrap(), 3);
}

#[test]
fn cyclic_pair_matches_analytic_fixed_point() {
    // P(x | y) = 0.8 / 0.2 and P(y | x) = 0.7 / 0.4. With x visited first, the chain's
    // stationary marginals are q_y = 0.46 / 0.82 and q_x = 0.2 + 0.6 q_y.
    let expected_y = 0.46 / 0.82;
    let expected_x = 0.2 + 0.6 * expected_y;

    let x = FnModel::boxed(|ex: &Example, facts: &dyn FactStore| {
        ProbDistribution::Single(if holds(facts, "y", ex) { 0.8 } else { 0.2 })
    });
    let y = FnModel::boxed(|ex: &Example, facts: &dyn FactStore| {
        ProbDistribution::Single(if holds(facts, "x", ex) { 0.7 } else { 0.4 })
    });
    let mut models = JointModel::new();
    models.insert("x", x);
    models.insert("y", y);
    let mut sampler = JointModelSampler::new(
        models,
        query_graph(&["x", "y"], &[("x", "y"), ("y", "x")]),
        MemoryFactStore::new(),
    )
    .with_config(config(DEFAULT_BURN_IN, DEFAULT_SAMPLES, 2024));

    let args: Vec<String> = (0..20).map(|i| format!("p{i}")).collect();
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let mut examples = BTreeMap::from([
        ("x".to_string(), examples_for("x", &arg_refs)),
        ("y".to_string(), examples_for("y", &arg_refs)),
    ]);
    sampler.compute_joint_marginals(&mut examples).unwrap();

    for (predicate, expected) in [("x", expected_x), ("y", expected_y)] {
        let estimates: Vec<f64> = examples[predicate].iter().map(prob).collect();
        let mean = estimates.iter().sum::<f64>() / estimates.len() as f64;
        assert!(
            (mean - expected).abs() < 0.05,
            "{predicate}: mean {mean} vs analytic {expected}"
        );
        for estimate in estimates {
            assert!(
                (estimate - expected).abs() < 0.12,
                "{predicate}: estimate {estimate} vs analytic {expected}"
            );
        }
    }
}

#[test]
fn fresh_samples_are_visible_within_a_sweep() {
    // x is always sampled true, y copies x. If y's model saw stale evidence in any
    // counted sweep, its frequency would drop below one.
    let x = FnModel::boxed(|_: &Example, _: &dyn FactStore| ProbDistribution::Single(1.0));
    let y = FnModel::boxed(|ex: &Example, facts: &dyn FactStore| {
        ProbDistribution::Single(if holds(facts, "x", ex) { 1.0 } else { 0.0 })
    });
    let mut models = JointModel::new();
    models.insert("x", x);
    models.insert("y", y);
    let mut sampler = JointModelSampler::new(
        models,
        query_graph(&["x", "y"], &[("x", "y"), ("y", "x")]),
        MemoryFactStore::new(),
    )
    .with_config(config(0, 30, 5));

    let args: Vec<String> = (0..16).map(|i| format!("p{i}")).collect();
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let mut examples = BTreeMap::from([
        ("x".to_string(), examples_for("x", &arg_refs)),
        ("y".to_string(), examples_for("y", &arg_refs)),
    ]);
    sampler.compute_joint_marginals(&mut examples).unwrap();

    for example in &examples["y"] {
        assert_eq!(prob(example), 1.0, "stale evidence for {example}");
    }
}

fn multiclass_sampler(color_dist: Vec<f64>) -> JointModelSampler {
    let color = FnModel::boxed(move |_: &Example, _: &dyn FactStore| {
        ProbDistribution::Vector(color_dist.clone())
    });
    let flag = FnModel::boxed(|ex: &Example, facts: &dyn FactStore| {
        let third = AtomKey::new("color", ex.args().to_vec(), Some(2));
        ProbDistribution::Single(if facts.holds(&third) { 0.9 } else { 0.3 })
    });
    let mut models = JointModel::new();
    models.insert("color", color);
    models.insert("flag", flag);

    let mut multiclass = MulticlassRegistry::new();
    multiclass.register("color", 3);

    let mut store = MemoryFactStore::new();
    store.insert_fact(AtomKey::new("likes", vec!["ball".into()], None));

    JointModelSampler::new(
        models,
        query_graph(&["color", "flag"], &[("color", "flag"), ("flag", "color")]),
        store,
    )
    .with_multiclass(multiclass)
    .with_config(config(DEFAULT_BURN_IN, DEFAULT_SAMPLES, 31))
}

fn multiclass_examples() -> BTreeMap<String, Vec<Example>> {
    BTreeMap::from([
        (
            "color".to_string(),
            vec![
                Example::new("color", ["ball"]),
                Example::new("color", ["cube"]).with_class(1),
                Example::new("color", ["cube"]).with_class(2),
            ],
        ),
        ("flag".to_string(), examples_for("flag", &["ball", "cube"])),
    ])
}

#[test]
fn multiclass_round_trip_reproduces_oracle_vector() {
    let mut sampler = multiclass_sampler(vec![0.1, 0.2, 0.7]);
    let mut examples = multiclass_examples();
    sampler.compute_joint_marginals(&mut examples).unwrap();

    let ball = examples["color"][0]
        .probability()
        .and_then(ProbDistribution::as_vector)
        .expect("categorical original carries a vector")
        .to_vec();
    assert_eq!(ball.len(), 3);
    for (got, want) in ball.iter().zip([0.1, 0.2, 0.7]) {
        assert!((got - want).abs() < 0.05, "{ball:?}");
    }
    assert!((ball.iter().sum::<f64>() - 1.0).abs() < 1e-9);

    assert!((prob(&examples["color"][1]) - 0.2).abs() < 0.05);
    assert!((prob(&examples["color"][2]) - 0.7).abs() < 0.05);

    // P(flag) = 0.7 * 0.9 + 0.3 * 0.3
    for flag in &examples["flag"] {
        assert!((prob(flag) - 0.72).abs() < 0.06, "{flag}: {}", prob(flag));
    }
}

#[test]
fn no_working_atoms_remain_after_the_call() {
    let mut sampler = multiclass_sampler(vec![0.1, 0.2, 0.7]);
    let mut examples = multiclass_examples();
    sampler.compute_joint_marginals(&mut examples).unwrap();

    let remaining = sampler.store().facts();
    assert_eq!(
        remaining,
        vec![AtomKey::new("likes", vec!["ball".into()], None)],
        "only fixed evidence survives"
    );
}

#[test]
fn unnormalized_oracle_aborts_without_partial_results() {
    let mut sampler = multiclass_sampler(vec![0.5, 0.27, 0.2]);
    let mut examples = multiclass_examples();
    let err = sampler.compute_joint_marginals(&mut examples).unwrap_err();

    assert!(matches!(
        err,
        InferenceError::Consistency(ConsistencyError::DistributionNotNormalized { .. })
    ));
    for example in examples.values().flatten() {
        assert!(example.probability().is_none(), "{example} was written");
    }
    assert_eq!(sampler.store().facts().len(), 1);
}

#[test]
fn class_view_outside_the_predicate_is_rejected() {
    let mut models = JointModel::new();
    models.insert(
        "color",
        FnModel::boxed(|_: &Example, _: &dyn FactStore| ProbDistribution::Vector(vec![0.1, 0.2, 0.7])),
    );
    let mut multiclass = MulticlassRegistry::new();
    multiclass.register("color", 3);
    let mut sampler =
        JointModelSampler::new(models, query_graph(&["color"], &[]), MemoryFactStore::new())
            .with_multiclass(multiclass);

    let mut examples = BTreeMap::from([(
        "color".to_string(),
        vec![Example::new("color", ["ball"]).with_class(5)],
    )]);
    let err = sampler.compute_joint_marginals(&mut examples).unwrap_err();

    assert!(matches!(
        err,
        InferenceError::Consistency(ConsistencyError::UnseenMulticlassKey { .. })
    ));
    assert!(examples["color"][0].probability().is_none());
    assert!(sampler.store().facts().is_empty());
}

#[test]
fn empty_target_is_fatal_once_sampling_is_needed() {
    let constant = || FnModel::boxed(|_: &Example, _: &dyn FactStore| ProbDistribution::Single(0.5));
    let mut models = JointModel::new();
    models.insert("a", constant());
    models.insert("b", constant());
    let mut sampler = JointModelSampler::new(
        models,
        query_graph(&["a", "b"], &[("a", "b"), ("b", "a")]),
        MemoryFactStore::new(),
    )
    .with_config(config(1, 1, 0));

    let mut examples = BTreeMap::from([
        ("a".to_string(), examples_for("a", &["k"])),
        ("b".to_string(), Vec::new()),
    ]);
    let err = sampler.compute_joint_marginals(&mut examples).unwrap_err();
    assert!(matches!(
        err,
        InferenceError::Configuration(ConfigurationError::EmptyExamples { ref predicate })
            if predicate == "b"
    ));
    assert!(sampler.store().facts().is_empty());
}

#[test]
fn foreign_example_is_a_configuration_error() {
    let mut models = JointModel::new();
    models.insert(
        "smokes",
        FnModel::boxed(|_: &Example, _: &dyn FactStore| ProbDistribution::Single(0.5)),
    );
    let mut sampler =
        JointModelSampler::new(models, query_graph(&["smokes"], &[]), MemoryFactStore::new());
    let mut examples =
        BTreeMap::from([("smokes".to_string(), examples_for("cancer", &["ann"]))]);
    let err = sampler.compute_joint_marginals(&mut examples).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn complexity_cap_reaches_every_model() {
    let a = FnModel::boxed(|_: &Example, _: &dyn FactStore| ProbDistribution::Single(0.5));
    let b = FnModel::boxed(|_: &Example, _: &dyn FactStore| ProbDistribution::Single(0.5));
    let (limit_a, limit_b) = (a.limit.clone(), b.limit.clone());
    let mut models = JointModel::new();
    models.insert("a", a);
    models.insert("b", b);
    let mut sampler = JointModelSampler::new(
        models,
        query_graph(&["a", "b"], &[]),
        MemoryFactStore::new(),
    );
    sampler.set_max_model_complexity(4);
    assert_eq!(limit_a.get(), 4);
    assert_eq!(limit_b.get(), 4);
}

struct Uniform;

impl JointInference for Uniform {
    fn infer(
        &self,
        _target: &str,
        examples: &[Example],
        _models: &JointModel,
        _facts: &dyn FactStore,
    ) -> Result<Vec<ProbDistribution>, InferenceError> {
        Ok(vec![ProbDistribution::Single(0.5); examples.len()])
    }
}

#[test]
fn alternative_strategy_replaces_conditional_models() {
    let model = FnModel::boxed(|_: &Example, _: &dyn FactStore| ProbDistribution::Single(0.9));
    let calls = model.calls.clone();
    let mut models = JointModel::new();
    models.insert("smokes", model);
    let mut sampler =
        JointModelSampler::new(models, query_graph(&["smokes"], &[]), MemoryFactStore::new())
            .with_strategy(InferenceStrategy::AlternativeJoint(Box::new(Uniform)));

    let mut examples =
        BTreeMap::from([("smokes".to_string(), examples_for("smokes", &["ann"]))]);
    sampler.compute_joint_marginals(&mut examples).unwrap();

    assert_eq!(calls.get(), 0);
    assert_eq!(prob(&examples["smokes"][0]), 0.5);
}

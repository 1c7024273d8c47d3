//! THE MOST IMPORTANT TEST IN THE PROJECT.
//!
//! Same inputs, same seed: byte-identical economics, sensitivity runs and
//! compliance reports. HTA submissions must be reproducible by the agency.
//! Any divergence is a blocker — do not merge until fixed.

use hta_core::{
    calculator::compute,
    compliance::evaluate,
    evidence::{EvidenceItem, EvidenceType, RiskOfBias},
    parameters::{validate, ComparatorArm, ComparatorArms, EconomicParameterSet, ParameterKind,
                 RawParameterEntry, RawParameterSet},
    registry::RuleRegistry,
    sensitivity::{run_probabilistic, ProbabilisticConfig},
    snapshot::DossierSnapshot,
    types::{FrameworkId, ModelType},
};

fn model() -> (EconomicParameterSet, ComparatorArms) {
    let raw = RawParameterSet::new(ModelType::CostUtility, "GBP", 10.0, 0.035, 0.035)
        .with_parameter(
            RawParameterEntry::new("drug_cost", ParameterKind::Cost, 10_000.0)
                .with_distribution("gamma", &[100.0, 100.0]),
        )
        .with_parameter(
            RawParameterEntry::new("utility", ParameterKind::Utility, 0.5)
                .with_distribution("beta", &[50.0, 50.0]),
        )
        .with_parameter(
            RawParameterEntry::new("discontinuation", ParameterKind::Probability, 0.05)
                .with_distribution("triangular", &[0.02, 0.05, 0.10]),
        );
    let set = validate(&raw).expect("valid parameter set");
    let arms = ComparatorArms::new(
        ComparatorArm::new("intervention"),
        ComparatorArm::new("comparator")
            .with_value("drug_cost", 6_000.0)
            .with_value("utility", 0.3),
    );
    (set, arms)
}

#[test]
fn compute_is_bit_identical_across_calls() {
    let (set, arms) = model();
    let a = compute(&set, &arms);
    let b = compute(&set, &arms);
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap(),
        "serialized results diverged"
    );
}

#[test]
fn same_seed_produces_identical_probabilistic_runs() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;
    let (set, arms) = model();
    let config = ProbabilisticConfig::new(500, 30_000.0, SEED);

    let run_a = run_probabilistic(&set, &arms, &config).expect("run a");
    let run_b = run_probabilistic(&set, &arms, &config).expect("run b");

    assert_eq!(run_a.samples.len(), run_b.samples.len());
    for (i, (a, b)) in run_a.samples.iter().zip(&run_b.samples).enumerate() {
        assert_eq!(a, b, "sample {i} diverged:\n  A: {a:?}\n  B: {b:?}");
    }
    assert_eq!(run_a.summary, run_b.summary);
}

#[test]
fn thread_count_never_changes_a_probabilistic_run() {
    let (set, arms) = model();
    let config = ProbabilisticConfig::new(500, 30_000.0, 7);

    let in_pool = |threads: usize| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("thread pool")
            .install(|| run_probabilistic(&set, &arms, &config).expect("run"))
    };
    let single = in_pool(1);
    let many = in_pool(4);
    assert_eq!(single, many, "parallel schedule leaked into the samples");
}

#[test]
fn different_seeds_produce_different_runs() {
    let (set, arms) = model();
    let run_a = run_probabilistic(&set, &arms, &ProbabilisticConfig::new(500, 30_000.0, 42)).unwrap();
    let run_b = run_probabilistic(&set, &arms, &ProbabilisticConfig::new(500, 30_000.0, 99)).unwrap();

    let any_different = run_a.samples.iter().zip(&run_b.samples).any(|(a, b)| a != b);
    assert!(any_different, "Different seeds produced identical samples — seed is not being used");
}

#[test]
fn compliance_reports_are_identical_across_evaluations() {
    let (set, arms) = model();
    let mut snapshot = DossierSnapshot::new("det-dossier")
        .with_evidence(EvidenceItem::new("ev-1", EvidenceType::Rct, RiskOfBias::Low, 420))
        .with_evidence(EvidenceItem::new("ev-2", EvidenceType::Cohort, RiskOfBias::High, 90));
    snapshot.economics.parameters = Some(set.summary());
    snapshot.economics.result = Some(compute(&set, &arms));

    let registry = RuleRegistry::builtin().expect("builtin registry");
    for summary in registry.frameworks() {
        let rule_set = registry.rule_set(&summary.framework_id, None).unwrap();
        let a = serde_json::to_string(&evaluate(&snapshot, &rule_set)).unwrap();
        let b = serde_json::to_string(&evaluate(&snapshot, &rule_set)).unwrap();
        assert_eq!(a, b, "report for {} diverged", summary.framework_id);
    }

    let nice = registry.rule_set(&FrameworkId::from("nice"), None).unwrap();
    assert_eq!(evaluate(&snapshot, &nice), evaluate(&snapshot.clone(), &nice));
}

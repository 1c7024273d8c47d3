//! Budget impact analysis tests.

use hta_core::{
    budget_impact::{budget_impact, BudgetImpactConfig, MAX_BUDGET_YEARS},
    error::{EngineError, ValidationError},
    parameters::{validate, ComparatorArm, ComparatorArms, EconomicParameterSet, ParameterKind,
                 RawParameterEntry, RawParameterSet},
    types::ModelType,
};

fn model() -> (EconomicParameterSet, ComparatorArms) {
    let raw = RawParameterSet::new(ModelType::BudgetImpact, "CAD", 3.0, 0.015, 0.015)
        .with_parameter(RawParameterEntry::new("drug", ParameterKind::Cost, 1_000.0))
        .with_parameter(RawParameterEntry::new("loading", ParameterKind::UpfrontCost, 200.0))
        .with_parameter(RawParameterEntry::new("utility", ParameterKind::Utility, 0.7));
    let set = validate(&raw).unwrap();
    let arms = ComparatorArms::new(
        ComparatorArm::new("intervention"),
        ComparatorArm::new("standard_care")
            .with_value("drug", 600.0)
            .with_value("loading", 0.0)
            .with_value("utility", 0.5),
    );
    (set, arms)
}

fn config(population: f64, uptake: &[f64], years: u32) -> BudgetImpactConfig {
    BudgetImpactConfig {
        target_population: population,
        market_uptake:     uptake.to_vec(),
        years,
    }
}

#[test]
fn yearly_spend_follows_the_uptake_curve() {
    let (set, arms) = model();
    let result = budget_impact(&set, &arms, &config(1_000.0, &[0.1, 0.25], 3)).unwrap();

    let treated: Vec<u64> = result.annual.iter().map(|y| y.treated_patients).collect();
    assert_eq!(treated, vec![100, 250, 250], "last uptake share carries forward");

    let year_one = &result.annual[0];
    assert_eq!(year_one.intervention_cost_per_patient, 1_200.0);
    assert_eq!(year_one.comparator_cost_per_patient, 600.0);
    assert_eq!(year_one.net_impact, 60_000.0);

    assert_eq!(result.cumulative_patients, 600);
    assert_eq!(result.cumulative_net_impact, 360_000.0);
    assert_eq!(result.average_net_cost_per_patient, 600.0);
    assert_eq!(result.currency, "CAD");
}

#[test]
fn treated_patients_round_down() {
    let (set, arms) = model();
    let result = budget_impact(&set, &arms, &config(999.0, &[0.5], 1)).unwrap();
    assert_eq!(result.annual[0].treated_patients, 499);
}

#[test]
fn zero_uptake_costs_nothing() {
    let (set, arms) = model();
    let result = budget_impact(&set, &arms, &config(5_000.0, &[0.0], 2)).unwrap();
    assert_eq!(result.cumulative_patients, 0);
    assert_eq!(result.cumulative_net_impact, 0.0);
    assert_eq!(result.average_net_cost_per_patient, 0.0);
}

#[test]
fn uptake_above_one_names_the_year() {
    let (set, arms) = model();
    let err = budget_impact(&set, &arms, &config(1_000.0, &[0.2, 1.5], 3)).unwrap_err();
    match err {
        EngineError::Validation(ValidationError::OutOfRange { field, value, .. }) => {
            assert_eq!(field, "budget_impact.market_uptake[1]");
            assert_eq!(value, 1.5);
        }
        other => panic!("expected OutOfRange, got {other:?}"),
    }
}

#[test]
fn degenerate_configs_are_rejected() {
    let (set, arms) = model();
    let cases = [
        (config(1_000.0, &[0.1], 0), "budget_impact.years"),
        (config(0.0, &[0.1], 3), "budget_impact.target_population"),
        (config(1_000.0, &[], 3), "budget_impact.market_uptake"),
    ];
    for (cfg, field) in cases {
        match budget_impact(&set, &arms, &cfg).unwrap_err() {
            EngineError::Validation(e) => assert_eq!(e.field(), field),
            other => panic!("expected a validation error for {field}, got {other:?}"),
        }
    }
}

#[test]
fn horizon_is_capped() {
    let (set, arms) = model();
    let result = budget_impact(&set, &arms, &config(1_000.0, &[0.1], MAX_BUDGET_YEARS)).unwrap();
    assert_eq!(result.annual.len(), MAX_BUDGET_YEARS as usize);

    let err = budget_impact(&set, &arms, &config(1_000.0, &[0.1], u32::MAX)).unwrap_err();
    match err {
        EngineError::Validation(ValidationError::OutOfRange { field, value, .. }) => {
            assert_eq!(field, "budget_impact.years");
            assert_eq!(value, u32::MAX as f64);
        }
        other => panic!("expected OutOfRange, got {other:?}"),
    }
}

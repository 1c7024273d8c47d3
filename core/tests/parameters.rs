//! Every parameter rejection names the offending field.

use hta_core::{
    distribution::Distribution,
    error::{EngineError, ValidationError},
    parameters::{validate, ComparatorArm, ComparatorArms, ParameterKind, RawParameterEntry,
                 RawParameterSet},
    types::ModelType,
};

fn base() -> RawParameterSet {
    RawParameterSet::new(ModelType::CostEffectiveness, "EUR", 10.0, 0.03, 0.015)
        .with_parameter(RawParameterEntry::new("cost", ParameterKind::Cost, 1_000.0))
}

fn field_of(raw: &RawParameterSet) -> String {
    validate(raw).expect_err("should be rejected").field().to_string()
}

#[test]
fn well_formed_set_validates() {
    let set = validate(&base()).expect("valid");
    assert_eq!(set.model_type(), ModelType::CostEffectiveness);
    assert_eq!(set.currency(), "EUR");
    assert_eq!(set.parameters().len(), 1);
    assert!(!set.has_distributions());
}

#[test]
fn payload_round_trips_through_json_with_absent_fields() {
    let json = r#"{
        "model_type": "cost_utility",
        "currency": "GBP",
        "time_horizon_years": 5,
        "discount_rate_costs": 0.035,
        "parameters": []
    }"#;
    let raw: RawParameterSet = serde_json::from_str(json).unwrap();
    let err = validate(&raw).unwrap_err();
    assert_eq!(err, ValidationError::MissingField { field: "discount_rate_effects".into() });
}

#[test]
fn missing_top_level_fields_are_named() {
    let mut raw = base();
    raw.currency = None;
    assert_eq!(field_of(&raw), "currency");

    let mut raw = base();
    raw.parameters = None;
    assert_eq!(field_of(&raw), "parameters");
}

#[test]
fn malformed_currency_is_rejected() {
    for code in ["eur", "EURO", "E1R", ""] {
        let mut raw = base();
        raw.currency = Some(code.into());
        let err = validate(&raw).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed { .. }), "{code:?} accepted: {err:?}");
    }
}

#[test]
fn unknown_model_type_is_malformed() {
    let mut raw = base();
    raw.model_type = Some("markov".into());
    assert_eq!(field_of(&raw), "model_type");
}

#[test]
fn discount_rates_outside_zero_to_ten_percent_are_rejected() {
    for rate in [-0.01, 0.11, f64::NAN] {
        let mut raw = base();
        raw.discount_rate_costs = Some(rate);
        assert_eq!(field_of(&raw), "discount_rate_costs", "rate {rate} accepted");
    }
    let mut raw = base();
    raw.discount_rate_effects = Some(0.10);
    assert!(validate(&raw).is_ok(), "10% is the inclusive ceiling");
}

#[test]
fn non_positive_horizon_is_rejected() {
    for horizon in [0.0, -1.0, f64::INFINITY] {
        let mut raw = base();
        raw.time_horizon_years = Some(horizon);
        assert_eq!(field_of(&raw), "time_horizon_years");
    }
}

#[test]
fn negative_cost_points_at_the_entry() {
    let raw = base().with_parameter(RawParameterEntry::new("rescue", ParameterKind::Cost, -5.0));
    assert_eq!(field_of(&raw), "parameters[1].point_estimate");
}

#[test]
fn utilities_and_probabilities_live_in_the_unit_interval() {
    let raw = base().with_parameter(RawParameterEntry::new("u", ParameterKind::Utility, 1.2));
    assert_eq!(field_of(&raw), "parameters[1].point_estimate");

    let raw = base().with_parameter(RawParameterEntry::new("p", ParameterKind::Probability, -0.1));
    assert_eq!(field_of(&raw), "parameters[1].point_estimate");
}

#[test]
fn point_estimate_must_sit_inside_its_bounds() {
    let raw = base().with_parameter(
        RawParameterEntry::new("admin", ParameterKind::Cost, 900.0).with_bounds(100.0, 500.0),
    );
    match validate(&raw).unwrap_err() {
        ValidationError::OutOfRange { field, value, .. } => {
            assert_eq!(field, "parameters[1].point_estimate");
            assert_eq!(value, 900.0);
        }
        other => panic!("expected OutOfRange, got {other:?}"),
    }
}

#[test]
fn duplicate_names_are_rejected() {
    let raw = base().with_parameter(RawParameterEntry::new("cost", ParameterKind::Cost, 5.0));
    assert_eq!(
        validate(&raw).unwrap_err(),
        ValidationError::DuplicateParameter { name: "cost".into() }
    );
}

#[test]
fn unknown_kind_is_malformed() {
    let mut entry = RawParameterEntry::new("x", ParameterKind::Cost, 1.0);
    entry.kind = Some("price".into());
    assert_eq!(field_of(&base().with_parameter(entry)), "parameters[1].kind");
}

#[test]
fn distribution_arity_and_domains_are_checked() {
    let cases: [(&str, &[f64]); 6] = [
        ("beta", &[2.0]),
        ("normal", &[0.0, 0.0]),
        ("gamma", &[-1.0, 2.0]),
        ("triangular", &[5.0, 1.0, 10.0]),
        ("triangular", &[3.0, 3.0, 3.0]),
        ("lognormal", &[0.0, 1.0]),
    ];
    for (kind, params) in cases {
        let raw = base().with_parameter(
            RawParameterEntry::new("d", ParameterKind::Effect, 1.0).with_distribution(kind, params),
        );
        match validate(&raw).unwrap_err() {
            ValidationError::InconsistentDistribution { parameter, .. } => assert_eq!(parameter, "d"),
            other => panic!("{kind} {params:?}: expected InconsistentDistribution, got {other:?}"),
        }
    }
}

#[test]
fn valid_distributions_are_recorded() {
    let raw = base()
        .with_parameter(
            RawParameterEntry::new("u", ParameterKind::Utility, 0.7).with_distribution("beta", &[7.0, 3.0]),
        )
        .with_parameter(
            RawParameterEntry::new("t", ParameterKind::Effect, 2.0)
                .with_distribution("triangular", &[1.0, 2.0, 4.0]),
        );
    let set = validate(&raw).unwrap();
    assert!(set.has_distributions());
    assert_eq!(*set.get("u").unwrap().distribution(), Distribution::Beta { alpha: 7.0, beta: 3.0 });
    assert_eq!(
        *set.get("t").unwrap().distribution(),
        Distribution::Triangular { min: 1.0, mode: 2.0, max: 4.0 }
    );
    assert_eq!(set.summary().distributed_count, 2);
}

// ── Comparator arms ────────────────────────────────────────────────

#[test]
fn arms_may_only_override_known_parameters() {
    let set = validate(&base()).unwrap();
    let arms = ComparatorArms::new(
        ComparatorArm::new("a"),
        ComparatorArm::new("b").with_value("price", 10.0),
    );
    match set.check_arms(&arms).unwrap_err() {
        EngineError::Validation(ValidationError::UnknownParameter { arm, parameter }) => {
            assert_eq!((arm.as_str(), parameter.as_str()), ("b", "price"));
        }
        other => panic!("expected UnknownParameter, got {other:?}"),
    }
}

#[test]
fn arm_names_are_unique() {
    let set = validate(&base()).unwrap();
    let arms = ComparatorArms::new(ComparatorArm::new("same"), ComparatorArm::new("same"));
    let err = set.check_arms(&arms).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::DuplicateArm { ref name }) if name == "same"
    ));
}

#[test]
fn overrides_obey_the_kind_domain() {
    let set = validate(&base()).unwrap();
    let arms = ComparatorArms::new(
        ComparatorArm::new("a"),
        ComparatorArm::new("b").with_value("cost", -1.0),
    );
    let err = set.check_arms(&arms).unwrap_err();
    assert_eq!(err.kind(), "validation_error");
    assert!(err.is_user_correctable());
}

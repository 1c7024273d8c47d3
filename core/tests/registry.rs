//! Rule registry tests.

use hta_core::{
    error::EngineError,
    registry::{RulePredicate, RuleRegistry, RuleSet, Severity},
    types::FrameworkId,
};
use std::path::PathBuf;

const CUSTOM_V1: &str = r#"{
  "framework_id": "pbac",
  "version": "2016.1",
  "name": "PBAC (Australia)",
  "agency": "Pharmaceutical Benefits Advisory Committee",
  "country": "Australia",
  "timeline_weeks": 17,
  "rules": [
    { "id": "pbac-ev-rct", "category": "evidence", "description": "Head-to-head RCT",
      "predicate": "required_artifact_type", "params": { "artifact": { "evidence": "rct" } },
      "severity": "blocking", "remediation": "Provide a head-to-head trial", "deadline_weeks": 3 },
    { "id": "pbac-fmt-currency", "category": "format", "description": "Costs in AUD",
      "predicate": "required_value_in_set", "params": { "field": "currency", "allowed": ["AUD"] },
      "severity": "minor" }
  ]
}"#;

fn custom(version: &str) -> RuleSet {
    let mut set = RuleSet::from_json(CUSTOM_V1).expect("custom rule set");
    set.version = version.to_string();
    set
}

#[test]
fn builtin_registry_ships_six_agencies() {
    let registry = RuleRegistry::builtin().expect("builtin registry");
    let ids: Vec<String> = registry.frameworks().into_iter().map(|f| f.framework_id.to_string()).collect();
    for expected in ["nice", "g_ba", "has", "cadth", "amcp", "eunethta"] {
        assert!(ids.iter().any(|id| id == expected), "{expected} missing from {ids:?}");
    }
    assert_eq!(ids.len(), 6);
}

#[test]
fn builtin_registry_is_shared() {
    let a = RuleRegistry::builtin().unwrap();
    let b = RuleRegistry::builtin().unwrap();
    assert!(std::ptr::eq(a, b), "builtin registry was built twice");
}

#[test]
fn every_builtin_framework_requires_some_blocking_rule() {
    let registry = RuleRegistry::builtin().unwrap();
    for summary in registry.frameworks() {
        let rules = registry.rules_for(&summary.framework_id).unwrap();
        assert_eq!(rules.len(), summary.rule_count);
        assert!(
            rules.iter().any(|r| r.severity == Severity::Blocking),
            "{} has no blocking rule",
            summary.framework_id
        );
    }
}

#[test]
fn nice_leads_with_the_rct_requirement() {
    let registry = RuleRegistry::builtin().unwrap();
    let rules = registry.rules_for(&FrameworkId::from("nice")).unwrap();
    assert_eq!(rules[0].id, "nice-ev-rct");
    assert_eq!(rules[0].severity, Severity::Blocking);
    assert!(matches!(rules[0].predicate, RulePredicate::RequiredArtifactType { .. }));
}

#[test]
fn unknown_framework_is_an_error() {
    let registry = RuleRegistry::builtin().unwrap();
    let err = registry.rules_for(&FrameworkId::from("xyz")).unwrap_err();
    match err {
        EngineError::UnknownFramework { framework_id } => assert_eq!(framework_id, "xyz"),
        other => panic!("expected UnknownFramework, got {other:?}"),
    }
}

#[test]
fn republishing_a_version_is_rejected() {
    let mut registry = RuleRegistry::empty();
    registry.register(custom("2016.1")).unwrap();
    let err = registry.register(custom("2016.1")).unwrap_err();
    assert_eq!(err.kind(), "rule_set_already_published");

    // The original stays in place.
    let rules = registry.rules_for(&FrameworkId::from("pbac")).unwrap();
    assert_eq!(rules.len(), 2);
}

#[test]
fn newest_version_is_latest_and_old_versions_stay_pinned() {
    let mut registry = RuleRegistry::empty();
    let v1 = registry.register(custom("2016.1")).unwrap();
    let mut newer = custom("2024.1");
    newer.rules.truncate(1);
    registry.register(newer).unwrap();

    let id = FrameworkId::from("pbac");
    assert_eq!(registry.rule_set(&id, None).unwrap().version, "2024.1");
    assert_eq!(registry.rules_for(&id).unwrap().len(), 1);

    let pinned = registry.rule_set(&id, Some("2016.1")).unwrap();
    assert!(std::sync::Arc::ptr_eq(&pinned, &v1), "pinned lookup returned a copy");
    assert_eq!(pinned.rules.len(), 2);

    let err = registry.rule_set(&id, Some("1999.1")).unwrap_err();
    assert_eq!(err.kind(), "unknown_rule_set_version");
}

#[test]
fn unknown_predicate_is_a_fatal_config_error() {
    let json = CUSTOM_V1.replace("required_value_in_set", "required_colour");
    match RuleSet::from_json(&json).unwrap_err() {
        EngineError::UnknownRulePredicate { rule_id, predicate } => {
            assert_eq!(rule_id, "pbac-fmt-currency");
            assert_eq!(predicate, "required_colour");
        }
        other => panic!("expected UnknownRulePredicate, got {other:?}"),
    }
}

#[test]
fn duplicate_rule_ids_are_misconfigured() {
    let json = CUSTOM_V1.replace("pbac-fmt-currency", "pbac-ev-rct");
    let err = RuleSet::from_json(&json).unwrap_err();
    assert_eq!(err.kind(), "rule_misconfigured");
    assert!(!err.is_user_correctable());
}

#[test]
fn submission_timeline_is_sorted_by_week() {
    let registry = RuleRegistry::builtin().unwrap();
    let timeline = registry.submission_timeline(&FrameworkId::from("nice")).unwrap();

    assert_eq!(timeline.total_weeks, 32);
    assert_eq!(timeline.milestones.first().map(|m| m.phase.as_str()), Some("preparation"));
    assert_eq!(timeline.milestones.last().map(|m| m.phase.as_str()), Some("final_decision"));
    let review = timeline.milestones.iter().find(|m| m.phase == "agency_review").unwrap();
    assert_eq!(review.week, 24);
    for pair in timeline.milestones.windows(2) {
        assert!(pair[0].week <= pair[1].week, "milestones out of order");
    }
}

#[test]
fn load_dir_reads_json_rule_sets_in_name_order() {
    let dir: PathBuf = std::env::temp_dir().join(format!("hta-rules-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("a_pbac_2016.json"), CUSTOM_V1).unwrap();
    std::fs::write(dir.join("b_pbac_2024.json"), CUSTOM_V1.replace("2016.1", "2024.1")).unwrap();
    std::fs::write(dir.join("notes.txt"), "not a rule set").unwrap();

    let registry = RuleRegistry::load_dir(&dir).expect("load rule directory");
    let id = FrameworkId::from("pbac");
    assert_eq!(registry.rule_set(&id, None).unwrap().version, "2024.1");
    assert!(registry.rule_set(&id, Some("2016.1")).is_ok());
    assert_eq!(registry.frameworks().len(), 1);

    let extended = RuleRegistry::builtin_with_dir(&dir).unwrap();
    assert_eq!(extended.frameworks().len(), 7);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_rule_directory_is_reported() {
    let err = RuleRegistry::load_dir(std::path::Path::new("/definitely/not/here")).unwrap_err();
    assert_eq!(err.kind(), "other");
}

//! Compliance evaluator — one rule set against one dossier snapshot.
//!
//! RULES:
//!   - Outcomes follow the rule set's declared order, never re-sorted.
//!   - Messages carry no timestamps or other run-dependent text, so two
//!     reports over the same inputs are byte-identical.
//!   - Any failed blocking rule makes the dossier `non_compliant`.

use crate::{
    evidence::RiskOfBias,
    registry::{ArtifactType, Comparator, FrameworkRule, RuleCategory, RulePredicate, RuleSet, Severity},
    snapshot::{DossierField, DossierSnapshot, FieldValue},
    types::{Dominance, FrameworkId, DEGENERACY_EPSILON},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Compliant,
    MinorIssues,
    NonCompliant,
}

impl OverallStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Compliant    => "compliant",
            Self::MinorIssues  => "minor_issues",
            Self::NonCompliant => "non_compliant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule_id:     String,
    pub category:    RuleCategory,
    pub passed:      bool,
    pub severity:    Severity,
    pub message:     String,
    pub remediation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub dossier_id:       String,
    pub framework_id:     FrameworkId,
    pub rule_set_version: String,
    pub outcomes:         Vec<RuleOutcome>,
    pub overall_status:   OverallStatus,
    /// Share of passed rules, 0–100, one decimal place.
    pub compliance_score: f64,
    pub recommendations:  Vec<String>,
}

impl ComplianceReport {
    pub fn failed(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    pub fn blocking_failures(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.failed().filter(|o| o.severity == Severity::Blocking)
    }

    pub fn outcome(&self, rule_id: &str) -> Option<&RuleOutcome> {
        self.outcomes.iter().find(|o| o.rule_id == rule_id)
    }
}

pub fn evaluate(snapshot: &DossierSnapshot, rule_set: &RuleSet) -> ComplianceReport {
    let outcomes: Vec<RuleOutcome> = rule_set
        .rules
        .iter()
        .map(|rule| evaluate_rule(snapshot, rule))
        .collect();

    let overall_status = overall_status(&outcomes);
    let compliance_score = compliance_score(&outcomes);
    let recommendations = outcomes
        .iter()
        .filter(|o| !o.passed)
        .filter_map(|o| {
            o.remediation.as_ref().map(|r| match o.severity {
                Severity::Blocking => format!("Critical: {r}"),
                _ => r.clone(),
            })
        })
        .collect();

    log::debug!(
        "compliance {} against {} {}: {} ({} of {} rules passed)",
        snapshot.dossier_id,
        rule_set.framework_id,
        rule_set.version,
        overall_status.name(),
        outcomes.iter().filter(|o| o.passed).count(),
        outcomes.len()
    );

    ComplianceReport {
        dossier_id: snapshot.dossier_id.clone(),
        framework_id: rule_set.framework_id.clone(),
        rule_set_version: rule_set.version.clone(),
        outcomes,
        overall_status,
        compliance_score,
        recommendations,
    }
}

pub fn overall_status(outcomes: &[RuleOutcome]) -> OverallStatus {
    if outcomes.iter().any(|o| !o.passed && o.severity == Severity::Blocking) {
        OverallStatus::NonCompliant
    } else if outcomes.iter().any(|o| !o.passed) {
        OverallStatus::MinorIssues
    } else {
        OverallStatus::Compliant
    }
}

fn compliance_score(outcomes: &[RuleOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 100.0;
    }
    let passed = outcomes.iter().filter(|o| o.passed).count() as f64;
    (passed / outcomes.len() as f64 * 1000.0).round() / 10.0
}

fn evaluate_rule(snapshot: &DossierSnapshot, rule: &FrameworkRule) -> RuleOutcome {
    let (passed, message) = match &rule.predicate {
        RulePredicate::RequiredFieldPresent { field } => field_present(snapshot, *field),
        RulePredicate::RequiredValueInSet { field, allowed } => value_in_set(snapshot, *field, allowed),
        RulePredicate::NumericThreshold { field, comparator, value } => {
            numeric_threshold(snapshot, *field, *comparator, *value)
        }
        RulePredicate::RequiredArtifactType { artifact, min_count, max_risk_of_bias, min_sample_size } => {
            artifact_present(snapshot, artifact, *min_count, *max_risk_of_bias, *min_sample_size)
        }
    };
    RuleOutcome {
        rule_id: rule.id.clone(),
        category: rule.category,
        passed,
        severity: rule.severity,
        message,
        remediation: rule.remediation.clone(),
    }
}

// ── Predicates ─────────────────────────────────────────────────────

fn field_present(snapshot: &DossierSnapshot, field: DossierField) -> (bool, String) {
    match field.resolve(snapshot) {
        FieldValue::Absent => (false, format!("{} is missing", field.name())),
        _ => (true, format!("{} is present", field.name())),
    }
}

/// Case-insensitive: agency codes are matched regardless of how the
/// dossier author capitalised them.
fn value_in_set(snapshot: &DossierSnapshot, field: DossierField, allowed: &[String]) -> (bool, String) {
    let options = allowed.join(", ");
    match field.resolve(snapshot) {
        FieldValue::Text(value) => {
            if allowed.iter().any(|a| a.eq_ignore_ascii_case(&value)) {
                (true, format!("{} '{}' is accepted", field.name(), value))
            } else {
                (false, format!("{} '{}' is not one of [{}]", field.name(), value, options))
            }
        }
        FieldValue::Absent => (false, format!("{} is missing; expected one of [{}]", field.name(), options)),
        other => (false, format!("{} has no text value ({other:?})", field.name())),
    }
}

fn numeric_threshold(
    snapshot: &DossierSnapshot,
    field: DossierField,
    comparator: Comparator,
    threshold: f64,
) -> (bool, String) {
    let requirement = format!("{} {} {}", field.name(), comparator.symbol(), threshold);
    match field.resolve(snapshot) {
        FieldValue::Number(value) => {
            let passed = match comparator {
                Comparator::Le => value <= threshold,
                Comparator::Ge => value >= threshold,
                Comparator::Eq => (value - threshold).abs() < DEGENERACY_EPSILON,
            };
            let verdict = if passed { "meets" } else { "fails" };
            (passed, format!("{} is {}; {} {}", field.name(), value, verdict, requirement))
        }
        FieldValue::UndefinedIcer(dominance) => {
            let passed = comparator == Comparator::Le && dominance == Dominance::Dominant;
            let verdict = if passed { "meets" } else { "fails" };
            (
                passed,
                format!("{} is undefined (intervention {}); {} {}", field.name(), dominance.name(), verdict, requirement),
            )
        }
        FieldValue::LessEffectiveIcer { icer, dominance } => {
            let quadrant = dominance.map_or("cheaper but less effective", |d| d.name());
            (
                false,
                format!("{} is {} (intervention {}); fails {}", field.name(), icer, quadrant, requirement),
            )
        }
        FieldValue::Absent => (false, format!("{} is not available; requires {}", field.name(), requirement)),
        other => (false, format!("{} is not numeric ({other:?})", field.name())),
    }
}

fn artifact_present(
    snapshot: &DossierSnapshot,
    artifact: &ArtifactType,
    min_count: usize,
    max_risk_of_bias: Option<RiskOfBias>,
    min_sample_size: Option<u64>,
) -> (bool, String) {
    match artifact {
        ArtifactType::Evidence(kind) => {
            let found = snapshot
                .evidence
                .iter()
                .filter(|e| e.evidence_type == *kind)
                .filter(|e| max_risk_of_bias.map_or(true, |max| e.risk_of_bias <= max))
                .filter(|e| min_sample_size.map_or(true, |min| e.sample_size >= min))
                .count();

            let mut qualifier = String::new();
            if let Some(max) = max_risk_of_bias {
                qualifier.push_str(&format!(", risk of bias <= {}", max.name()));
            }
            if let Some(min) = min_sample_size {
                qualifier.push_str(&format!(", sample size >= {min}"));
            }
            (
                found >= min_count,
                format!("found {} {} item(s); required {}{}", found, kind.name(), min_count, qualifier),
            )
        }
        ArtifactType::EconomicModel(model) => {
            let declared = snapshot.declared_model_types();
            if declared.contains(model) {
                (true, format!("{} model provided", model.name()))
            } else {
                (false, format!("no {} model provided", model.name()))
            }
        }
    }
}

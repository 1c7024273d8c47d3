//! Dossier snapshot — the read-only projection the compliance evaluator sees.
//!
//! A snapshot captures the evidence list, the latest economic artifacts and
//! descriptive metadata of one dossier. The engine never mutates it; rules
//! address its contents through the fixed `DossierField` vocabulary.

use crate::{
    budget_impact::BudgetImpactResult,
    calculator::EconomicResult,
    evidence::{assess_quality, EvidenceItem, RiskOfBias},
    parameters::ParameterSummary,
    sensitivity::{OneWayRun, ProbabilisticRun, SensitivityRun},
    types::{Dominance, DossierId, ModelType},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DossierMetadata {
    pub indication:        Option<String>,
    pub therapeutic_area:  Option<String>,
    /// Comparator therapy named in the submission.
    pub comparator:        Option<String>,
    /// Costing perspective (`nhs_pss`, `societal`, `payer`, …).
    pub perspective:       Option<String>,
    pub submission_type:   Option<String>,
    pub target_population: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicArtifacts {
    pub parameters:      Option<ParameterSummary>,
    pub result:          Option<EconomicResult>,
    pub one_way:         Option<OneWayRun>,
    pub probabilistic:   Option<ProbabilisticRun>,
    pub budget_impact:   Option<BudgetImpactResult>,
    /// Model types the dossier contains beyond the primary parameter set.
    pub declared_models: Vec<ModelType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DossierSnapshot {
    pub dossier_id: DossierId,
    #[serde(default)]
    pub metadata:   DossierMetadata,
    #[serde(default)]
    pub evidence:   Vec<EvidenceItem>,
    #[serde(default)]
    pub economics:  EconomicArtifacts,
}

impl DossierSnapshot {
    pub fn new(dossier_id: &str) -> Self {
        Self {
            dossier_id: dossier_id.to_string(),
            metadata:   DossierMetadata::default(),
            evidence:   Vec::new(),
            economics:  EconomicArtifacts::default(),
        }
    }

    pub fn with_evidence(mut self, item: EvidenceItem) -> Self {
        self.evidence.push(item);
        self
    }

    /// Attach a sensitivity run to the matching artifact slot.
    pub fn with_sensitivity(mut self, run: SensitivityRun) -> Self {
        match run {
            SensitivityRun::OneWay(r)        => self.economics.one_way = Some(r),
            SensitivityRun::Probabilistic(r) => self.economics.probabilistic = Some(r),
        }
        self
    }

    /// Every economic model type the dossier can show.
    pub fn declared_model_types(&self) -> BTreeSet<ModelType> {
        let mut models: BTreeSet<ModelType> = self.economics.declared_models.iter().copied().collect();
        if let Some(p) = &self.economics.parameters {
            models.insert(p.model_type);
        }
        if let Some(r) = &self.economics.result {
            models.insert(r.model_type);
        }
        if self.economics.budget_impact.is_some() {
            models.insert(ModelType::BudgetImpact);
        }
        models
    }

    pub fn mean_evidence_quality(&self) -> Option<f64> {
        if self.evidence.is_empty() {
            return None;
        }
        let total: f64 = self.evidence.iter().map(|e| assess_quality(e).overall_score).sum();
        Some(total / self.evidence.len() as f64)
    }
}

// ── Field vocabulary ───────────────────────────────────────────────

/// Named snapshot fields that rules may inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DossierField {
    // text
    Indication,
    TherapeuticArea,
    Comparator,
    Perspective,
    SubmissionType,
    Currency,
    ModelType,
    // numeric
    TargetPopulation,
    TimeHorizonYears,
    DiscountRateCosts,
    DiscountRateEffects,
    Icer,
    IncrementalCost,
    IncrementalEffect,
    ProbabilisticSamples,
    ProbabilityCostEffective,
    EvidenceCount,
    TotalEvidenceSampleSize,
    MaxEvidenceSampleSize,
    HighRiskOfBiasCount,
    MeanEvidenceQuality,
    // artifacts
    EconomicResult,
    OneWaySensitivity,
    ProbabilisticSensitivity,
    BudgetImpact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Numeric,
    Artifact,
}

/// A resolved field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Absent,
    Text(String),
    Number(f64),
    Artifact,
    /// The ICER field when the incremental effect is zero.
    UndefinedIcer(Dominance),
    /// A defined ICER where the intervention is less effective than the
    /// comparator. The ratio is not a price per unit of effect gained.
    LessEffectiveIcer { icer: f64, dominance: Option<Dominance> },
}

impl DossierField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Indication               => "indication",
            Self::TherapeuticArea          => "therapeutic_area",
            Self::Comparator               => "comparator",
            Self::Perspective              => "perspective",
            Self::SubmissionType           => "submission_type",
            Self::Currency                 => "currency",
            Self::ModelType                => "model_type",
            Self::TargetPopulation         => "target_population",
            Self::TimeHorizonYears         => "time_horizon_years",
            Self::DiscountRateCosts        => "discount_rate_costs",
            Self::DiscountRateEffects      => "discount_rate_effects",
            Self::Icer                     => "icer",
            Self::IncrementalCost          => "incremental_cost",
            Self::IncrementalEffect        => "incremental_effect",
            Self::ProbabilisticSamples     => "probabilistic_samples",
            Self::ProbabilityCostEffective => "probability_cost_effective",
            Self::EvidenceCount            => "evidence_count",
            Self::TotalEvidenceSampleSize  => "total_evidence_sample_size",
            Self::MaxEvidenceSampleSize    => "max_evidence_sample_size",
            Self::HighRiskOfBiasCount      => "high_risk_of_bias_count",
            Self::MeanEvidenceQuality      => "mean_evidence_quality",
            Self::EconomicResult           => "economic_result",
            Self::OneWaySensitivity        => "one_way_sensitivity",
            Self::ProbabilisticSensitivity => "probabilistic_sensitivity",
            Self::BudgetImpact             => "budget_impact",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Indication
            | Self::TherapeuticArea
            | Self::Comparator
            | Self::Perspective
            | Self::SubmissionType
            | Self::Currency
            | Self::ModelType => FieldKind::Text,
            Self::EconomicResult
            | Self::OneWaySensitivity
            | Self::ProbabilisticSensitivity
            | Self::BudgetImpact => FieldKind::Artifact,
            _ => FieldKind::Numeric,
        }
    }

    pub fn resolve(&self, snapshot: &DossierSnapshot) -> FieldValue {
        let meta = &snapshot.metadata;
        let econ = &snapshot.economics;
        let text = |v: &Option<String>| match v {
            Some(s) if !s.trim().is_empty() => FieldValue::Text(s.clone()),
            _ => FieldValue::Absent,
        };
        let number = |v: Option<f64>| v.map_or(FieldValue::Absent, FieldValue::Number);
        let artifact = |present: bool| if present { FieldValue::Artifact } else { FieldValue::Absent };
        let evidence = &snapshot.evidence;

        match self {
            Self::Indication      => text(&meta.indication),
            Self::TherapeuticArea => text(&meta.therapeutic_area),
            Self::Comparator      => text(&meta.comparator),
            Self::Perspective     => text(&meta.perspective),
            Self::SubmissionType  => text(&meta.submission_type),
            Self::Currency => text(
                &econ.parameters.as_ref().map(|p| p.currency.clone())
                    .or_else(|| econ.result.as_ref().map(|r| r.currency.clone())),
            ),
            Self::ModelType => text(
                &econ.parameters.as_ref().map(|p| p.model_type.name().to_string())
                    .or_else(|| econ.result.as_ref().map(|r| r.model_type.name().to_string())),
            ),

            Self::TargetPopulation    => number(meta.target_population),
            Self::TimeHorizonYears    => number(econ.parameters.as_ref().map(|p| p.time_horizon_years)),
            Self::DiscountRateCosts   => number(econ.parameters.as_ref().map(|p| p.discount_rate_costs)),
            Self::DiscountRateEffects => number(econ.parameters.as_ref().map(|p| p.discount_rate_effects)),
            Self::Icer => match &econ.result {
                None => FieldValue::Absent,
                Some(r) => match r.icer {
                    Some(icer) if r.incremental_effect < 0.0 => {
                        FieldValue::LessEffectiveIcer { icer, dominance: r.dominance }
                    }
                    Some(icer) => FieldValue::Number(icer),
                    None => FieldValue::UndefinedIcer(r.dominance.unwrap_or(Dominance::Indifferent)),
                },
            },
            Self::IncrementalCost   => number(econ.result.as_ref().map(|r| r.incremental_cost)),
            Self::IncrementalEffect => number(econ.result.as_ref().map(|r| r.incremental_effect)),
            Self::ProbabilisticSamples => {
                number(econ.probabilistic.as_ref().map(|p| p.n_samples as f64))
            }
            Self::ProbabilityCostEffective => {
                number(econ.probabilistic.as_ref().map(|p| p.summary.probability_cost_effective))
            }

            Self::EvidenceCount => FieldValue::Number(evidence.len() as f64),
            Self::TotalEvidenceSampleSize => {
                FieldValue::Number(evidence.iter().map(|e| e.sample_size as f64).sum())
            }
            Self::MaxEvidenceSampleSize => {
                number(evidence.iter().map(|e| e.sample_size).max().map(|n| n as f64))
            }
            Self::HighRiskOfBiasCount => FieldValue::Number(
                evidence.iter().filter(|e| e.risk_of_bias == RiskOfBias::High).count() as f64,
            ),
            Self::MeanEvidenceQuality => number(snapshot.mean_evidence_quality()),

            Self::EconomicResult           => artifact(econ.result.is_some()),
            Self::OneWaySensitivity        => artifact(econ.one_way.is_some()),
            Self::ProbabilisticSensitivity => artifact(econ.probabilistic.is_some()),
            Self::BudgetImpact             => artifact(econ.budget_impact.is_some()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceType;

    #[test]
    fn empty_snapshot_resolves_counts_to_zero_and_text_to_absent() {
        let snap = DossierSnapshot::new("d-1");
        assert_eq!(DossierField::EvidenceCount.resolve(&snap), FieldValue::Number(0.0));
        assert_eq!(DossierField::Indication.resolve(&snap), FieldValue::Absent);
        assert_eq!(DossierField::MeanEvidenceQuality.resolve(&snap), FieldValue::Absent);
        assert_eq!(DossierField::Icer.resolve(&snap), FieldValue::Absent);
    }

    #[test]
    fn blank_text_counts_as_absent() {
        let mut snap = DossierSnapshot::new("d-2");
        snap.metadata.indication = Some("   ".into());
        assert_eq!(DossierField::Indication.resolve(&snap), FieldValue::Absent);
    }

    #[test]
    fn evidence_aggregates() {
        let snap = DossierSnapshot::new("d-3")
            .with_evidence(EvidenceItem::new("a", EvidenceType::Rct, RiskOfBias::Low, 300))
            .with_evidence(EvidenceItem::new("b", EvidenceType::Cohort, RiskOfBias::High, 900));
        assert_eq!(DossierField::TotalEvidenceSampleSize.resolve(&snap), FieldValue::Number(1200.0));
        assert_eq!(DossierField::MaxEvidenceSampleSize.resolve(&snap), FieldValue::Number(900.0));
        assert_eq!(DossierField::HighRiskOfBiasCount.resolve(&snap), FieldValue::Number(1.0));
    }
}

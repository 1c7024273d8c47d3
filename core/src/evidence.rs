//! Clinical evidence items and their quality assessment.
//!
//! Risk of bias is an externally supplied categorical judgement; the
//! engine does not derive it. The quality score combines four weighted
//! criteria on a 1–5 scale:
//!
//!   study design 0.3 · sample size 0.2 · risk of bias 0.3 · publication 0.2

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Rct,
    SystematicReview,
    MetaAnalysis,
    Cohort,
    CaseControl,
    CrossSectional,
    CaseSeries,
    RealWorldEvidence,
    IndirectComparison,
    PatientReportedOutcome,
}

impl EvidenceType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rct                    => "rct",
            Self::SystematicReview       => "systematic_review",
            Self::MetaAnalysis           => "meta_analysis",
            Self::Cohort                 => "cohort",
            Self::CaseControl            => "case_control",
            Self::CrossSectional         => "cross_sectional",
            Self::CaseSeries             => "case_series",
            Self::RealWorldEvidence      => "real_world_evidence",
            Self::IndirectComparison     => "indirect_comparison",
            Self::PatientReportedOutcome => "patient_reported_outcome",
        }
    }

    fn design_score(&self) -> u8 {
        match self {
            Self::Rct | Self::SystematicReview | Self::MetaAnalysis => 5,
            Self::Cohort => 4,
            Self::CaseControl | Self::IndirectComparison | Self::RealWorldEvidence => 3,
            Self::CrossSectional | Self::PatientReportedOutcome => 2,
            Self::CaseSeries => 1,
        }
    }
}

/// Ordered from least to most concerning; `Unclear` ranks worst so it
/// never satisfies a risk-of-bias ceiling short of `unclear` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskOfBias {
    Low,
    Moderate,
    High,
    Unclear,
}

impl RiskOfBias {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Low      => "low",
            Self::Moderate => "moderate",
            Self::High     => "high",
            Self::Unclear  => "unclear",
        }
    }

    fn score(&self) -> u8 {
        match self {
            Self::Low      => 5,
            Self::Moderate => 3,
            Self::Unclear  => 2,
            Self::High     => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id:            String,
    pub evidence_type: EvidenceType,
    pub risk_of_bias:  RiskOfBias,
    #[serde(default)]
    pub sample_size:   u64,
    #[serde(default)]
    pub published:     bool,
}

impl EvidenceItem {
    pub fn new(id: &str, evidence_type: EvidenceType, risk_of_bias: RiskOfBias, sample_size: u64) -> Self {
        Self {
            id: id.to_string(),
            evidence_type,
            risk_of_bias,
            sample_size,
            published: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    pub score:     u8,
    pub weight:    f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub evidence_id:     String,
    /// Weighted score as a percentage of the maximum, one decimal place.
    pub overall_score:   f64,
    pub raw_score:       u8,
    pub criteria:        Vec<CriterionScore>,
    pub recommendations: Vec<String>,
}

const MAX_CRITERION_SCORE: f64 = 5.0;

fn sample_size_score(n: u64) -> u8 {
    match n {
        1000..=u64::MAX => 5,
        500..=999 => 4,
        100..=499 => 3,
        50..=99 => 2,
        _ => 1,
    }
}

pub fn assess_quality(item: &EvidenceItem) -> QualityAssessment {
    let design = item.evidence_type.design_score();
    let size = sample_size_score(item.sample_size);
    let bias = item.risk_of_bias.score();
    let publication = if item.published { 3 } else { 1 };

    let criteria = vec![
        CriterionScore { criterion: "study_design".into(),       score: design,      weight: 0.3 },
        CriterionScore { criterion: "sample_size".into(),        score: size,        weight: 0.2 },
        CriterionScore { criterion: "risk_of_bias".into(),       score: bias,        weight: 0.3 },
        CriterionScore { criterion: "publication_status".into(), score: publication, weight: 0.2 },
    ];

    let weighted: f64 = criteria.iter().map(|c| c.score as f64 * c.weight).sum();
    let max_weighted: f64 = criteria.iter().map(|c| MAX_CRITERION_SCORE * c.weight).sum();
    let overall_score = (weighted / max_weighted * 1000.0).round() / 10.0;

    let mut recommendations = Vec::new();
    if design < 4 {
        recommendations.push(
            "Consider supplementing with higher-quality study designs (RCT or cohort studies)".to_string(),
        );
    }
    if size < 3 {
        recommendations.push(
            "Seek additional studies with larger sample sizes to strengthen evidence".to_string(),
        );
    }
    if bias < 4 {
        recommendations.push(
            "Look for studies with lower risk of bias or conduct bias assessment".to_string(),
        );
    }
    if publication < 3 {
        recommendations.push("Prioritize peer-reviewed published studies when available".to_string());
    }

    QualityAssessment {
        evidence_id: item.id.clone(),
        overall_score,
        raw_score: design + size + bias + publication,
        criteria,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_low_bias_published_rct_scores_top_band() {
        let item = EvidenceItem::new("ev-1", EvidenceType::Rct, RiskOfBias::Low, 1200);
        let qa = assess_quality(&item);
        // 5·0.3 + 5·0.2 + 5·0.3 + 3·0.2 = 4.6 of 5.0
        assert!((qa.overall_score - 92.0).abs() < 1e-9, "got {}", qa.overall_score);
        assert_eq!(qa.raw_score, 18);
        assert!(qa.recommendations.is_empty());
    }

    #[test]
    fn weak_evidence_collects_every_recommendation() {
        let mut item = EvidenceItem::new("ev-2", EvidenceType::CaseSeries, RiskOfBias::High, 20);
        item.published = false;
        let qa = assess_quality(&item);
        // 1·0.3 + 1·0.2 + 1·0.3 + 1·0.2 = 1.0 of 5.0
        assert!((qa.overall_score - 20.0).abs() < 1e-9);
        assert_eq!(qa.recommendations.len(), 4);
    }

    #[test]
    fn unclear_bias_ranks_above_high() {
        assert!(RiskOfBias::Unclear > RiskOfBias::High);
        assert!(RiskOfBias::Low < RiskOfBias::Moderate);
    }
}

//! The engine facade — the one entry point callers use.
//!
//! PIPELINE (assess_dossier, fixed order):
//!   1. Resolve the framework rule set   (fail fast on unknown framework)
//!   2. Validate economic parameters and comparator arms
//!   3. Compute the base-case economic result
//!   4. One-way sensitivity
//!   5. Probabilistic sensitivity       (optional, budget-checked first)
//!   6. Budget impact                   (optional)
//!   7. Project the dossier snapshot and evaluate compliance
//!
//! RULES:
//!   - The facade owns limits; the components below it stay pure.
//!   - Probabilistic runs are refused up front when they would exceed the
//!     sample or wall-clock budget. Nothing is cancelled mid-run.
//!   - The engine persists nothing. Recording assessments is the caller's job.

use crate::{
    budget_impact::{budget_impact, BudgetImpactConfig, BudgetImpactResult},
    calculator::{compute, EconomicResult},
    compliance::{evaluate, ComplianceReport},
    config::EngineConfig,
    error::{EngineError, EngineResult},
    evidence::{assess_quality, EvidenceItem, QualityAssessment},
    parameters::{validate, ComparatorArms, EconomicParameterSet, ParameterSummary, RawParameterSet},
    registry::{FrameworkSummary, RuleRegistry, SubmissionTimeline},
    sensitivity::{
        run_one_way_over, run_probabilistic, OneWayRun, ProbabilisticConfig, ProbabilisticRun,
        SensitivityRun,
    },
    snapshot::{DossierMetadata, DossierSnapshot, EconomicArtifacts},
    types::{DossierId, FrameworkId, ModelType},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SensitivityRequest {
    OneWay {
        #[serde(default)]
        variation_pct: Option<f64>,
        /// Vary only these parameters; all of them when absent.
        #[serde(default)]
        parameters:    Option<Vec<String>>,
    },
    Probabilistic {
        n_samples:     usize,
        #[serde(default)]
        wtp_threshold: Option<f64>,
        seed:          u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilisticRequest {
    pub n_samples:     usize,
    #[serde(default)]
    pub wtp_threshold: Option<f64>,
    pub seed:          u64,
}

/// Everything needed to assess one dossier against one framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DossierRequest {
    pub dossier_id:       DossierId,
    pub framework_id:     FrameworkId,
    /// Pin a historic rule-set version; latest when absent.
    #[serde(default)]
    pub rule_set_version: Option<String>,
    #[serde(default)]
    pub metadata:         DossierMetadata,
    #[serde(default)]
    pub evidence:         Vec<EvidenceItem>,
    pub parameters:       RawParameterSet,
    pub arms:             ComparatorArms,
    #[serde(default)]
    pub variation_pct:    Option<f64>,
    /// Restrict the tornado to these parameters.
    #[serde(default)]
    pub one_way_parameters: Option<Vec<String>>,
    #[serde(default)]
    pub probabilistic:    Option<ProbabilisticRequest>,
    #[serde(default)]
    pub budget_impact:    Option<BudgetImpactConfig>,
    #[serde(default)]
    pub declared_models:  Vec<ModelType>,
}

/// Consolidated output of `assess_dossier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DossierAssessment {
    pub dossier_id:       DossierId,
    pub framework_id:     FrameworkId,
    pub rule_set_version: String,
    pub parameters:       ParameterSummary,
    pub economics:        EconomicResult,
    pub one_way:          OneWayRun,
    pub probabilistic:    Option<ProbabilisticRun>,
    pub budget_impact:    Option<BudgetImpactResult>,
    pub evidence_quality: Vec<QualityAssessment>,
    pub compliance:       ComplianceReport,
}

pub struct Engine {
    config:   EngineConfig,
    registry: &'static RuleRegistry,
}

impl Engine {
    /// Fails with `Other` when the config's limits are inconsistent.
    pub fn new(config: EngineConfig, registry: &'static RuleRegistry) -> EngineResult<Self> {
        config.check()?;
        Ok(Self { config, registry })
    }

    /// Default limits and the builtin agency rule sets.
    pub fn with_defaults() -> EngineResult<Self> {
        Self::new(EngineConfig::default(), RuleRegistry::builtin()?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &'static RuleRegistry {
        self.registry
    }

    // ── Entry points ───────────────────────────────────────────────

    pub fn validate_parameters(&self, raw: &RawParameterSet) -> EngineResult<EconomicParameterSet> {
        Ok(validate(raw)?)
    }

    pub fn compute_economics(
        &self,
        set: &EconomicParameterSet,
        arms: &ComparatorArms,
    ) -> EngineResult<EconomicResult> {
        set.check_arms(arms)?;
        let result = compute(set, arms);
        log::debug!(
            "economics: Δcost={:.2} Δeffect={:.4} icer={:?} dominance={:?}",
            result.incremental_cost,
            result.incremental_effect,
            result.icer,
            result.dominance
        );
        Ok(result)
    }

    pub fn run_sensitivity(
        &self,
        set: &EconomicParameterSet,
        arms: &ComparatorArms,
        request: &SensitivityRequest,
    ) -> EngineResult<SensitivityRun> {
        set.check_arms(arms)?;
        match request {
            SensitivityRequest::OneWay { variation_pct, parameters } => {
                let pct = variation_pct.unwrap_or(self.config.default_variation_pct);
                run_one_way_over(set, arms, pct, parameters.as_deref()).map(SensitivityRun::OneWay)
            }
            SensitivityRequest::Probabilistic { n_samples, wtp_threshold, seed } => {
                let wtp = wtp_threshold.unwrap_or(self.config.default_wtp_threshold);
                self.probabilistic(set, arms, *n_samples, wtp, *seed)
                    .map(SensitivityRun::Probabilistic)
            }
        }
    }

    /// Evaluate against the latest rule set of `framework_id`.
    pub fn evaluate_compliance(
        &self,
        snapshot: &DossierSnapshot,
        framework_id: &FrameworkId,
    ) -> EngineResult<ComplianceReport> {
        self.evaluate_compliance_pinned(snapshot, framework_id, None)
    }

    /// Evaluate against a specific published rule-set version.
    pub fn evaluate_compliance_pinned(
        &self,
        snapshot: &DossierSnapshot,
        framework_id: &FrameworkId,
        version: Option<&str>,
    ) -> EngineResult<ComplianceReport> {
        let rule_set = self.registry.rule_set(framework_id, version)?;
        Ok(evaluate(snapshot, &rule_set))
    }

    pub fn list_frameworks(&self) -> Vec<FrameworkSummary> {
        self.registry.frameworks()
    }

    pub fn submission_timeline(&self, framework_id: &FrameworkId) -> EngineResult<SubmissionTimeline> {
        self.registry.submission_timeline(framework_id)
    }

    // ── Orchestration ──────────────────────────────────────────────

    pub fn assess_dossier(&self, request: &DossierRequest) -> EngineResult<DossierAssessment> {
        let rule_set = self
            .registry
            .rule_set(&request.framework_id, request.rule_set_version.as_deref())?;

        let set = self.validate_parameters(&request.parameters)?;
        let economics = self.compute_economics(&set, &request.arms)?;

        let variation_pct = request.variation_pct.unwrap_or(self.config.default_variation_pct);
        let one_way = run_one_way_over(
            &set,
            &request.arms,
            variation_pct,
            request.one_way_parameters.as_deref(),
        )?;

        let probabilistic = match &request.probabilistic {
            Some(p) => {
                let wtp = p
                    .wtp_threshold
                    .unwrap_or_else(|| self.config.wtp_for(&request.framework_id));
                Some(self.probabilistic(&set, &request.arms, p.n_samples, wtp, p.seed)?)
            }
            None => None,
        };

        let budget_impact = match &request.budget_impact {
            Some(config) => Some(budget_impact(&set, &request.arms, config)?),
            None => None,
        };

        let snapshot = DossierSnapshot {
            dossier_id: request.dossier_id.clone(),
            metadata:   request.metadata.clone(),
            evidence:   request.evidence.clone(),
            economics:  EconomicArtifacts {
                parameters:      Some(set.summary()),
                result:          Some(economics.clone()),
                one_way:         Some(one_way.clone()),
                probabilistic:   probabilistic.clone(),
                budget_impact:   budget_impact.clone(),
                declared_models: request.declared_models.clone(),
            },
        };
        let compliance = evaluate(&snapshot, &rule_set);

        log::info!(
            "assessed {} against {} {}: {} (score {:.1})",
            request.dossier_id,
            rule_set.framework_id,
            rule_set.version,
            compliance.overall_status.name(),
            compliance.compliance_score
        );

        Ok(DossierAssessment {
            dossier_id: request.dossier_id.clone(),
            framework_id: rule_set.framework_id.clone(),
            rule_set_version: rule_set.version.clone(),
            parameters: set.summary(),
            economics,
            one_way,
            probabilistic,
            budget_impact,
            evidence_quality: request.evidence.iter().map(assess_quality).collect(),
            compliance,
        })
    }

    fn probabilistic(
        &self,
        set: &EconomicParameterSet,
        arms: &ComparatorArms,
        n_samples: usize,
        wtp_threshold: f64,
        seed: u64,
    ) -> EngineResult<ProbabilisticRun> {
        self.check_budget(set, arms, n_samples)?;
        let config = ProbabilisticConfig {
            min_samples: self.config.min_samples,
            ..ProbabilisticConfig::new(n_samples, wtp_threshold, seed)
        };
        run_probabilistic(set, arms, &config)
    }

    /// Refuse runs that exceed the sample cap or whose estimated wall-clock
    /// time (one timed base computation × n / worker threads) exceeds the budget.
    fn check_budget(
        &self,
        set: &EconomicParameterSet,
        arms: &ComparatorArms,
        n_samples: usize,
    ) -> EngineResult<()> {
        if n_samples > self.config.max_samples {
            log::warn!(
                "probabilistic run refused: {n_samples} samples exceeds cap of {}",
                self.config.max_samples
            );
            return Err(EngineError::SampleBudgetExceeded {
                requested: n_samples,
                maximum:   self.config.max_samples,
            });
        }

        let started = Instant::now();
        let timed = compute(set, arms);
        let per_sample_ms = started.elapsed().as_secs_f64() * 1000.0;
        let threads = rayon::current_num_threads().max(1) as f64;
        let estimated_ms = (per_sample_ms * n_samples as f64 / threads).ceil() as u64;
        log::debug!(
            "probabilistic budget: timed icer={:?}, estimate {estimated_ms} ms on {threads} threads",
            timed.icer
        );

        if estimated_ms > self.config.psa_time_budget_ms {
            log::warn!(
                "probabilistic run refused: estimated {estimated_ms} ms exceeds budget of {} ms",
                self.config.psa_time_budget_ms
            );
            return Err(EngineError::TimeBudgetExceeded {
                estimated_ms,
                budget_ms: self.config.psa_time_budget_ms,
            });
        }
        Ok(())
    }
}

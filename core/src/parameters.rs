//! Parameter model — validated economic inputs.
//!
//! RULE: An `EconomicParameterSet` can only be obtained from `validate()`.
//! Invalid sets never exist, so the calculator and sensitivity engine
//! never re-check their inputs.

use crate::{
    distribution::{Distribution, RawDistribution, Sampler},
    error::{EngineResult, ValidationError},
    rng::SampleRng,
    types::{ModelType, ParameterName},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const MAX_DISCOUNT_RATE: f64 = 0.10;
/// Lifetime horizons beyond this are rejected as implausible.
pub const MAX_TIME_HORIZON_YEARS: f64 = 150.0;

// ── Raw payload ────────────────────────────────────────────────────

/// Economic parameter payload as received from a caller.
/// Every field is optional so absence surfaces as `MissingField`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawParameterSet {
    pub model_type:            Option<String>,
    pub currency:              Option<String>,
    pub time_horizon_years:    Option<f64>,
    pub discount_rate_costs:   Option<f64>,
    pub discount_rate_effects: Option<f64>,
    pub parameters:            Option<Vec<RawParameterEntry>>,
}

impl RawParameterSet {
    pub fn new(
        model_type: ModelType,
        currency: &str,
        time_horizon_years: f64,
        discount_rate_costs: f64,
        discount_rate_effects: f64,
    ) -> Self {
        Self {
            model_type:            Some(model_type.name().to_string()),
            currency:              Some(currency.to_string()),
            time_horizon_years:    Some(time_horizon_years),
            discount_rate_costs:   Some(discount_rate_costs),
            discount_rate_effects: Some(discount_rate_effects),
            parameters:            Some(Vec::new()),
        }
    }

    pub fn with_parameter(mut self, entry: RawParameterEntry) -> Self {
        self.parameters.get_or_insert_with(Vec::new).push(entry);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawParameterEntry {
    pub name:           Option<String>,
    pub kind:           Option<String>,
    pub point_estimate: Option<f64>,
    #[serde(default)]
    pub distribution:   Option<RawDistribution>,
    #[serde(default)]
    pub lower_bound:    Option<f64>,
    #[serde(default)]
    pub upper_bound:    Option<f64>,
}

impl RawParameterEntry {
    pub fn new(name: &str, kind: ParameterKind, point_estimate: f64) -> Self {
        Self {
            name:           Some(name.to_string()),
            kind:           Some(kind.name().to_string()),
            point_estimate: Some(point_estimate),
            ..Self::default()
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower_bound = Some(lower);
        self.upper_bound = Some(upper);
        self
    }

    pub fn with_distribution(mut self, kind: &str, params: &[f64]) -> Self {
        self.distribution = Some(RawDistribution::new(kind, params));
        self
    }
}

// ── Parameter kinds ────────────────────────────────────────────────

/// The role a parameter plays in the cohort calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Recurring annual cost per patient.
    Cost,
    /// One-off cost incurred in year 0.
    UpfrontCost,
    /// Annual health effect (QALYs, life-years or natural units).
    Effect,
    /// Annual utility weight; accrues as effect.
    Utility,
    /// Annual probability of leaving the modelled cohort.
    Probability,
    /// Carried through but not used by the calculator.
    Other,
}

impl ParameterKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cost        => "cost",
            Self::UpfrontCost => "upfront_cost",
            Self::Effect      => "effect",
            Self::Utility     => "utility",
            Self::Probability => "probability",
            Self::Other       => "other",
        }
    }

    fn parse(field: &str, s: &str) -> Result<Self, ValidationError> {
        match s {
            "cost"         => Ok(Self::Cost),
            "upfront_cost" => Ok(Self::UpfrontCost),
            "effect"       => Ok(Self::Effect),
            "utility"      => Ok(Self::Utility),
            "probability"  => Ok(Self::Probability),
            "other"        => Ok(Self::Other),
            other => Err(ValidationError::Malformed {
                field:  field.to_string(),
                reason: format!(
                    "unknown kind '{other}' (expected cost, upfront_cost, effect, utility, probability or other)"
                ),
            }),
        }
    }

    /// Closed interval of admissible values for this kind.
    pub fn domain(&self) -> (f64, f64) {
        match self {
            Self::Cost | Self::UpfrontCost     => (0.0, f64::INFINITY),
            Self::Utility | Self::Probability  => (0.0, 1.0),
            Self::Effect | Self::Other         => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let (lo, hi) = self.domain();
        value.clamp(lo, hi)
    }

    fn check(&self, field: &str, value: f64) -> Result<(), ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::OutOfRange {
                field:      field.to_string(),
                value,
                constraint: "must be a finite number".into(),
            });
        }
        let (lo, hi) = self.domain();
        if value < lo || value > hi {
            let constraint = match self {
                Self::Cost | Self::UpfrontCost => "costs must be >= 0".to_string(),
                _ => format!("{} values must lie within [{lo}, {hi}]", self.name()),
            };
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                constraint,
            });
        }
        Ok(())
    }
}

fn parse_model_type(s: &str) -> Result<ModelType, ValidationError> {
    match s {
        "cost_effectiveness" => Ok(ModelType::CostEffectiveness),
        "budget_impact"      => Ok(ModelType::BudgetImpact),
        "cost_utility"       => Ok(ModelType::CostUtility),
        other => Err(ValidationError::Malformed {
            field:  "model_type".into(),
            reason: format!(
                "unknown model type '{other}' (expected cost_effectiveness, budget_impact or cost_utility)"
            ),
        }),
    }
}

// ── Validated set ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ParameterEntry {
    name:           ParameterName,
    kind:           ParameterKind,
    point_estimate: f64,
    distribution:   Distribution,
    lower_bound:    Option<f64>,
    upper_bound:    Option<f64>,
    #[serde(skip_serializing)]
    sampler:        Sampler,
}

impl ParameterEntry {
    pub fn name(&self) -> &str { &self.name }
    pub fn kind(&self) -> ParameterKind { self.kind }
    pub fn point_estimate(&self) -> f64 { self.point_estimate }
    pub fn distribution(&self) -> &Distribution { &self.distribution }
    pub fn lower_bound(&self) -> Option<f64> { self.lower_bound }
    pub fn upper_bound(&self) -> Option<f64> { self.upper_bound }

    /// Draw one value from the declared distribution, restricted to the
    /// declared bounds and to the kind's domain. Parameters without a
    /// distribution stay at their point estimate.
    pub fn sample(&self, rng: &mut SampleRng) -> f64 {
        let mut value = self.sampler.sample(self.point_estimate, rng);
        if let Some(lo) = self.lower_bound {
            value = value.max(lo);
        }
        if let Some(hi) = self.upper_bound {
            value = value.min(hi);
        }
        self.kind.clamp(value)
    }

    /// Low and high values for one-way variation.
    /// Declared bounds win; a missing side uses `point * (1 ∓ pct)`.
    pub fn one_way_range(&self, variation_pct: f64) -> (f64, f64) {
        let a = self.point_estimate * (1.0 - variation_pct);
        let b = self.point_estimate * (1.0 + variation_pct);
        let (sym_lo, sym_hi) = if a <= b { (a, b) } else { (b, a) };
        let lo = self.lower_bound.unwrap_or_else(|| self.kind.clamp(sym_lo));
        let hi = self.upper_bound.unwrap_or_else(|| self.kind.clamp(sym_hi));
        (lo, hi)
    }
}

/// Immutable, validated snapshot of economic inputs.
#[derive(Debug, Clone, Serialize)]
pub struct EconomicParameterSet {
    model_type:            ModelType,
    currency:              String,
    time_horizon_years:    f64,
    discount_rate_costs:   f64,
    discount_rate_effects: f64,
    parameters:            Vec<ParameterEntry>,
}

/// Scalar description of a parameter set, as carried in dossier snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub model_type:            ModelType,
    pub currency:              String,
    pub time_horizon_years:    f64,
    pub discount_rate_costs:   f64,
    pub discount_rate_effects: f64,
    pub parameter_count:       usize,
    pub distributed_count:     usize,
}

impl EconomicParameterSet {
    pub fn model_type(&self) -> ModelType { self.model_type }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn time_horizon_years(&self) -> f64 { self.time_horizon_years }
    pub fn discount_rate_costs(&self) -> f64 { self.discount_rate_costs }
    pub fn discount_rate_effects(&self) -> f64 { self.discount_rate_effects }
    pub fn parameters(&self) -> &[ParameterEntry] { &self.parameters }

    pub fn get(&self, name: &str) -> Option<&ParameterEntry> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }

    pub fn point_estimates(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.point_estimate).collect()
    }

    pub fn has_distributions(&self) -> bool {
        self.parameters.iter().any(|p| !p.distribution.is_none())
    }

    pub fn summary(&self) -> ParameterSummary {
        ParameterSummary {
            model_type:            self.model_type,
            currency:              self.currency.clone(),
            time_horizon_years:    self.time_horizon_years,
            discount_rate_costs:   self.discount_rate_costs,
            discount_rate_effects: self.discount_rate_effects,
            parameter_count:       self.parameters.len(),
            distributed_count:     self.parameters.iter().filter(|p| !p.distribution.is_none()).count(),
        }
    }

    /// Check comparator arms against this set: unique arm names, known
    /// override targets, and resolved override values inside each kind's domain.
    pub fn check_arms(&self, arms: &ComparatorArms) -> EngineResult<()> {
        let mut seen = HashSet::new();
        for arm in arms.iter() {
            if !seen.insert(arm.name.as_str()) {
                return Err(ValidationError::DuplicateArm { name: arm.name.clone() }.into());
            }
            for (param, ov) in &arm.overrides {
                let entry = self.get(param).ok_or_else(|| ValidationError::UnknownParameter {
                    arm:       arm.name.clone(),
                    parameter: param.clone(),
                })?;
                let field = format!("arms.{}.overrides.{}", arm.name, param);
                if let Override::Scale(factor) = ov {
                    if !factor.is_finite() || *factor < 0.0 {
                        return Err(ValidationError::OutOfRange {
                            field,
                            value:      *factor,
                            constraint: "scale factors must be finite and >= 0".into(),
                        }
                        .into());
                    }
                }
                entry.kind.check(&field, ov.apply(entry.point_estimate))?;
            }
        }
        Ok(())
    }
}

/// Validate a raw payload into an immutable parameter set.
pub fn validate(raw: &RawParameterSet) -> Result<EconomicParameterSet, ValidationError> {
    let model_type = parse_model_type(require(&raw.model_type, "model_type")?)?;

    let currency = require(&raw.currency, "currency")?.trim().to_string();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::Malformed {
            field:  "currency".into(),
            reason: format!("'{currency}' is not a three-letter upper-case currency code"),
        });
    }

    let time_horizon_years = *require(&raw.time_horizon_years, "time_horizon_years")?;
    if !(time_horizon_years > 0.0 && time_horizon_years <= MAX_TIME_HORIZON_YEARS) {
        return Err(ValidationError::OutOfRange {
            field:      "time_horizon_years".into(),
            value:      time_horizon_years,
            constraint: format!("time horizon must be > 0 and <= {MAX_TIME_HORIZON_YEARS} years"),
        });
    }

    let discount_rate_costs = check_discount(&raw.discount_rate_costs, "discount_rate_costs")?;
    let discount_rate_effects = check_discount(&raw.discount_rate_effects, "discount_rate_effects")?;

    let raw_entries = require(&raw.parameters, "parameters")?;
    let mut names = HashSet::new();
    let mut parameters = Vec::with_capacity(raw_entries.len());
    for (i, entry) in raw_entries.iter().enumerate() {
        let parsed = validate_entry(i, entry)?;
        if !names.insert(parsed.name.clone()) {
            return Err(ValidationError::DuplicateParameter { name: parsed.name });
        }
        parameters.push(parsed);
    }

    log::debug!(
        "validated {} parameter set: {} parameters, horizon={}y, discount={}/{}",
        model_type.name(),
        parameters.len(),
        time_horizon_years,
        discount_rate_costs,
        discount_rate_effects
    );

    Ok(EconomicParameterSet {
        model_type,
        currency,
        time_horizon_years,
        discount_rate_costs,
        discount_rate_effects,
        parameters,
    })
}

fn require<'a, T>(value: &'a Option<T>, field: &str) -> Result<&'a T, ValidationError> {
    value.as_ref().ok_or_else(|| ValidationError::MissingField { field: field.to_string() })
}

fn check_discount(value: &Option<f64>, field: &str) -> Result<f64, ValidationError> {
    let rate = *require(value, field)?;
    if !(0.0..=MAX_DISCOUNT_RATE).contains(&rate) {
        return Err(ValidationError::OutOfRange {
            field:      field.to_string(),
            value:      rate,
            constraint: format!("discount rates must lie within [0, {MAX_DISCOUNT_RATE}]"),
        });
    }
    Ok(rate)
}

fn validate_entry(index: usize, raw: &RawParameterEntry) -> Result<ParameterEntry, ValidationError> {
    let prefix = format!("parameters[{index}]");
    let name = require(&raw.name, &format!("{prefix}.name"))?.trim().to_string();
    if name.is_empty() {
        return Err(ValidationError::Malformed {
            field:  format!("{prefix}.name"),
            reason: "parameter names must be non-empty".into(),
        });
    }
    let kind_field = format!("{prefix}.kind");
    let kind = ParameterKind::parse(&kind_field, require(&raw.kind, &kind_field)?)?;

    let point_field = format!("{prefix}.point_estimate");
    let point_estimate = *require(&raw.point_estimate, &point_field)?;
    kind.check(&point_field, point_estimate)?;

    if let Some(lo) = raw.lower_bound {
        kind.check(&format!("{prefix}.lower_bound"), lo)?;
        if point_estimate < lo {
            return Err(ValidationError::OutOfRange {
                field:      point_field,
                value:      point_estimate,
                constraint: format!("point estimate must be >= lower bound {lo}"),
            });
        }
    }
    if let Some(hi) = raw.upper_bound {
        kind.check(&format!("{prefix}.upper_bound"), hi)?;
        if point_estimate > hi {
            return Err(ValidationError::OutOfRange {
                field:      point_field,
                value:      point_estimate,
                constraint: format!("point estimate must be <= upper bound {hi}"),
            });
        }
    }

    let (distribution, sampler) = match &raw.distribution {
        Some(d) => Distribution::from_raw(&name, d)?,
        None    => (Distribution::None, Sampler::Fixed),
    };

    Ok(ParameterEntry {
        name,
        kind,
        point_estimate,
        distribution,
        lower_bound: raw.lower_bound,
        upper_bound: raw.upper_bound,
        sampler,
    })
}

// ── Comparator arms ────────────────────────────────────────────────

/// How an arm replaces a base parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Override {
    /// Use this value regardless of the base value.
    Value(f64),
    /// Multiply the (possibly varied) base value.
    Scale(f64),
}

impl Override {
    pub fn apply(&self, base: f64) -> f64 {
        match self {
            Self::Value(v)  => *v,
            Self::Scale(f)  => base * f,
        }
    }
}

/// A named bundle of parameter overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparatorArm {
    pub name:      String,
    #[serde(default)]
    pub overrides: BTreeMap<ParameterName, Override>,
}

impl ComparatorArm {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), overrides: BTreeMap::new() }
    }

    pub fn with_value(mut self, parameter: &str, value: f64) -> Self {
        self.overrides.insert(parameter.to_string(), Override::Value(value));
        self
    }

    pub fn with_scale(mut self, parameter: &str, factor: f64) -> Self {
        self.overrides.insert(parameter.to_string(), Override::Scale(factor));
        self
    }
}

/// Intervention vs. reference comparator, plus any further arms that are
/// costed for the per-arm breakdown only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparatorArms {
    pub intervention: ComparatorArm,
    pub comparator:   ComparatorArm,
    #[serde(default)]
    pub additional:   Vec<ComparatorArm>,
}

impl ComparatorArms {
    pub fn new(intervention: ComparatorArm, comparator: ComparatorArm) -> Self {
        Self { intervention, comparator, additional: Vec::new() }
    }

    pub fn with_additional(mut self, arm: ComparatorArm) -> Self {
        self.additional.push(arm);
        self
    }

    /// Intervention first, then the reference comparator, then the rest.
    pub fn iter(&self) -> impl Iterator<Item = &ComparatorArm> {
        std::iter::once(&self.intervention)
            .chain(std::iter::once(&self.comparator))
            .chain(self.additional.iter())
    }
}

//! Cost-effectiveness calculator — discounted annual cohort model.
//!
//! For each arm the calculator resolves parameter values (base value,
//! then the arm's override), aggregates them by kind, and accrues
//! costs and effects year by year:
//!
//!   cohort_t = Π(1 − probability)^t
//!   cost    += (annual_cost · cohort_t · w_t + [t = 0] · upfront) / (1 + r_c)^t
//!   effect  += (annual_effect · cohort_t · w_t)                    / (1 + r_e)^t
//!
//! where w_t is the fraction of year t inside the horizon.
//!
//! Pure and deterministic: summation order is fixed, so identical inputs
//! produce bit-identical results.

use crate::{
    parameters::{ComparatorArm, ComparatorArms, EconomicParameterSet, ParameterKind},
    types::{Dominance, ModelType, DEGENERACY_EPSILON},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmOutcome {
    pub cost:   f64,
    pub effect: f64,
}

/// Calculator output for one parameter set and one set of arms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicResult {
    pub model_type:         ModelType,
    pub currency:           String,
    /// Discounted totals of the intervention arm.
    pub total_cost:         f64,
    pub total_effect:       f64,
    pub incremental_cost:   f64,
    pub incremental_effect: f64,
    /// `None` when the incremental effect is (numerically) zero.
    pub icer:               Option<f64>,
    pub dominance:          Option<Dominance>,
    pub arms:               BTreeMap<String, ArmOutcome>,
}

impl EconomicResult {
    /// The `CalculationDegenerate` flag: no ICER could be formed.
    pub fn is_degenerate(&self) -> bool {
        self.icer.is_none()
    }

    /// `wtp · Δeffect − Δcost`.
    pub fn net_monetary_benefit(&self, wtp_threshold: f64) -> f64 {
        wtp_threshold * self.incremental_effect - self.incremental_cost
    }

    pub fn is_cost_effective_at(&self, wtp_threshold: f64) -> bool {
        self.net_monetary_benefit(wtp_threshold) >= 0.0
    }
}

/// Per-arm aggregates after value resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ArmInputs {
    pub annual_cost:   f64,
    pub upfront_cost:  f64,
    pub annual_effect: f64,
    pub survival:      f64,
}

impl ArmInputs {
    /// Undiscounted cost of treating one patient for their first year.
    pub fn first_year_cost(&self) -> f64 {
        self.annual_cost + self.upfront_cost
    }
}

/// Compute at the parameter set's point estimates.
pub fn compute(set: &EconomicParameterSet, arms: &ComparatorArms) -> EconomicResult {
    compute_with(set, arms, &set.point_estimates())
}

/// Compute with substituted base values, one per parameter in declaration
/// order. Used by the sensitivity engine.
pub fn compute_with(
    set: &EconomicParameterSet,
    arms: &ComparatorArms,
    base_values: &[f64],
) -> EconomicResult {
    debug_assert_eq!(base_values.len(), set.parameters().len());

    let breakdown: BTreeMap<String, ArmOutcome> = arms
        .iter()
        .map(|arm| {
            let inputs = resolve_arm(set, arm, base_values);
            (arm.name.clone(), discounted_totals(set, &inputs))
        })
        .collect();

    let intervention = breakdown[&arms.intervention.name];
    let comparator = breakdown[&arms.comparator.name];

    let incremental_cost = intervention.cost - comparator.cost;
    let incremental_effect = intervention.effect - comparator.effect;
    let (icer, dominance) = classify(incremental_cost, incremental_effect);

    EconomicResult {
        model_type: set.model_type(),
        currency: set.currency().to_string(),
        total_cost: intervention.cost,
        total_effect: intervention.effect,
        incremental_cost,
        incremental_effect,
        icer,
        dominance,
        arms: breakdown,
    }
}

pub(crate) fn resolve_arm(
    set: &EconomicParameterSet,
    arm: &ComparatorArm,
    base_values: &[f64],
) -> ArmInputs {
    let mut inputs = ArmInputs {
        annual_cost:   0.0,
        upfront_cost:  0.0,
        annual_effect: 0.0,
        survival:      1.0,
    };
    for (entry, base) in set.parameters().iter().zip(base_values) {
        let raw = match arm.overrides.get(entry.name()) {
            Some(ov) => ov.apply(*base),
            None     => *base,
        };
        let value = entry.kind().clamp(raw);
        match entry.kind() {
            ParameterKind::Cost        => inputs.annual_cost += value,
            ParameterKind::UpfrontCost => inputs.upfront_cost += value,
            ParameterKind::Effect | ParameterKind::Utility => inputs.annual_effect += value,
            ParameterKind::Probability => inputs.survival *= 1.0 - value,
            ParameterKind::Other       => {}
        }
    }
    inputs
}

fn discounted_totals(set: &EconomicParameterSet, inputs: &ArmInputs) -> ArmOutcome {
    let horizon = set.time_horizon_years();
    let cost_factor = 1.0 + set.discount_rate_costs();
    let effect_factor = 1.0 + set.discount_rate_effects();
    let years = horizon.ceil() as u32;

    let mut cost = 0.0;
    let mut effect = 0.0;
    let mut cohort = 1.0;
    for t in 0..years {
        let weight = (horizon - t as f64).min(1.0);
        let mut cost_t = inputs.annual_cost * cohort * weight;
        if t == 0 {
            cost_t += inputs.upfront_cost;
        }
        let effect_t = inputs.annual_effect * cohort * weight;

        cost += cost_t / cost_factor.powi(t as i32);
        effect += effect_t / effect_factor.powi(t as i32);
        cohort *= inputs.survival;
    }
    ArmOutcome { cost, effect }
}

/// ICER and dominance from incremental values.
pub fn classify(incremental_cost: f64, incremental_effect: f64) -> (Option<f64>, Option<Dominance>) {
    if incremental_effect.abs() < DEGENERACY_EPSILON {
        let dominance = if incremental_cost.abs() < DEGENERACY_EPSILON {
            Dominance::Indifferent
        } else if incremental_cost < 0.0 {
            Dominance::Dominant
        } else {
            Dominance::Dominated
        };
        return (None, Some(dominance));
    }

    let icer = incremental_cost / incremental_effect;
    let dominance = if incremental_cost <= 0.0 && incremental_effect > 0.0 {
        Some(Dominance::Dominant)
    } else if incremental_cost >= 0.0 && incremental_effect < 0.0 {
        Some(Dominance::Dominated)
    } else {
        None
    };
    (Some(icer), dominance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_incremental_effect_is_degenerate() {
        assert_eq!(classify(0.0, 0.0), (None, Some(Dominance::Indifferent)));
        assert_eq!(classify(-10.0, 1e-12), (None, Some(Dominance::Dominant)));
        assert_eq!(classify(10.0, -1e-12), (None, Some(Dominance::Dominated)));
    }

    #[test]
    fn tradeoff_has_icer_and_no_dominance() {
        let (icer, dom) = classify(4000.0, 0.2);
        assert!((icer.unwrap() - 20_000.0).abs() < 1e-9);
        assert_eq!(dom, None);
    }

    #[test]
    fn cheaper_and_better_is_dominant_with_icer() {
        let (icer, dom) = classify(-500.0, 0.1);
        assert!(icer.unwrap() < 0.0);
        assert_eq!(dom, Some(Dominance::Dominant));
    }
}

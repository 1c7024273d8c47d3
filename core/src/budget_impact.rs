//! Budget impact analysis.
//!
//! Yearly payer spend for the treated population under an uptake curve,
//! intervention vs. reference comparator. Undiscounted by convention.
//! Each year's treated patients are costed as new entrants (recurring
//! plus upfront cost per patient).

use crate::{
    calculator::resolve_arm,
    error::{EngineResult, ValidationError},
    parameters::{ComparatorArms, EconomicParameterSet},
};
use serde::{Deserialize, Serialize};

/// Longest budget horizon accepted, in years.
pub const MAX_BUDGET_YEARS: u32 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetImpactConfig {
    pub target_population: f64,
    /// Uptake share per year; the last value carries forward.
    pub market_uptake:     Vec<f64>,
    pub years:             u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetImpactYear {
    pub year:                  u32,
    pub uptake_rate:           f64,
    pub treated_patients:      u64,
    pub intervention_cost_per_patient: f64,
    pub comparator_cost_per_patient:   f64,
    pub intervention_spend:    f64,
    pub displaced_spend:       f64,
    pub net_impact:            f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetImpactResult {
    pub currency:                  String,
    pub annual:                    Vec<BudgetImpactYear>,
    pub cumulative_net_impact:     f64,
    pub cumulative_patients:       u64,
    pub average_net_cost_per_patient: f64,
}

pub fn budget_impact(
    set: &EconomicParameterSet,
    arms: &ComparatorArms,
    config: &BudgetImpactConfig,
) -> EngineResult<BudgetImpactResult> {
    validate_config(config)?;

    let base_values = set.point_estimates();
    let intervention_cost = resolve_arm(set, &arms.intervention, &base_values).first_year_cost();
    let comparator_cost = resolve_arm(set, &arms.comparator, &base_values).first_year_cost();

    let mut annual = Vec::with_capacity(config.years as usize);
    for year in 1..=config.years {
        let idx = ((year - 1) as usize).min(config.market_uptake.len() - 1);
        let uptake_rate = config.market_uptake[idx];
        let treated_patients = (config.target_population * uptake_rate).floor() as u64;
        let intervention_spend = treated_patients as f64 * intervention_cost;
        let displaced_spend = treated_patients as f64 * comparator_cost;
        annual.push(BudgetImpactYear {
            year,
            uptake_rate,
            treated_patients,
            intervention_cost_per_patient: intervention_cost,
            comparator_cost_per_patient:   comparator_cost,
            intervention_spend,
            displaced_spend,
            net_impact: intervention_spend - displaced_spend,
        });
    }

    let cumulative_net_impact: f64 = annual.iter().map(|y| y.net_impact).sum();
    let cumulative_patients: u64 = annual.iter().map(|y| y.treated_patients).sum();
    let average_net_cost_per_patient = if cumulative_patients > 0 {
        cumulative_net_impact / cumulative_patients as f64
    } else {
        0.0
    };

    log::debug!(
        "budget impact: {} years, {} patients, net {:.0} {}",
        config.years,
        cumulative_patients,
        cumulative_net_impact,
        set.currency()
    );

    Ok(BudgetImpactResult {
        currency: set.currency().to_string(),
        annual,
        cumulative_net_impact,
        cumulative_patients,
        average_net_cost_per_patient,
    })
}

fn validate_config(config: &BudgetImpactConfig) -> Result<(), ValidationError> {
    if !(config.target_population.is_finite() && config.target_population > 0.0) {
        return Err(ValidationError::OutOfRange {
            field:      "budget_impact.target_population".into(),
            value:      config.target_population,
            constraint: "target population must be > 0".into(),
        });
    }
    if config.market_uptake.is_empty() {
        return Err(ValidationError::MissingField {
            field: "budget_impact.market_uptake".into(),
        });
    }
    for (i, &u) in config.market_uptake.iter().enumerate() {
        if !(0.0..=1.0).contains(&u) {
            return Err(ValidationError::OutOfRange {
                field:      format!("budget_impact.market_uptake[{i}]"),
                value:      u,
                constraint: "uptake shares must lie within [0, 1]".into(),
            });
        }
    }
    if config.years == 0 {
        return Err(ValidationError::OutOfRange {
            field:      "budget_impact.years".into(),
            value:      0.0,
            constraint: "at least one budget year is required".into(),
        });
    }
    if config.years > MAX_BUDGET_YEARS {
        return Err(ValidationError::OutOfRange {
            field:      "budget_impact.years".into(),
            value:      config.years as f64,
            constraint: format!("at most {MAX_BUDGET_YEARS} budget years"),
        });
    }
    Ok(())
}

//! Sensitivity analysis — one-way (tornado) and probabilistic (Monte Carlo).
//!
//! Both modes wrap the calculator. Every perturbation or sample is
//! independent, so they are computed on the rayon pool; the only
//! synchronization point is the final collect, which preserves index
//! order. Ranking and summary statistics run after it.
//!
//! RULE: sample i always draws from `RngBank::for_sample(i)`. Thread
//! scheduling can never change a probabilistic run.

use crate::{
    calculator::{classify, compute_with, EconomicResult},
    error::{EngineError, EngineResult, ValidationError},
    parameters::{ComparatorArms, EconomicParameterSet},
    rng::RngBank,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Below this, probabilistic results are statistically unreliable.
pub const DEFAULT_MIN_SAMPLES: usize = 100;

const INTERVAL_LOWER: f64 = 0.025;
const INTERVAL_UPPER: f64 = 0.975;

// ── One-way ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TornadoEntry {
    pub parameter:  String,
    pub low_value:  f64,
    pub high_value: f64,
    pub low:        EconomicResult,
    pub high:       EconomicResult,
    /// `|high.icer − low.icer|`; `None` when either ICER is undefined.
    pub icer_swing: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneWayRun {
    pub variation_pct: f64,
    pub base:          EconomicResult,
    /// Tornado order: defined swings descending, then undefined swings
    /// in declaration order.
    pub entries:       Vec<TornadoEntry>,
}

/// Push each parameter to its low and high value, holding the rest at
/// their point estimates, and rank by ICER swing.
pub fn run_one_way(
    set: &EconomicParameterSet,
    arms: &ComparatorArms,
    variation_pct: f64,
) -> EngineResult<OneWayRun> {
    run_one_way_over(set, arms, variation_pct, None)
}

/// As `run_one_way`, restricted to the named parameters when `only` is
/// given. Names must be declared; ties still keep declaration order.
pub fn run_one_way_over(
    set: &EconomicParameterSet,
    arms: &ComparatorArms,
    variation_pct: f64,
    only: Option<&[String]>,
) -> EngineResult<OneWayRun> {
    if !(variation_pct > 0.0 && variation_pct <= 1.0) {
        return Err(ValidationError::OutOfRange {
            field:      "variation_pct".into(),
            value:      variation_pct,
            constraint: "variation must lie within (0, 1]".into(),
        }
        .into());
    }
    let selected = select_parameters(set, only)?;

    let base_values = set.point_estimates();
    let base = compute_with(set, arms, &base_values);

    let mut entries: Vec<TornadoEntry> = selected
        .par_iter()
        .map(|&i| {
            let entry = &set.parameters()[i];
            let (low_value, high_value) = entry.one_way_range(variation_pct);
            let mut values = base_values.clone();

            values[i] = low_value;
            let low = compute_with(set, arms, &values);
            values[i] = high_value;
            let high = compute_with(set, arms, &values);

            let icer_swing = match (low.icer, high.icer) {
                (Some(lo), Some(hi)) => Some((hi - lo).abs()),
                _ => None,
            };
            TornadoEntry {
                parameter: entry.name().to_string(),
                low_value,
                high_value,
                low,
                high,
                icer_swing,
            }
        })
        .collect();

    // Stable: ties keep declaration order.
    entries.sort_by(|a, b| tornado_order(a.icer_swing, b.icer_swing));

    log::debug!(
        "one-way sensitivity: {} parameters at ±{:.0}%, top driver={:?}",
        entries.len(),
        variation_pct * 100.0,
        entries.first().map(|e| e.parameter.as_str())
    );

    Ok(OneWayRun { variation_pct, base, entries })
}

/// Indices of the parameters to vary, in declaration order.
fn select_parameters(set: &EconomicParameterSet, only: Option<&[String]>) -> EngineResult<Vec<usize>> {
    let Some(names) = only else {
        return Ok((0..set.parameters().len()).collect());
    };
    for (i, name) in names.iter().enumerate() {
        if set.index_of(name).is_none() {
            return Err(ValidationError::Malformed {
                field:  format!("one_way.parameters[{i}]"),
                reason: format!("'{name}' is not a declared parameter"),
            }
            .into());
        }
    }
    Ok(set
        .parameters()
        .iter()
        .enumerate()
        .filter(|(_, p)| names.iter().any(|n| n == p.name()))
        .map(|(i, _)| i)
        .collect())
}

fn tornado_order(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None)    => Ordering::Less,
        (None, Some(_))    => Ordering::Greater,
        (None, None)       => Ordering::Equal,
    }
}

// ── Probabilistic ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilisticConfig {
    pub n_samples:     usize,
    pub wtp_threshold: f64,
    pub seed:          u64,
    pub min_samples:   usize,
}

impl ProbabilisticConfig {
    pub fn new(n_samples: usize, wtp_threshold: f64, seed: u64) -> Self {
        Self { n_samples, wtp_threshold, seed, min_samples: DEFAULT_MIN_SAMPLES }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilisticSummary {
    pub mean_incremental_cost:       f64,
    pub mean_incremental_effect:     f64,
    /// Ratio of the mean increments; `None` when the mean effect is zero.
    pub icer_of_means:               Option<f64>,
    pub incremental_cost_interval:   Interval,
    pub incremental_effect_interval: Interval,
    /// Over samples with a defined ICER; `None` if there are none.
    pub icer_interval:               Option<Interval>,
    /// Share of samples with non-negative net monetary benefit at the threshold.
    pub probability_cost_effective:  f64,
    pub degenerate_samples:          usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilisticRun {
    pub seed:          u64,
    pub n_samples:     usize,
    pub wtp_threshold: f64,
    pub samples:       Vec<EconomicResult>,
    pub summary:       ProbabilisticSummary,
}

/// Monte Carlo over the declared distributions.
pub fn run_probabilistic(
    set: &EconomicParameterSet,
    arms: &ComparatorArms,
    config: &ProbabilisticConfig,
) -> EngineResult<ProbabilisticRun> {
    // An empty run has no percentiles, whatever floor the caller configured.
    let minimum = config.min_samples.max(1);
    if config.n_samples < minimum {
        return Err(EngineError::InsufficientSampleSize {
            requested: config.n_samples,
            minimum,
        });
    }
    if !set.has_distributions() {
        return Err(EngineError::MissingDistribution);
    }
    check_wtp(config.wtp_threshold)?;

    let bank = RngBank::new(config.seed);
    let samples: Vec<EconomicResult> = (0..config.n_samples)
        .into_par_iter()
        .map(|i| {
            let mut rng = bank.for_sample(i as u64);
            let values: Vec<f64> = set.parameters().iter().map(|p| p.sample(&mut rng)).collect();
            compute_with(set, arms, &values)
        })
        .collect();

    let summary = summarize(&samples, config.wtp_threshold);
    log::debug!(
        "probabilistic sensitivity: seed={} n={} mean Δcost={:.2} mean Δeffect={:.4} P(CE @ {})={:.3}",
        config.seed,
        samples.len(),
        summary.mean_incremental_cost,
        summary.mean_incremental_effect,
        config.wtp_threshold,
        summary.probability_cost_effective
    );

    Ok(ProbabilisticRun {
        seed: config.seed,
        n_samples: config.n_samples,
        wtp_threshold: config.wtp_threshold,
        samples,
        summary,
    })
}

fn check_wtp(wtp_threshold: f64) -> EngineResult<()> {
    if !(wtp_threshold.is_finite() && wtp_threshold >= 0.0) {
        return Err(ValidationError::OutOfRange {
            field:      "wtp_threshold".into(),
            value:      wtp_threshold,
            constraint: "willingness-to-pay must be finite and >= 0".into(),
        }
        .into());
    }
    Ok(())
}

fn summarize(samples: &[EconomicResult], wtp_threshold: f64) -> ProbabilisticSummary {
    let n = samples.len() as f64;
    let costs: Vec<f64> = samples.iter().map(|s| s.incremental_cost).collect();
    let effects: Vec<f64> = samples.iter().map(|s| s.incremental_effect).collect();
    let icers: Vec<f64> = samples.iter().filter_map(|s| s.icer).collect();

    let mean_incremental_cost = costs.iter().sum::<f64>() / n;
    let mean_incremental_effect = effects.iter().sum::<f64>() / n;
    let (icer_of_means, _) = classify(mean_incremental_cost, mean_incremental_effect);

    let cost_effective = samples.iter().filter(|s| s.is_cost_effective_at(wtp_threshold)).count();

    ProbabilisticSummary {
        mean_incremental_cost,
        mean_incremental_effect,
        icer_of_means,
        incremental_cost_interval: interval(&costs),
        incremental_effect_interval: interval(&effects),
        icer_interval: (!icers.is_empty()).then(|| interval(&icers)),
        probability_cost_effective: cost_effective as f64 / n,
        degenerate_samples: samples.len() - icers.len(),
    }
}

fn interval(values: &[f64]) -> Interval {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Interval {
        lower: percentile(&sorted, INTERVAL_LOWER),
        upper: percentile(&sorted, INTERVAL_UPPER),
    }
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Output of either sensitivity mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SensitivityRun {
    OneWay(OneWayRun),
    Probabilistic(ProbabilisticRun),
}

impl SensitivityRun {
    pub fn as_one_way(&self) -> Option<&OneWayRun> {
        match self {
            Self::OneWay(run) => Some(run),
            Self::Probabilistic(_) => None,
        }
    }

    pub fn as_probabilistic(&self) -> Option<&ProbabilisticRun> {
        match self {
            Self::Probabilistic(run) => Some(run),
            Self::OneWay(_) => None,
        }
    }
}

// ── Acceptability curve ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcceptabilityPoint {
    pub wtp_threshold:              f64,
    pub probability_cost_effective: f64,
}

/// Cost-effectiveness acceptability curve over the run's samples.
pub fn acceptability_curve(
    run: &ProbabilisticRun,
    thresholds: &[f64],
) -> EngineResult<Vec<AcceptabilityPoint>> {
    let n = run.samples.len() as f64;
    thresholds
        .iter()
        .map(|&wtp| {
            check_wtp(wtp)?;
            let hits = run.samples.iter().filter(|s| s.is_cost_effective_at(wtp)).count();
            Ok(AcceptabilityPoint {
                wtp_threshold:              wtp,
                probability_cost_effective: hits as f64 / n,
            })
        })
        .collect()
}

//! Uncertainty distributions attached to economic parameters.
//!
//! One tagged variant per supported distribution, one sampling arm per
//! variant. The sensitivity engine only ever calls `Sampler::sample` and
//! never needs to know which distributions exist.

use crate::{error::ValidationError, rng::SampleRng};
use rand_distr::{Beta, Gamma, Normal, Triangular};
use serde::{Deserialize, Serialize};

/// Distribution as it arrives on the wire: a type tag plus positional params.
///
/// ```json
/// { "type": "beta", "params": [12.0, 48.0] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDistribution {
    #[serde(rename = "type")]
    pub kind:   String,
    #[serde(default)]
    pub params: Vec<f64>,
}

impl RawDistribution {
    pub fn new(kind: &str, params: &[f64]) -> Self {
        Self { kind: kind.to_string(), params: params.to_vec() }
    }
}

/// Validated distribution description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distribution {
    None,
    Normal { mean: f64, sd: f64 },
    Beta { alpha: f64, beta: f64 },
    Gamma { shape: f64, scale: f64 },
    Triangular { min: f64, mode: f64, max: f64 },
}

impl Distribution {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None           => "none",
            Self::Normal { .. }  => "normal",
            Self::Beta { .. }    => "beta",
            Self::Gamma { .. }   => "gamma",
            Self::Triangular { .. } => "triangular",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Check arity and parameter domains, and build the matching sampler.
    pub(crate) fn from_raw(
        parameter: &str,
        raw: &RawDistribution,
    ) -> Result<(Self, Sampler), ValidationError> {
        let inconsistent = |reason: String| ValidationError::InconsistentDistribution {
            parameter: parameter.to_string(),
            reason,
        };
        let p = &raw.params;
        if let Some(bad) = p.iter().find(|v| !v.is_finite()) {
            return Err(inconsistent(format!("non-finite parameter {bad}")));
        }
        let expect_arity = |n: usize| {
            if p.len() == n {
                Ok(())
            } else {
                Err(inconsistent(format!(
                    "{} requires {n} parameters, got {}",
                    raw.kind,
                    p.len()
                )))
            }
        };

        match raw.kind.as_str() {
            "none" => {
                expect_arity(0)?;
                Ok((Self::None, Sampler::Fixed))
            }
            "normal" => {
                expect_arity(2)?;
                let (mean, sd) = (p[0], p[1]);
                if sd <= 0.0 {
                    return Err(inconsistent(format!("normal sd must be > 0, got {sd}")));
                }
                let dist = Normal::new(mean, sd)
                    .map_err(|e| inconsistent(format!("normal: {e}")))?;
                Ok((Self::Normal { mean, sd }, Sampler::Normal(dist)))
            }
            "beta" => {
                expect_arity(2)?;
                let (alpha, beta) = (p[0], p[1]);
                if alpha <= 0.0 || beta <= 0.0 {
                    return Err(inconsistent(format!(
                        "beta shape parameters must both be > 0, got ({alpha}, {beta})"
                    )));
                }
                let dist = Beta::new(alpha, beta)
                    .map_err(|e| inconsistent(format!("beta: {e}")))?;
                Ok((Self::Beta { alpha, beta }, Sampler::Beta(dist)))
            }
            "gamma" => {
                expect_arity(2)?;
                let (shape, scale) = (p[0], p[1]);
                if shape <= 0.0 || scale <= 0.0 {
                    return Err(inconsistent(format!(
                        "gamma shape and scale must both be > 0, got ({shape}, {scale})"
                    )));
                }
                let dist = Gamma::new(shape, scale)
                    .map_err(|e| inconsistent(format!("gamma: {e}")))?;
                Ok((Self::Gamma { shape, scale }, Sampler::Gamma(dist)))
            }
            "triangular" => {
                expect_arity(3)?;
                let (min, mode, max) = (p[0], p[1], p[2]);
                if !(min <= mode && mode <= max && min < max) {
                    return Err(inconsistent(format!(
                        "triangular requires min <= mode <= max and min < max, got ({min}, {mode}, {max})"
                    )));
                }
                let dist = Triangular::new(min, max, mode)
                    .map_err(|e| inconsistent(format!("triangular: {e}")))?;
                Ok((Self::Triangular { min, mode, max }, Sampler::Triangular(dist)))
            }
            other => Err(inconsistent(format!("unknown distribution '{other}'"))),
        }
    }
}

/// Ready-to-draw form of a `Distribution`, built once at validation.
#[derive(Debug, Clone)]
pub(crate) enum Sampler {
    Fixed,
    Normal(Normal<f64>),
    Beta(Beta<f64>),
    Gamma(Gamma<f64>),
    Triangular(Triangular<f64>),
}

impl Sampler {
    /// Draw one value; `Fixed` returns `point_estimate` without consuming the stream.
    pub(crate) fn sample(&self, point_estimate: f64, rng: &mut SampleRng) -> f64 {
        match self {
            Self::Fixed         => point_estimate,
            Self::Normal(d)     => rng.draw(d),
            Self::Beta(d)       => rng.draw(d),
            Self::Gamma(d)      => rng.draw(d),
            Self::Triangular(d) => rng.draw(d),
        }
    }
}

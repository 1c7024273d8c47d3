use crate::{sensitivity::DEFAULT_MIN_SAMPLES, types::FrameworkId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Facade-level limits and defaults. Owned by the `Engine`, never
/// mutated by an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Probabilistic runs below this many samples are rejected.
    pub min_samples:           usize,
    /// Probabilistic runs above this many samples are rejected before any work.
    pub max_samples:           usize,
    /// Wall-clock budget for one probabilistic run, estimated up front.
    pub psa_time_budget_ms:    u64,
    pub default_variation_pct: f64,
    pub default_wtp_threshold: f64,
    /// Agency willingness-to-pay thresholds, per framework id.
    pub wtp_thresholds:        BTreeMap<String, f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_samples:           DEFAULT_MIN_SAMPLES,
            max_samples:           100_000,
            psa_time_budget_ms:    30_000,
            default_variation_pct: 0.20,
            default_wtp_threshold: 50_000.0,
            wtp_thresholds: [
                ("nice", 30_000.0),
                ("has", 50_000.0),
                ("cadth", 50_000.0),
                ("amcp", 150_000.0),
            ]
            .into_iter()
            .map(|(id, wtp)| (id.to_string(), wtp))
            .collect(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; absent keys keep their defaults.
    /// In tests, use EngineConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.check()?;
        log::info!(
            "engine config loaded from {path}: samples {}..={}, budget {} ms",
            config.min_samples,
            config.max_samples,
            config.psa_time_budget_ms
        );
        Ok(config)
    }

    /// Small, fast limits for tests.
    pub fn default_test() -> Self {
        Self {
            max_samples: 5_000,
            psa_time_budget_ms: 120_000,
            ..Self::default()
        }
    }

    pub fn check(&self) -> anyhow::Result<()> {
        if self.min_samples == 0 {
            anyhow::bail!("min_samples must be at least 1");
        }
        if self.max_samples < self.min_samples {
            anyhow::bail!(
                "max_samples ({}) is below min_samples ({})",
                self.max_samples,
                self.min_samples
            );
        }
        if !(self.default_variation_pct > 0.0 && self.default_variation_pct <= 1.0) {
            anyhow::bail!("default_variation_pct must lie within (0, 1]");
        }
        let thresholds = std::iter::once(("default", &self.default_wtp_threshold))
            .chain(self.wtp_thresholds.iter().map(|(k, v)| (k.as_str(), v)));
        for (name, wtp) in thresholds {
            if !(wtp.is_finite() && *wtp >= 0.0) {
                anyhow::bail!("willingness-to-pay threshold for {name} must be finite and >= 0");
            }
        }
        Ok(())
    }

    /// The framework's threshold, or the global default.
    pub fn wtp_for(&self, framework_id: &FrameworkId) -> f64 {
        self.wtp_thresholds
            .get(framework_id.as_str())
            .copied()
            .unwrap_or(self.default_wtp_threshold)
    }
}

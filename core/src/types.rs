//! Shared primitive types used across the entire engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Threshold below which an incremental quantity is treated as zero.
pub const DEGENERACY_EPSILON: f64 = 1e-9;

/// A parameter name, unique within one parameter set.
pub type ParameterName = String;

/// A stable identifier for a dossier owned by an external collaborator.
pub type DossierId = String;

/// Identifier of an HTA framework (`nice`, `g_ba`, `has`, `cadth`, `amcp`, `eunethta`).
/// Open-ended: agencies are added by registering a rule set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameworkId(String);

impl FrameworkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameworkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The economic model structure a parameter set describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    CostEffectiveness,
    BudgetImpact,
    CostUtility,
}

impl ModelType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CostEffectiveness => "cost_effectiveness",
            Self::BudgetImpact      => "budget_impact",
            Self::CostUtility       => "cost_utility",
        }
    }
}

/// Outcome of comparing the intervention arm against the reference comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dominance {
    /// Costs no more and is at least as effective.
    Dominant,
    /// Costs no less and is at most as effective.
    Dominated,
    /// No meaningful cost or effect difference.
    Indifferent,
}

impl Dominance {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dominant    => "dominant",
            Self::Dominated   => "dominated",
            Self::Indifferent => "indifferent",
        }
    }
}

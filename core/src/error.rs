use thiserror::Error;

/// Malformed or out-of-range economic input. Never silently coerced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing field '{field}'")]
    MissingField { field: String },

    #[error("Field '{field}' = {value} violates constraint: {constraint}")]
    OutOfRange {
        field:      String,
        value:      f64,
        constraint: String,
    },

    #[error("Field '{field}' is malformed: {reason}")]
    Malformed { field: String, reason: String },

    #[error("Duplicate parameter '{name}'")]
    DuplicateParameter { name: String },

    #[error("Parameter '{parameter}' has an inconsistent distribution: {reason}")]
    InconsistentDistribution { parameter: String, reason: String },

    #[error("Arm '{arm}' overrides unknown parameter '{parameter}'")]
    UnknownParameter { arm: String, parameter: String },

    #[error("Duplicate comparator arm '{name}'")]
    DuplicateArm { name: String },
}

impl ValidationError {
    /// The offending field path (or parameter/arm name).
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field }
            | Self::OutOfRange { field, .. }
            | Self::Malformed { field, .. } => field,
            Self::DuplicateParameter { name } | Self::DuplicateArm { name } => name,
            Self::InconsistentDistribution { parameter, .. }
            | Self::UnknownParameter { parameter, .. } => parameter,
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Insufficient sample size: requested {requested}, minimum is {minimum}")]
    InsufficientSampleSize { requested: usize, minimum: usize },

    #[error("Probabilistic analysis requested but no parameter declares a distribution")]
    MissingDistribution,

    #[error("Unknown framework '{framework_id}'")]
    UnknownFramework { framework_id: String },

    #[error("Framework '{framework_id}' has no rule set version '{version}'")]
    UnknownRuleSetVersion { framework_id: String, version: String },

    #[error("Rule '{rule_id}' uses unknown predicate '{predicate}'")]
    UnknownRulePredicate { rule_id: String, predicate: String },

    #[error("Rule '{rule_id}' is misconfigured: {reason}")]
    RuleMisconfigured { rule_id: String, reason: String },

    #[error("Rule set '{framework_id}' version '{version}' is already published")]
    RuleSetAlreadyPublished { framework_id: String, version: String },

    #[error("Requested {requested} samples exceeds the configured maximum of {maximum}")]
    SampleBudgetExceeded { requested: usize, maximum: usize },

    #[error("Estimated run time {estimated_ms} ms exceeds the budget of {budget_ms} ms")]
    TimeBudgetExceeded { estimated_ms: u64, budget_ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Stable snake_case discriminator for callers that route on error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_)                  => "validation_error",
            Self::InsufficientSampleSize { .. }  => "insufficient_sample_size",
            Self::MissingDistribution            => "missing_distribution",
            Self::UnknownFramework { .. }        => "unknown_framework",
            Self::UnknownRuleSetVersion { .. }   => "unknown_rule_set_version",
            Self::UnknownRulePredicate { .. }    => "unknown_rule_predicate",
            Self::RuleMisconfigured { .. }       => "rule_misconfigured",
            Self::RuleSetAlreadyPublished { .. } => "rule_set_already_published",
            Self::SampleBudgetExceeded { .. }    => "sample_budget_exceeded",
            Self::TimeBudgetExceeded { .. }      => "time_budget_exceeded",
            Self::Serialization(_)               => "serialization_error",
            Self::Other(_)                       => "other",
        }
    }

    /// True when the caller can fix the problem by changing its input.
    /// Registry and serialization faults are system errors.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::InsufficientSampleSize { .. }
                | Self::MissingDistribution
                | Self::UnknownFramework { .. }
                | Self::UnknownRuleSetVersion { .. }
                | Self::SampleBudgetExceeded { .. }
                | Self::TimeBudgetExceeded { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

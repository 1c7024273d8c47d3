//! Framework rule registry — per-agency HTA rule sets as data.
//!
//! A rule set is an ordered list of `FrameworkRule`s, each carrying one
//! predicate from a closed vocabulary. Agencies differ only in their
//! data; no agency has its own code path.
//!
//! RULES:
//!   - A published `(framework_id, version)` is immutable. Publishing it
//!     again is an error, never an overwrite.
//!   - Rule order inside a set is the evaluation order.
//!   - The builtin registry is built once per process and only read after.

use crate::{
    error::{EngineError, EngineResult},
    evidence::{EvidenceType, RiskOfBias},
    snapshot::{DossierField, FieldKind},
    types::{FrameworkId, ModelType},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};

const BUILTIN_RULE_SETS: [(&str, &str); 6] = [
    ("nice",     include_str!("../../data/frameworks/nice.json")),
    ("g_ba",     include_str!("../../data/frameworks/g_ba.json")),
    ("has",      include_str!("../../data/frameworks/has.json")),
    ("cadth",    include_str!("../../data/frameworks/cadth.json")),
    ("amcp",     include_str!("../../data/frameworks/amcp.json")),
    ("eunethta", include_str!("../../data/frameworks/eunethta.json")),
];

/// Predicate names accepted in rule data.
pub const PREDICATE_KINDS: [&str; 4] = [
    "required_field_present",
    "required_value_in_set",
    "numeric_threshold",
    "required_artifact_type",
];

// ── Rule model ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Evidence,
    Economics,
    Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
    Blocking,
}

impl Severity {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Minor    => "minor",
            Self::Major    => "major",
            Self::Blocking => "blocking",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Le,
    Ge,
    Eq,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Evidence(EvidenceType),
    EconomicModel(ModelType),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "predicate", rename_all = "snake_case")]
pub enum RulePredicate {
    RequiredFieldPresent {
        field: DossierField,
    },
    RequiredValueInSet {
        field:   DossierField,
        allowed: Vec<String>,
    },
    NumericThreshold {
        field:      DossierField,
        comparator: Comparator,
        value:      f64,
    },
    RequiredArtifactType {
        artifact:         ArtifactType,
        #[serde(default = "default_min_count")]
        min_count:        usize,
        #[serde(default)]
        max_risk_of_bias: Option<RiskOfBias>,
        #[serde(default)]
        min_sample_size:  Option<u64>,
    },
}

fn default_min_count() -> usize {
    1
}

impl RulePredicate {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequiredFieldPresent { .. } => "required_field_present",
            Self::RequiredValueInSet { .. }   => "required_value_in_set",
            Self::NumericThreshold { .. }     => "numeric_threshold",
            Self::RequiredArtifactType { .. } => "required_artifact_type",
        }
    }

    /// Shape checks serde cannot express.
    fn check(&self) -> Result<(), String> {
        match self {
            Self::RequiredFieldPresent { .. } => Ok(()),
            Self::RequiredValueInSet { field, allowed } => {
                if field.kind() != FieldKind::Text {
                    return Err(format!("field '{}' is not a text field", field.name()));
                }
                if allowed.is_empty() {
                    return Err("allowed set is empty".into());
                }
                Ok(())
            }
            Self::NumericThreshold { field, value, .. } => {
                if field.kind() != FieldKind::Numeric {
                    return Err(format!("field '{}' is not numeric", field.name()));
                }
                if !value.is_finite() {
                    return Err(format!("threshold {value} is not finite"));
                }
                Ok(())
            }
            Self::RequiredArtifactType { artifact, min_count, max_risk_of_bias, min_sample_size } => {
                if *min_count == 0 {
                    return Err("min_count must be at least 1".into());
                }
                let filtered = max_risk_of_bias.is_some() || min_sample_size.is_some();
                if filtered && matches!(artifact, ArtifactType::EconomicModel(_)) {
                    return Err("evidence filters do not apply to economic models".into());
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameworkRule {
    pub id:             String,
    pub category:       RuleCategory,
    pub description:    String,
    #[serde(flatten)]
    pub predicate:      RulePredicate,
    pub severity:       Severity,
    pub remediation:    Option<String>,
    pub deadline_weeks: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSet {
    pub framework_id:   FrameworkId,
    pub version:        String,
    pub name:           String,
    pub agency:         String,
    pub country:        String,
    pub timeline_weeks: u32,
    pub rules:          Vec<FrameworkRule>,
}

// ── Wire form ──────────────────────────────────────────────────────

/// A rule as it appears in rule-set JSON. The predicate is kept as a
/// plain name plus parameters so an unknown name can be told apart from
/// malformed parameters.
#[derive(Debug, Deserialize)]
struct RawRule {
    id:             String,
    category:       RuleCategory,
    description:    String,
    predicate:      String,
    #[serde(default)]
    params:         serde_json::Value,
    severity:       Severity,
    #[serde(default)]
    remediation:    Option<String>,
    #[serde(default)]
    deadline_weeks: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawRuleSet {
    framework_id:   String,
    version:        String,
    name:           String,
    #[serde(default)]
    agency:         String,
    #[serde(default)]
    country:        String,
    timeline_weeks: u32,
    rules:          Vec<RawRule>,
}

impl RuleSet {
    /// Parse and validate one rule-set document.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let raw: RawRuleSet = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawRuleSet) -> EngineResult<Self> {
        if raw.framework_id.trim().is_empty() {
            return Err(EngineError::RuleMisconfigured {
                rule_id: "<rule set>".into(),
                reason:  "framework_id is empty".into(),
            });
        }

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(raw.rules.len());
        for rule in raw.rules {
            if !seen.insert(rule.id.clone()) {
                return Err(EngineError::RuleMisconfigured {
                    rule_id: rule.id,
                    reason:  format!("duplicate rule id in {} {}", raw.framework_id, raw.version),
                });
            }
            rules.push(parse_rule(rule)?);
        }

        Ok(Self {
            framework_id:   FrameworkId::new(raw.framework_id),
            version:        raw.version,
            name:           raw.name,
            agency:         raw.agency,
            country:        raw.country,
            timeline_weeks: raw.timeline_weeks,
            rules,
        })
    }

    pub fn summary(&self) -> FrameworkSummary {
        FrameworkSummary {
            framework_id:   self.framework_id.clone(),
            version:        self.version.clone(),
            name:           self.name.clone(),
            agency:         self.agency.clone(),
            country:        self.country.clone(),
            timeline_weeks: self.timeline_weeks,
            rule_count:     self.rules.len(),
        }
    }

    pub fn timeline(&self) -> SubmissionTimeline {
        let total = self.timeline_weeks;
        let review_week = if total > 8 { total - 8 } else { total / 2 };

        let mut milestones = vec![Milestone {
            phase: "preparation".into(),
            week:  0,
            tasks: vec![
                "Compile clinical evidence".into(),
                "Build economic model".into(),
                "Draft value dossier".into(),
            ],
        }];
        for rule in &self.rules {
            if let Some(week) = rule.deadline_weeks {
                milestones.push(Milestone {
                    phase: rule.id.clone(),
                    week,
                    tasks: vec![rule.description.clone()],
                });
            }
        }
        milestones.push(Milestone {
            phase: "agency_review".into(),
            week:  review_week,
            tasks: vec![format!("{} review period", self.agency)],
        });
        milestones.push(Milestone {
            phase: "final_decision".into(),
            week:  total,
            tasks: vec!["Receive recommendation".into()],
        });
        // Stable: same-week milestones keep insertion order.
        milestones.sort_by_key(|m| m.week);

        SubmissionTimeline {
            framework_id:   self.framework_id.clone(),
            framework_name: self.name.clone(),
            total_weeks:    total,
            milestones,
        }
    }
}

fn parse_rule(raw: RawRule) -> EngineResult<FrameworkRule> {
    if !PREDICATE_KINDS.contains(&raw.predicate.as_str()) {
        return Err(EngineError::UnknownRulePredicate {
            rule_id:   raw.id,
            predicate: raw.predicate,
        });
    }

    let mut tagged = match raw.params {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            return Err(EngineError::RuleMisconfigured {
                rule_id: raw.id,
                reason:  format!("params must be an object, got {other}"),
            })
        }
    };
    tagged.insert("predicate".into(), serde_json::Value::String(raw.predicate));

    let predicate: RulePredicate = serde_json::from_value(serde_json::Value::Object(tagged))
        .map_err(|e| EngineError::RuleMisconfigured {
            rule_id: raw.id.clone(),
            reason:  e.to_string(),
        })?;
    predicate.check().map_err(|reason| EngineError::RuleMisconfigured {
        rule_id: raw.id.clone(),
        reason,
    })?;

    Ok(FrameworkRule {
        id:             raw.id,
        category:       raw.category,
        description:    raw.description,
        predicate,
        severity:       raw.severity,
        remediation:    raw.remediation.filter(|r| !r.trim().is_empty()),
        deadline_weeks: raw.deadline_weeks,
    })
}

// ── Summaries ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkSummary {
    pub framework_id:   FrameworkId,
    pub version:        String,
    pub name:           String,
    pub agency:         String,
    pub country:        String,
    pub timeline_weeks: u32,
    pub rule_count:     usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub phase: String,
    pub week:  u32,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionTimeline {
    pub framework_id:   FrameworkId,
    pub framework_name: String,
    pub total_weeks:    u32,
    pub milestones:     Vec<Milestone>,
}

// ── Registry ───────────────────────────────────────────────────────

/// Published rule sets, keyed by framework, in publication order.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    sets: BTreeMap<FrameworkId, Vec<Arc<RuleSet>>>,
}

static BUILTIN: OnceLock<Result<RuleRegistry, String>> = OnceLock::new();

impl RuleRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The registry of shipped agency rule sets. Built on first use.
    pub fn builtin() -> EngineResult<&'static RuleRegistry> {
        let built = BUILTIN.get_or_init(|| {
            let mut registry = RuleRegistry::empty();
            for (name, json) in BUILTIN_RULE_SETS {
                let set = RuleSet::from_json(json).map_err(|e| format!("{name}: {e}"))?;
                registry.register(set).map_err(|e| format!("{name}: {e}"))?;
            }
            log::info!("builtin rule registry: {} frameworks", registry.sets.len());
            Ok(registry)
        });
        built.as_ref().map_err(|reason| EngineError::RuleMisconfigured {
            rule_id: "<builtin>".into(),
            reason:  reason.clone(),
        })
    }

    /// The builtin rule sets plus every `*.json` rule set in `dir`.
    pub fn builtin_with_dir(dir: &Path) -> EngineResult<Self> {
        let mut registry = Self::builtin()?.clone();
        registry.extend_from_dir(dir)?;
        Ok(registry)
    }

    /// Only the rule sets found in `dir`.
    pub fn load_dir(dir: &Path) -> EngineResult<Self> {
        let mut registry = Self::empty();
        registry.extend_from_dir(dir)?;
        Ok(registry)
    }

    fn extend_from_dir(&mut self, dir: &Path) -> EngineResult<()> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", dir.display()))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(anyhow::Error::from)?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        // Directory order is platform-dependent.
        paths.sort();

        for path in paths {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
            let set = RuleSet::from_json(&content)?;
            log::info!(
                "loaded rule set {} {} from {}",
                set.framework_id,
                set.version,
                path.display()
            );
            self.register(set)?;
        }
        Ok(())
    }

    /// Publish a rule set. The newest registration becomes the latest
    /// version of its framework.
    pub fn register(&mut self, set: RuleSet) -> EngineResult<Arc<RuleSet>> {
        let versions = self.sets.entry(set.framework_id.clone()).or_default();
        if versions.iter().any(|v| v.version == set.version) {
            return Err(EngineError::RuleSetAlreadyPublished {
                framework_id: set.framework_id.to_string(),
                version:      set.version,
            });
        }
        log::debug!(
            "registered {} {} ({} rules)",
            set.framework_id,
            set.version,
            set.rules.len()
        );
        let set = Arc::new(set);
        versions.push(Arc::clone(&set));
        Ok(set)
    }

    /// Rules of the latest published version.
    pub fn rules_for(&self, framework_id: &FrameworkId) -> EngineResult<&[FrameworkRule]> {
        Ok(&self.latest(framework_id)?.rules)
    }

    /// A pinned version, or the latest when `version` is `None`.
    pub fn rule_set(&self, framework_id: &FrameworkId, version: Option<&str>) -> EngineResult<Arc<RuleSet>> {
        match version {
            None => self.latest(framework_id).map(Arc::clone),
            Some(v) => self
                .versions(framework_id)?
                .iter()
                .find(|set| set.version == v)
                .cloned()
                .ok_or_else(|| EngineError::UnknownRuleSetVersion {
                    framework_id: framework_id.to_string(),
                    version:      v.to_string(),
                }),
        }
    }

    pub fn frameworks(&self) -> Vec<FrameworkSummary> {
        self.sets
            .values()
            .filter_map(|versions| versions.last())
            .map(|set| set.summary())
            .collect()
    }

    pub fn submission_timeline(&self, framework_id: &FrameworkId) -> EngineResult<SubmissionTimeline> {
        Ok(self.latest(framework_id)?.timeline())
    }

    fn versions(&self, framework_id: &FrameworkId) -> EngineResult<&[Arc<RuleSet>]> {
        self.sets
            .get(framework_id)
            .map(Vec::as_slice)
            .ok_or_else(|| EngineError::UnknownFramework {
                framework_id: framework_id.to_string(),
            })
    }

    fn latest(&self, framework_id: &FrameworkId) -> EngineResult<&Arc<RuleSet>> {
        self.versions(framework_id)?
            .last()
            .ok_or_else(|| EngineError::UnknownFramework {
                framework_id: framework_id.to_string(),
            })
    }
}

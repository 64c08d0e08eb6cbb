//! Pipeline configuration.
//!
//! Every field has a default, so `{}` is a complete configuration that
//! filters on `machine_data`, tags unmapped axes and clusters by density.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{RamiError, RamiResult};
use crate::graph::{ClusterPolicy, WeightMode};
use crate::ingest::document::read_document;
use crate::mapping::conditional::ConditionalRules;
use crate::mapping::rules::TokenRules;
use crate::mapping::{AxisMapper, RuleSource, UnmappedPolicy};

pub const ENV_UNMAPPED_POLICY: &str = "RAMI_UNMAPPED_POLICY";
pub const ENV_CLUSTER_THRESHOLD: &str = "RAMI_CLUSTER_THRESHOLD";

fn default_services() -> Vec<String> {
    vec!["machine_data".to_string()]
}

fn default_phases() -> Vec<String> {
    ["Design", "Development", "Production", "Maintenance"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_lifecycle_stages() -> Vec<String> {
    ["Concept", "Operation", "Disposal"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Services kept by the flat filter when no workflow is supplied.
    pub services: Vec<String>,
    pub cluster: ClusterPolicy,
    pub weight_mode: WeightMode,
    pub unmapped_policy: UnmappedPolicy,
    /// Engineering phases, used for phase assignment and as the first
    /// integration map columns.
    pub phases: Vec<String>,
    pub lifecycle_stages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<TokenRules>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditional_rules: Option<ConditionalRules>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            services: default_services(),
            cluster: ClusterPolicy::default(),
            weight_mode: WeightMode::default(),
            unmapped_policy: UnmappedPolicy::default(),
            phases: default_phases(),
            lifecycle_stages: default_lifecycle_stages(),
            rules: None,
            conditional_rules: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(raw: &str) -> RamiResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| RamiError::Config(format!("pipeline configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> RamiResult<Self> {
        Self::from_json(&read_document(path)?)
    }

    pub fn validate(&self) -> RamiResult<()> {
        if let ClusterPolicy::DensityThreshold { threshold } = self.cluster {
            check_threshold(threshold)?;
        }
        self.rule_source()?;
        Ok(())
    }

    /// Apply overrides from a variable lookup. Unset variables leave the
    /// field alone; a threshold override selects the density policy.
    pub fn apply_overrides<F>(mut self, lookup: F) -> RamiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_UNMAPPED_POLICY) {
            self.unmapped_policy = raw.parse()?;
            debug!(policy = ?self.unmapped_policy, "unmapped policy overridden");
        }
        if let Some(raw) = lookup(ENV_CLUSTER_THRESHOLD) {
            let threshold: f64 = raw.trim().parse().map_err(|_| {
                RamiError::Config(format!("{ENV_CLUSTER_THRESHOLD} is not a number: {raw:?}"))
            })?;
            check_threshold(threshold)?;
            self.cluster = ClusterPolicy::DensityThreshold { threshold };
            debug!(threshold, "cluster threshold overridden");
        }
        Ok(self)
    }

    pub fn with_env_overrides(self) -> RamiResult<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn rule_source(&self) -> RamiResult<RuleSource> {
        match (&self.rules, &self.conditional_rules) {
            (Some(_), Some(_)) => Err(RamiError::Config(
                "`rules` and `conditional_rules` are mutually exclusive".to_string(),
            )),
            (Some(tokens), None) => Ok(RuleSource::Tokens(tokens.clone())),
            (None, Some(conditional)) => Ok(RuleSource::Conditional(conditional.clone())),
            (None, None) => Ok(RuleSource::default()),
        }
    }

    pub fn mapper(&self) -> RamiResult<AxisMapper> {
        AxisMapper::new(self.rule_source()?, self.unmapped_policy)
    }
}

fn check_threshold(threshold: f64) -> RamiResult<()> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(())
    } else {
        Err(RamiError::Config(format!(
            "cluster threshold must be a non-negative number, got {threshold}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::rules::RuleTable;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.services, vec!["machine_data"]);
        assert_eq!(config.phases.len(), 4);
        assert_eq!(config.lifecycle_stages, vec!["Concept", "Operation", "Disposal"]);
        assert_eq!(config.unmapped_policy, UnmappedPolicy::Tag);
    }

    #[test]
    fn test_partial_document() {
        let config = PipelineConfig::from_json(
            r#"{"services": ["design_docs"], "cluster": {"policy": "agglomerative", "n_clusters": 2},
                "weight_mode": "presence", "unmapped_policy": "reject"}"#,
        )
        .unwrap();
        assert_eq!(config.services, vec!["design_docs"]);
        assert_eq!(config.cluster, ClusterPolicy::Agglomerative { n_clusters: 2 });
        assert_eq!(config.weight_mode, WeightMode::Presence);
        assert_eq!(config.unmapped_policy, UnmappedPolicy::Reject);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = PipelineConfig::from_json(r#"{"servics": []}"#).unwrap_err();
        assert!(matches!(err, RamiError::Config(_)));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let err = PipelineConfig::from_json(
            r#"{"cluster": {"policy": "density_threshold", "threshold": -2}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RamiError::Config(_)));
    }

    #[test]
    fn test_overrides_applied() {
        let config = PipelineConfig::default()
            .apply_overrides(lookup(&[
                (ENV_UNMAPPED_POLICY, "FAIL"),
                (ENV_CLUSTER_THRESHOLD, " 2.5 "),
            ]))
            .unwrap();
        assert_eq!(config.unmapped_policy, UnmappedPolicy::Fail);
        assert_eq!(config.cluster, ClusterPolicy::DensityThreshold { threshold: 2.5 });
    }

    #[test]
    fn test_absent_overrides_keep_fields() {
        let base = PipelineConfig {
            cluster: ClusterPolicy::Agglomerative { n_clusters: 3 },
            ..PipelineConfig::default()
        };
        let config = base.clone().apply_overrides(lookup(&[])).unwrap();
        assert_eq!(config, base);
    }

    #[test]
    fn test_bad_override_values() {
        let policy = PipelineConfig::default().apply_overrides(lookup(&[(ENV_UNMAPPED_POLICY, "drop")]));
        assert!(matches!(policy, Err(RamiError::Config(_))));
        let threshold =
            PipelineConfig::default().apply_overrides(lookup(&[(ENV_CLUSTER_THRESHOLD, "lots")]));
        assert!(matches!(threshold, Err(RamiError::Config(_))));
    }

    #[test]
    fn test_rule_sources_mutually_exclusive() {
        let config = PipelineConfig {
            rules: Some(TokenRules::default()),
            conditional_rules: Some(ConditionalRules {
                hierarchy_rules: RuleTable::new(Vec::new()),
                lifecycle_rules: RuleTable::new(Vec::new()),
                layer_rules: RuleTable::new(Vec::new()),
            }),
            ..PipelineConfig::default()
        };
        assert!(matches!(config.rule_source(), Err(RamiError::Config(_))));
        assert!(config.mapper().is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"phases": ["Design"]}"#).unwrap();
        let config = PipelineConfig::from_path(&path).unwrap();
        assert_eq!(config.phases, vec!["Design"]);
        assert!(matches!(
            PipelineConfig::from_path(&dir.path().join("missing.json")),
            Err(RamiError::Io(_))
        ));
    }
}

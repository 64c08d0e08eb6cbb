//! Rule tables for the three RAMI 4.0 axes.
//!
//! Rules are plain data: an ordered list of `{"conditions", "mapping"}`
//! entries. Evaluation is always in table order, so the first matching rule
//! wins for scalar axes and every matching rule contributes for the layer
//! axis. The built-in tables below are only defaults; any table can be
//! replaced by a JSON document passed to the mapper.

use serde::{Deserialize, Serialize};

use crate::errors::{RamiError, RamiResult};
use crate::models::{HIERARCHY_LEVELS, LIFECYCLE_STAGES, MAX_LAYER};

/// One condition → mapping entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule<C, M> {
    pub conditions: C,
    pub mapping: M,
}

impl<C, M> Rule<C, M> {
    pub fn new(conditions: C, mapping: M) -> Self {
        Self {
            conditions,
            mapping,
        }
    }
}

/// Ordered rule list with a caller-supplied comparator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable<C, M> {
    rules: Vec<Rule<C, M>>,
}

impl<C, M> RuleTable<C, M> {
    pub fn new(rules: Vec<Rule<C, M>>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule<C, M>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Mapping of the first rule whose conditions satisfy `matches`.
    pub fn first_match<F>(&self, mut matches: F) -> Option<&M>
    where
        F: FnMut(&C) -> bool,
    {
        self.rules
            .iter()
            .find(|rule| matches(&rule.conditions))
            .map(|rule| &rule.mapping)
    }

    /// Mappings of every rule whose conditions satisfy `matches`.
    pub fn all_matches<'a, F>(&'a self, mut matches: F) -> impl Iterator<Item = &'a M> + 'a
    where
        F: FnMut(&C) -> bool + 'a,
    {
        self.rules
            .iter()
            .filter(move |rule| matches(&rule.conditions))
            .map(|rule| &rule.mapping)
    }
}

impl<C, M> FromIterator<(C, M)> for RuleTable<C, M> {
    fn from_iter<I: IntoIterator<Item = (C, M)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(c, m)| Rule::new(c, m)).collect())
    }
}

// ---------------------------------------------------------------------------
// Token tables
// ---------------------------------------------------------------------------

/// Exact `(type, role)` pair for the hierarchy axis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyCondition {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
}

impl HierarchyCondition {
    pub fn new(kind: &str, role: &str) -> Self {
        Self {
            kind: kind.to_string(),
            role: role.to_string(),
        }
    }

    pub fn matches(&self, kind: &str, role: &str) -> bool {
        self.kind == kind && self.role == role
    }
}

/// Reference token searched for in `provides` or `shell` entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCondition {
    pub token: String,
}

impl TokenCondition {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }
}

/// How a lifecycle token is compared with a `provides` entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenMatch {
    #[default]
    Substring,
    Exact,
}

impl TokenMatch {
    pub fn matches(self, candidate: &str, token: &str) -> bool {
        match self {
            TokenMatch::Substring => candidate.contains(token),
            TokenMatch::Exact => candidate == token,
        }
    }
}

/// Token-based rules: exact pair for X, token scan of `provides` for Y and
/// of lower-cased `shell` entries for Z.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenRules {
    pub hierarchy_rules: RuleTable<HierarchyCondition, f64>,
    pub lifecycle_rules: RuleTable<TokenCondition, f64>,
    #[serde(default)]
    pub lifecycle_match: TokenMatch,
    pub layer_rules: RuleTable<TokenCondition, u8>,
}

impl Default for TokenRules {
    fn default() -> Self {
        let hierarchy_rules = [
            ("Field Device", "sensor", 1.0),
            ("Control Device", "controller", 2.0),
            ("Station", "assembly", 3.0),
            ("Work Center", "workflow", 4.0),
            ("Enterprise", "analytics", 5.0),
            ("Connected World", "cloud", 6.0),
        ]
        .into_iter()
        .map(|(kind, role, level)| (HierarchyCondition::new(kind, role), level))
        .collect();

        let lifecycle_rules = [
            ("design_docs", 0.0),
            ("support_data", 1.0),
            ("machine_data", 2.0),
            ("maintenance_logs", 3.0),
        ]
        .into_iter()
        .map(|(token, stage)| (TokenCondition::new(token), stage))
        .collect();

        let layer_rules = [
            ("physical", 0),
            ("integration", 1),
            ("communication", 2),
            ("information", 3),
            ("function", 4),
            ("business", 5),
        ]
        .into_iter()
        .map(|(token, layer)| (TokenCondition::new(token), layer))
        .collect();

        Self {
            hierarchy_rules,
            lifecycle_rules,
            lifecycle_match: TokenMatch::Substring,
            layer_rules,
        }
    }
}

impl TokenRules {
    pub fn from_json(raw: &str) -> RamiResult<Self> {
        let rules: Self = serde_json::from_str(raw)
            .map_err(|e| RamiError::MalformedInput(format!("token rules: {e}")))?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn with_lifecycle_match(mut self, mode: TokenMatch) -> Self {
        self.lifecycle_match = mode;
        self
    }

    pub fn validate(&self) -> RamiResult<()> {
        for rule in self.hierarchy_rules.rules() {
            check_scalar("hierarchy", rule.mapping, HIERARCHY_LEVELS)?;
        }
        for rule in self.lifecycle_rules.rules() {
            check_scalar("lifecycle", rule.mapping, LIFECYCLE_STAGES)?;
        }
        for rule in self.layer_rules.rules() {
            check_layer(rule.mapping)?;
            if rule.conditions.token != rule.conditions.token.to_lowercase() {
                return Err(RamiError::InvalidRules(format!(
                    "layer token {:?} must be lower-case",
                    rule.conditions.token
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn check_scalar(axis: &str, value: f64, (low, high): (f64, f64)) -> RamiResult<()> {
    if value.is_finite() && value >= low && value <= high {
        Ok(())
    } else {
        Err(RamiError::InvalidRules(format!(
            "{axis} mapping {value} outside [{low}, {high}]"
        )))
    }
}

pub(crate) fn check_layer(layer: u8) -> RamiResult<()> {
    if layer <= MAX_LAYER {
        Ok(())
    } else {
        Err(RamiError::InvalidRules(format!(
            "layer code {layer} outside 0..={MAX_LAYER}"
        )))
    }
}

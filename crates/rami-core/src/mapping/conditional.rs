//! Attribute-condition rule tables loaded from a mapping configuration
//! document `{"hierarchy_rules", "lifecycle_rules", "layer_rules"}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{RamiError, RamiResult};
use crate::ingest::schema::resolve_path;
use crate::mapping::rules::{check_layer, check_scalar, RuleTable};
use crate::models::{LayerSet, Microsystem, HIERARCHY_LEVELS, LIFECYCLE_STAGES};

/// `{attribute: expected value}`; all entries must hold.
pub type Conditions = Map<String, Value>;

/// Layer mapping: a single code or a list of codes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerMapping {
    One(u8),
    Many(Vec<u8>),
}

impl LayerMapping {
    pub fn layers(&self) -> LayerSet {
        match self {
            LayerMapping::One(layer) => [*layer].into_iter().collect(),
            LayerMapping::Many(layers) => layers.iter().copied().collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionalRules {
    pub hierarchy_rules: RuleTable<Conditions, f64>,
    pub lifecycle_rules: RuleTable<Conditions, f64>,
    pub layer_rules: RuleTable<Conditions, LayerMapping>,
}

impl ConditionalRules {
    pub fn from_json(raw: &str) -> RamiResult<Self> {
        let rules: Self = serde_json::from_str(raw)
            .map_err(|e| RamiError::MalformedInput(format!("mapping configuration: {e}")))?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> RamiResult<()> {
        for rule in self.hierarchy_rules.rules() {
            check_scalar("hierarchy", rule.mapping, HIERARCHY_LEVELS)?;
        }
        for rule in self.lifecycle_rules.rules() {
            check_scalar("lifecycle", rule.mapping, LIFECYCLE_STAGES)?;
        }
        for rule in self.layer_rules.rules() {
            let layers = rule.mapping.layers();
            if layers.is_empty() {
                return Err(RamiError::InvalidRules(
                    "layer mapping must name at least one layer".to_string(),
                ));
            }
            for layer in layers.iter() {
                check_layer(layer)?;
            }
        }
        Ok(())
    }
}

/// Look up a condition attribute. Plain names resolve against the
/// `microsystem` object; dotted names resolve from the record root.
fn attribute<'a>(record: &'a Value, name: &str) -> Option<&'a Value> {
    if name.contains('.') {
        resolve_path(record, name)
    } else {
        record.get("microsystem")?.get(name)
    }
}

/// JSON equality where numbers compare by value (`1 == 1.0`).
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => left == right,
    }
}

/// True when every condition equals the record's attribute. An absent
/// attribute only matches an expected `null`.
pub fn conditions_match(conditions: &Conditions, microsystem: &Microsystem) -> bool {
    conditions.iter().all(|(name, expected)| {
        let actual = attribute(&microsystem.raw, name).unwrap_or(&Value::Null);
        values_equal(actual, expected)
    })
}

//! Projection of validated microsystems onto the RAMI 4.0 axes.

use std::str::FromStr;

use pyo3::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::{RamiError, RamiResult};
use crate::ingest::document::parse_input_document;
use crate::ingest::schema::validate_batch;
use crate::mapping::conditional::{conditions_match, ConditionalRules};
use crate::mapping::rules::TokenRules;
use crate::models::{
    Axis, AxisValue, Coordinates, LayerSet, MappedMicrosystem, Microsystem, MicrosystemId,
    RecordError,
};

/// Where the axis rules come from.
#[derive(Clone, Debug, PartialEq)]
pub enum RuleSource {
    Tokens(TokenRules),
    Conditional(ConditionalRules),
}

impl Default for RuleSource {
    fn default() -> Self {
        RuleSource::Tokens(TokenRules::default())
    }
}

impl RuleSource {
    /// Pick the rule source from at most one of a token rules document or
    /// an attribute-condition mapping configuration.
    pub fn from_documents(
        rules_json: Option<&str>,
        mapping_config_json: Option<&str>,
    ) -> RamiResult<Self> {
        match (rules_json, mapping_config_json) {
            (Some(_), Some(_)) => Err(RamiError::Config(
                "token rules and a mapping configuration are mutually exclusive".to_string(),
            )),
            (Some(raw), None) => Ok(RuleSource::Tokens(TokenRules::from_json(raw)?)),
            (None, Some(raw)) => Ok(RuleSource::Conditional(ConditionalRules::from_json(raw)?)),
            (None, None) => Ok(RuleSource::default()),
        }
    }
}

/// What happens to a record when an axis has no matching rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedPolicy {
    /// Keep the record with the sentinel and report a notice.
    #[default]
    Tag,
    /// Drop the record and report it next to the schema errors.
    Reject,
    /// Abort the whole batch.
    Fail,
}

impl FromStr for UnmappedPolicy {
    type Err = RamiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "tag" => Ok(UnmappedPolicy::Tag),
            "reject" => Ok(UnmappedPolicy::Reject),
            "fail" => Ok(UnmappedPolicy::Fail),
            other => Err(RamiError::Config(format!("unknown unmapped policy {other:?}"))),
        }
    }
}

/// An axis left unresolved for one record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnmappedAxisNotice {
    pub index: usize,
    pub id: MicrosystemId,
    pub axis: Axis,
}

#[derive(Debug, Default)]
pub struct MappingOutcome {
    pub mapped: Vec<MappedMicrosystem>,
    pub unmapped: Vec<UnmappedAxisNotice>,
    pub rejected: Vec<RecordError>,
}

#[derive(Clone, Debug, Default)]
pub struct AxisMapper {
    rules: RuleSource,
    policy: UnmappedPolicy,
}

impl AxisMapper {
    pub fn new(rules: RuleSource, policy: UnmappedPolicy) -> RamiResult<Self> {
        match &rules {
            RuleSource::Tokens(tables) => tables.validate()?,
            RuleSource::Conditional(tables) => tables.validate()?,
        }
        Ok(Self { rules, policy })
    }

    pub fn policy(&self) -> UnmappedPolicy {
        self.policy
    }

    pub fn rules(&self) -> &RuleSource {
        &self.rules
    }

    /// Hierarchy level from the exact `(type, role)` pair.
    pub fn map_x(&self, microsystem: &Microsystem) -> AxisValue {
        let level = match &self.rules {
            RuleSource::Tokens(tables) => match (&microsystem.kind, &microsystem.role) {
                (Some(kind), Some(role)) => tables
                    .hierarchy_rules
                    .first_match(|c| c.matches(kind, role)),
                _ => None,
            },
            RuleSource::Conditional(tables) => tables
                .hierarchy_rules
                .first_match(|c| conditions_match(c, microsystem)),
        };
        AxisValue::from_option(level.copied())
    }

    /// Lifecycle stage of the first `provides` entry that carries a token.
    /// Entries are scanned in order and, per entry, rules in table order.
    pub fn map_y(&self, microsystem: &Microsystem) -> AxisValue {
        let stage = match &self.rules {
            RuleSource::Tokens(tables) => microsystem.provides.iter().find_map(|entry| {
                tables
                    .lifecycle_rules
                    .first_match(|c| tables.lifecycle_match.matches(entry, &c.token))
            }),
            RuleSource::Conditional(tables) => tables
                .lifecycle_rules
                .first_match(|c| conditions_match(c, microsystem)),
        };
        AxisValue::from_option(stage.copied())
    }

    /// Every layer named by any shell entry.
    pub fn map_z(&self, microsystem: &Microsystem) -> LayerSet {
        match &self.rules {
            RuleSource::Tokens(tables) => microsystem
                .shell
                .iter()
                .flat_map(|entry| {
                    let lowered = entry.to_lowercase();
                    tables
                        .layer_rules
                        .all_matches(move |c| lowered.contains(&c.token))
                        .copied()
                })
                .collect(),
            RuleSource::Conditional(tables) => tables
                .layer_rules
                .first_match(|c| conditions_match(c, microsystem))
                .map(|mapping| mapping.layers())
                .unwrap_or_default(),
        }
    }

    pub fn coordinates(&self, microsystem: &Microsystem) -> Coordinates {
        Coordinates {
            x: self.map_x(microsystem),
            y: self.map_y(microsystem),
            z: self.map_z(microsystem),
        }
    }

    /// Map one record, applying the unmapped policy.
    pub fn map_record(&self, microsystem: Microsystem) -> RamiResult<MappedRecord> {
        let coordinates = self.coordinates(&microsystem);
        let unmapped = coordinates.unmapped_axes();
        if unmapped.is_empty() {
            return Ok(MappedRecord::Mapped(MappedMicrosystem {
                microsystem,
                coordinates,
            }));
        }
        match self.policy {
            UnmappedPolicy::Tag => {
                let notices = unmapped
                    .into_iter()
                    .map(|axis| UnmappedAxisNotice {
                        index: microsystem.index,
                        id: microsystem.id.clone(),
                        axis,
                    })
                    .collect();
                Ok(MappedRecord::Tagged(
                    MappedMicrosystem {
                        microsystem,
                        coordinates,
                    },
                    notices,
                ))
            }
            UnmappedPolicy::Reject => {
                let axes: Vec<String> = unmapped.iter().map(Axis::to_string).collect();
                Ok(MappedRecord::Rejected(RecordError::new(
                    microsystem.index,
                    format!("Unmapped axis: {}", axes.join(", ")),
                )))
            }
            UnmappedPolicy::Fail => Err(RamiError::UnmappedAxis {
                id: microsystem.id.to_string(),
                axis: unmapped[0],
            }),
        }
    }

    pub fn map_batch(&self, microsystems: Vec<Microsystem>) -> RamiResult<MappingOutcome> {
        let mut outcome = MappingOutcome::default();
        for microsystem in microsystems {
            match self.map_record(microsystem)? {
                MappedRecord::Mapped(mapped) => outcome.mapped.push(mapped),
                MappedRecord::Tagged(mapped, notices) => {
                    for notice in &notices {
                        debug!(id = %notice.id, axis = %notice.axis, "axis left unmapped");
                    }
                    outcome.unmapped.extend(notices);
                    outcome.mapped.push(mapped);
                }
                MappedRecord::Rejected(error) => {
                    warn!(index = error.index, error = %error.error, "record rejected by mapper");
                    outcome.rejected.push(error);
                }
            }
        }
        info!(
            mapped = outcome.mapped.len(),
            unmapped_axes = outcome.unmapped.len(),
            rejected = outcome.rejected.len(),
            "mapped microsystems onto RAMI axes"
        );
        Ok(outcome)
    }
}

/// Result of mapping a single record.
#[derive(Debug)]
pub enum MappedRecord {
    Mapped(MappedMicrosystem),
    Tagged(MappedMicrosystem, Vec<UnmappedAxisNotice>),
    Rejected(RecordError),
}

/// Validate and map a `{"microsystems": [...]}` document.
#[pyfunction]
#[pyo3(signature = (input_json, rules_json=None, unmapped_policy="tag", mapping_config_json=None))]
pub fn map_microsystems(
    input_json: &str,
    rules_json: Option<&str>,
    unmapped_policy: &str,
    mapping_config_json: Option<&str>,
) -> PyResult<String> {
    let rules = RuleSource::from_documents(rules_json, mapping_config_json)?;
    let mapper = AxisMapper::new(rules, unmapped_policy.parse()?)?;
    let validation = validate_batch(parse_input_document(input_json)?);
    let mut errors = validation.errors;
    let outcome = mapper.map_batch(validation.valid)?;
    errors.extend(outcome.rejected);
    errors.sort_by_key(|e| e.index);
    let document = json!({
        "microsystems": outcome.mapped,
        "unmapped": outcome.unmapped,
        "errors": errors,
    });
    Ok(serde_json::to_string(&document).map_err(RamiError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::conditional::LayerMapping;
    use crate::mapping::rules::{Rule, RuleTable, TokenMatch};
    use serde_json::{json, Value};

    fn record(id: &str, kind: &str, role: &str, provides: &[&str], shell: &[&str]) -> Microsystem {
        let raw = json!({
            "microsystem": {
                "id": id,
                "name": format!("{id} name"),
                "description": "",
                "type": kind,
                "role": role,
                "asset": {},
                "shell": shell,
                "provides": provides,
                "consumes": []
            },
            "microsystem_stakeholder": {"id": "S1", "description": "OEM"}
        });
        Microsystem::from_record(0, raw).unwrap()
    }

    fn m1() -> Microsystem {
        record(
            "M1",
            "Field Device",
            "sensor",
            &["machine_data_x"],
            &["Physical", "Information"],
        )
    }

    #[test]
    fn test_field_sensor_scenario() {
        let mapper = AxisMapper::default();
        let coords = mapper.coordinates(&m1());
        assert_eq!(coords.x, AxisValue::Mapped(1.0));
        assert_eq!(coords.y, AxisValue::Mapped(2.0));
        assert_eq!(coords.z, [0, 3].into_iter().collect());
    }

    #[test]
    fn test_exact_lifecycle_match_leaves_y_unmapped() {
        let rules = TokenRules::default().with_lifecycle_match(TokenMatch::Exact);
        let mapper = AxisMapper::new(RuleSource::Tokens(rules), UnmappedPolicy::Tag).unwrap();
        let coords = mapper.coordinates(&m1());
        assert_eq!(coords.x, AxisValue::Mapped(1.0));
        assert_eq!(coords.y, AxisValue::Unmapped);
        assert_eq!(coords.y.value(), -1.0);
    }

    #[test]
    fn test_hierarchy_requires_exact_pair() {
        let mapper = AxisMapper::default();
        let m = record("M", "Field device", "sensor", &[], &[]);
        assert_eq!(mapper.map_x(&m), AxisValue::Unmapped);
        let m = record("M", "Enterprise", "analytics", &[], &[]);
        assert_eq!(mapper.map_x(&m), AxisValue::Mapped(5.0));
    }

    #[test]
    fn test_lifecycle_first_provides_entry_wins() {
        let mapper = AxisMapper::default();
        let m = record("M", "Station", "assembly", &["x_maintenance_logs", "design_docs"], &[]);
        assert_eq!(mapper.map_y(&m), AxisValue::Mapped(3.0));
    }

    #[test]
    fn test_lifecycle_rule_order_within_entry() {
        let mapper = AxisMapper::default();
        let m = record("M", "Station", "assembly", &["machine_data+design_docs"], &[]);
        assert_eq!(mapper.map_y(&m), AxisValue::Mapped(0.0));
    }

    #[test]
    fn test_layers_deduplicated_and_case_insensitive() {
        let mapper = AxisMapper::default();
        let m = record(
            "M",
            "Station",
            "assembly",
            &[],
            &["BUSINESS process", "business", "Communication/Integration"],
        );
        let layers: Vec<u8> = mapper.map_z(&m).iter().collect();
        assert_eq!(layers, vec![1, 2, 5]);
    }

    #[test]
    fn test_tag_policy_reports_notices() {
        let mapper = AxisMapper::default();
        let m = record("M9", "Unknown", "thing", &["design_docs"], &[]);
        let outcome = mapper.map_batch(vec![m]).unwrap();
        assert_eq!(outcome.mapped.len(), 1);
        let axes: Vec<Axis> = outcome.unmapped.iter().map(|n| n.axis).collect();
        assert_eq!(axes, vec![Axis::X, Axis::Z]);
        assert_eq!(outcome.mapped[0].coordinates.x.value(), -1.0);
    }

    #[test]
    fn test_reject_policy_drops_record() {
        let mapper = AxisMapper::new(RuleSource::default(), UnmappedPolicy::Reject).unwrap();
        let outcome = mapper
            .map_batch(vec![m1(), record("M2", "Unknown", "thing", &[], &["physical"])])
            .unwrap();
        assert_eq!(outcome.mapped.len(), 1);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].error, "Unmapped axis: X, Y");
    }

    #[test]
    fn test_fail_policy_aborts_batch() {
        let mapper = AxisMapper::new(RuleSource::default(), UnmappedPolicy::Fail).unwrap();
        let err = mapper
            .map_batch(vec![record("M2", "Unknown", "thing", &[], &["physical"])])
            .unwrap_err();
        match err {
            RamiError::UnmappedAxis { id, axis } => {
                assert_eq!(id, "M2");
                assert_eq!(axis, Axis::X);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_conditional_rules_first_match() {
        let conditions = |v: Value| v.as_object().unwrap().clone();
        let rules = ConditionalRules {
            hierarchy_rules: RuleTable::new(vec![
                Rule::new(conditions(json!({"role": "sensor"})), 1.0),
                Rule::new(conditions(json!({})), 6.0),
            ]),
            lifecycle_rules: RuleTable::new(vec![]),
            layer_rules: RuleTable::new(vec![Rule::new(
                conditions(json!({"type": "Field Device"})),
                LayerMapping::Many(vec![0, 3, 3]),
            )]),
        };
        let mapper = AxisMapper::new(RuleSource::Conditional(rules), UnmappedPolicy::Tag).unwrap();
        let coords = mapper.coordinates(&m1());
        assert_eq!(coords.x, AxisValue::Mapped(1.0));
        assert_eq!(coords.y, AxisValue::Unmapped);
        assert_eq!(coords.z, [0, 3].into_iter().collect());
    }

    #[test]
    fn test_null_type_leaves_hierarchy_unmapped() {
        let mut raw = m1().raw;
        raw["microsystem"]["type"] = Value::Null;
        let m = Microsystem::from_record(0, raw).unwrap();
        let coords = AxisMapper::default().coordinates(&m);
        assert_eq!(coords.x, AxisValue::Unmapped);
        assert_eq!(coords.y, AxisValue::Mapped(2.0));
    }

    #[test]
    fn test_mapping_configuration_document_selects_conditional_rules() {
        let raw = r#"{
            "hierarchy_rules": [{"conditions": {"role": "sensor"}, "mapping": 1.0}],
            "lifecycle_rules": [{"conditions": {"type": "Field Device"}, "mapping": 2}],
            "layer_rules": [{"conditions": {}, "mapping": [0, 3]}]
        }"#;
        let rules = RuleSource::from_documents(None, Some(raw)).unwrap();
        assert!(matches!(rules, RuleSource::Conditional(_)));
        let mapper = AxisMapper::new(rules, UnmappedPolicy::Tag).unwrap();
        let coords = mapper.coordinates(&m1());
        assert_eq!(coords.x, AxisValue::Mapped(1.0));
        assert_eq!(coords.y, AxisValue::Mapped(2.0));
        assert_eq!(coords.z, [0, 3].into_iter().collect());

        assert!(matches!(
            RuleSource::from_documents(Some("{}"), Some(raw)),
            Err(RamiError::Config(_))
        ));
        assert_eq!(RuleSource::from_documents(None, None).unwrap(), RuleSource::default());
    }

    #[test]
    fn test_invalid_rules_refused_by_constructor() {
        let mut rules = TokenRules::default();
        rules.lifecycle_rules = RuleTable::new(vec![Rule::new(
            crate::mapping::rules::TokenCondition::new("x"),
            4.5,
        )]);
        assert!(AxisMapper::new(RuleSource::Tokens(rules), UnmappedPolicy::Tag).is_err());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Reject".parse::<UnmappedPolicy>().unwrap(), UnmappedPolicy::Reject);
        assert!("prompt".parse::<UnmappedPolicy>().is_err());
    }

    #[test]
    fn test_mapping_keeps_non_coordinate_fields() {
        let original = m1();
        let outcome = AxisMapper::default().map_batch(vec![original.clone()]).unwrap();
        let mut doc = outcome.mapped[0].to_document();
        doc.as_object_mut().unwrap().remove("coordinates");
        assert_eq!(doc, original.raw);
    }
}

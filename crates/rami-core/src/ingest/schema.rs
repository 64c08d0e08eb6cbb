//! Required-field validation for raw microsystem records.

use pyo3::prelude::*;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::RamiError;
use crate::ingest::document::parse_input_document;
use crate::models::{Microsystem, RecordError};

/// Dotted paths every record must carry, checked in this order.
pub const REQUIRED_FIELDS: &[&str] = &[
    "microsystem.id",
    "microsystem.name",
    "microsystem.description",
    "microsystem.type",
    "microsystem.role",
    "microsystem.asset",
    "microsystem.shell",
    "microsystem.provides",
    "microsystem.consumes",
    "microsystem_stakeholder.id",
    "microsystem_stakeholder.description",
];

/// Resolve a dotted path. Any non-object along the way counts as absent.
pub fn resolve_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |node, key| node.as_object()?.get(key))
}

/// Presence check only: a field holding `null` or `[]` is present.
/// Returns the first missing path.
pub fn validate_record(record: &Value) -> Result<(), &'static str> {
    for path in REQUIRED_FIELDS {
        if resolve_path(record, path).is_none() {
            return Err(*path);
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub valid: Vec<Microsystem>,
    pub errors: Vec<RecordError>,
}

impl ValidationOutcome {
    /// `{"valid": [...raw records], "errors": [...]}`.
    pub fn to_document(&self) -> Value {
        let valid: Vec<&Value> = self.valid.iter().map(|m| &m.raw).collect();
        json!({ "valid": valid, "errors": self.errors })
    }
}

impl Serialize for ValidationOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

/// Partition a batch into typed valid records and per-record errors.
pub fn validate_batch(records: Vec<Value>) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    for (index, record) in records.into_iter().enumerate() {
        if let Err(path) = validate_record(&record) {
            debug!(index, path, "record missing required field");
            outcome
                .errors
                .push(RecordError::new(index, format!("Missing required field: {path}")));
            continue;
        }
        match Microsystem::from_record(index, record) {
            Ok(microsystem) => outcome.valid.push(microsystem),
            Err(err) => {
                debug!(index, path = err.path, "record has an unusable field");
                outcome.errors.push(RecordError::new(index, err.to_string()));
            }
        }
    }
    info!(
        valid = outcome.valid.len(),
        rejected = outcome.errors.len(),
        "validated microsystem batch"
    );
    outcome
}

#[pyfunction]
pub fn validate_microsystems(input_json: &str) -> PyResult<String> {
    let records = parse_input_document(input_json)?;
    let outcome = validate_batch(records);
    Ok(serde_json::to_string(&outcome).map_err(RamiError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record(id: &str) -> Value {
        json!({
            "microsystem": {
                "id": id,
                "name": "Sensor",
                "description": "Temperature sensor",
                "type": "Field Device",
                "role": "sensor",
                "asset": "thermo-1",
                "shell": ["Physical"],
                "provides": ["machine_data"],
                "consumes": []
            },
            "microsystem_stakeholder": {"id": "S1", "description": "OEM"}
        })
    }

    fn remove_path(record: &mut Value, path: &str) {
        let (parent, leaf) = path.rsplit_once('.').unwrap();
        record[parent].as_object_mut().unwrap().remove(leaf);
    }

    #[test]
    fn test_complete_record_is_valid() {
        assert_eq!(validate_record(&full_record("M1")), Ok(()));
    }

    #[test]
    fn test_each_missing_field_reported_by_path() {
        for path in REQUIRED_FIELDS {
            let mut record = full_record("M1");
            remove_path(&mut record, path);
            let outcome = validate_batch(vec![record]);
            assert!(outcome.valid.is_empty());
            assert_eq!(outcome.errors.len(), 1);
            assert_eq!(
                outcome.errors[0].error,
                format!("Missing required field: {path}")
            );
        }
    }

    #[test]
    fn test_first_missing_path_wins() {
        let mut record = full_record("M1");
        remove_path(&mut record, "microsystem.role");
        remove_path(&mut record, "microsystem.name");
        assert_eq!(validate_record(&record), Err("microsystem.name"));
    }

    #[test]
    fn test_falsy_values_count_as_present() {
        let mut record = full_record("M1");
        record["microsystem"]["asset"] = Value::Null;
        record["microsystem"]["description"] = json!("");
        assert_eq!(validate_record(&record), Ok(()));
    }

    #[test]
    fn test_missing_parent_object() {
        let mut record = full_record("M1");
        record.as_object_mut().unwrap().remove("microsystem_stakeholder");
        assert_eq!(validate_record(&record), Err("microsystem_stakeholder.id"));
    }

    #[test]
    fn test_non_object_record() {
        assert_eq!(validate_record(&json!(42)), Err("microsystem.id"));
    }

    #[test]
    fn test_batch_indices_refer_to_input_positions() {
        let mut broken = full_record("M2");
        remove_path(&mut broken, "microsystem.shell");
        let mut mistyped = full_record("M3");
        mistyped["microsystem"]["id"] = json!(["M3"]);

        let outcome = validate_batch(vec![full_record("M1"), broken, mistyped, full_record("M4")]);
        let ids: Vec<&str> = outcome.valid.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["M1", "M4"]);
        assert_eq!(outcome.valid[1].index, 3);
        assert_eq!(outcome.errors[0].index, 1);
        assert_eq!(outcome.errors[1].index, 2);
        assert_eq!(outcome.errors[1].error, "Invalid field type: microsystem.id");
    }

    #[test]
    fn test_present_null_fields_keep_record_in_batch() {
        let mut record = full_record("M1");
        record["microsystem"]["name"] = Value::Null;
        record["microsystem"]["description"] = Value::Null;
        record["microsystem"]["type"] = Value::Null;
        record["microsystem"]["consumes"] = Value::Null;
        record["microsystem"]["interactions"] = Value::Null;
        record["microsystem_stakeholder"]["description"] = Value::Null;
        record["metrics"] = json!({"cost": "12.5"});

        let outcome = validate_batch(vec![record.clone()]);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.valid.len(), 1);
        let microsystem = &outcome.valid[0];
        assert_eq!(microsystem.kind, None);
        assert!(microsystem.consumes.is_empty());
        assert_eq!(microsystem.metrics.cost, Some(12.5));
        assert_eq!(microsystem.raw, record);
    }

    #[test]
    fn test_valid_records_unchanged() {
        let record = full_record("M1");
        let outcome = validate_batch(vec![record.clone()]);
        assert_eq!(outcome.valid[0].raw, record);
    }
}

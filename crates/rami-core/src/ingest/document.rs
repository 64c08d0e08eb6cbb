//! Parsing of the JSON documents crossing the process boundary.

use std::path::Path;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::{RamiError, RamiResult};
use crate::guards::MAX_WORKFLOW_STEPS;
use crate::models::{Metrics, MicrosystemId, Workflow};

/// External per-ID metric table: `{"M1": {"cost": 3, "value": 9}, ...}`.
pub type MetricsTable = IndexMap<MicrosystemId, Metrics>;

/// Per-stakeholder values keyed by phase or stage name.
pub type StakeholderValues = IndexMap<String, IndexMap<String, f64>>;

/// SHA-256 hex digest of a raw document.
pub fn input_digest(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn read_document(path: &Path) -> RamiResult<String> {
    Ok(std::fs::read_to_string(path)?)
}

fn parse_json(raw: &str, what: &str) -> RamiResult<Value> {
    serde_json::from_str(raw)
        .map_err(|e| RamiError::MalformedInput(format!("{what} is not valid JSON: {e}")))
}

fn parse_typed<T: DeserializeOwned>(raw: &str, what: &str) -> RamiResult<T> {
    let value = parse_json(raw, what)?;
    serde_json::from_value(value)
        .map_err(|e| RamiError::MalformedInput(format!("{what} has an unexpected shape: {e}")))
}

/// Extract the raw records of `{"microsystems": [...]}`.
pub fn parse_input_document(raw: &str) -> RamiResult<Vec<Value>> {
    let value = parse_json(raw, "input document")?;
    records_from_value(value)
}

pub fn records_from_value(value: Value) -> RamiResult<Vec<Value>> {
    let Value::Object(mut document) = value else {
        return Err(RamiError::MalformedInput(
            "input document must be a JSON object".to_string(),
        ));
    };
    match document.remove("microsystems") {
        Some(Value::Array(records)) => Ok(records),
        Some(_) => Err(RamiError::MalformedInput(
            "`microsystems` must be a list".to_string(),
        )),
        None => Err(RamiError::MalformedInput(
            "missing top-level `microsystems` key".to_string(),
        )),
    }
}

pub fn parse_workflow(raw: &str) -> RamiResult<Workflow> {
    let workflow: Workflow = parse_typed(raw, "workflow document")?;
    if workflow.steps.len() > MAX_WORKFLOW_STEPS {
        return Err(RamiError::Capacity {
            limit: MAX_WORKFLOW_STEPS,
            actual: workflow.steps.len(),
        });
    }
    Ok(workflow)
}

pub fn parse_metrics_table(raw: &str) -> RamiResult<MetricsTable> {
    parse_typed(raw, "metrics table")
}

pub fn parse_stakeholder_values(raw: &str) -> RamiResult<StakeholderValues> {
    parse_typed(raw, "stakeholder values")
}

pub fn read_input_document(path: &Path) -> RamiResult<Vec<Value>> {
    parse_input_document(&read_document(path)?)
}

pub fn read_workflow(path: &Path) -> RamiResult<Workflow> {
    parse_workflow(&read_document(path)?)
}

//! Shared typed models used across validation, mapping, filtering and
//! projection stages.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// Axis constants
// ---------------------------------------------------------------------------

/// Reserved value for an axis that no rule could resolve.
pub const UNMAPPED: f64 = -1.0;

/// Inclusive range of hierarchy levels on the X axis.
pub const HIERARCHY_LEVELS: (f64, f64) = (1.0, 6.0);

/// Inclusive range of lifecycle stages on the Y axis.
pub const LIFECYCLE_STAGES: (f64, f64) = (0.0, 3.0);

/// Highest architecture layer code on the Z axis.
pub const MAX_LAYER: u8 = 5;

/// Phase reported for microsystems that declare none.
pub const UNSPECIFIED_PHASE: &str = "unspecified";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum KeyRepr {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl From<KeyRepr> for String {
    fn from(repr: KeyRepr) -> String {
        match repr {
            KeyRepr::Text(s) => s,
            KeyRepr::Signed(n) => n.to_string(),
            KeyRepr::Unsigned(n) => n.to_string(),
        }
    }
}

/// Identifier of a microsystem. Integer identifiers are normalised to their
/// decimal string form so every index keys on a string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "KeyRepr", into = "String")]
pub struct MicrosystemId(String);

impl MicrosystemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<KeyRepr> for MicrosystemId {
    fn from(repr: KeyRepr) -> Self {
        Self(repr.into())
    }
}

impl From<MicrosystemId> for String {
    fn from(id: MicrosystemId) -> String {
        id.0
    }
}

impl From<&str> for MicrosystemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for MicrosystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl MicrosystemId {
    /// Read an identifier out of a JSON value. Only strings and integers
    /// qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient field readers
// ---------------------------------------------------------------------------

// Presence is checked by the schema validator; a present field with an odd
// value degrades to empty instead of rejecting the record.

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(text_of(&Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_opt_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(text_of(&Value::deserialize(deserializer)?))
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(number_of(&Value::deserialize(deserializer)?))
}

/// A list of strings. A bare scalar counts as a one-element list and
/// anything else as empty.
fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().filter_map(text_of).collect(),
        other => text_of(&other).into_iter().collect(),
    })
}

fn lenient_ids<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<MicrosystemId>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().filter_map(MicrosystemId::from_value).collect(),
        other => MicrosystemId::from_value(&other).into_iter().collect(),
    })
}

fn lenient_metrics<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Metrics>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_object() {
        Ok(Metrics::deserialize(&value).ok())
    } else {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Axes and coordinates
// ---------------------------------------------------------------------------

/// One of the three RAMI 4.0 axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        };
        f.write_str(label)
    }
}

/// A scalar axis position. Serialised as the mapped number, or as
/// [`UNMAPPED`] when no rule applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AxisValue {
    Mapped(f64),
    Unmapped,
}

impl AxisValue {
    pub fn from_option(value: Option<f64>) -> Self {
        value.map_or(AxisValue::Unmapped, AxisValue::Mapped)
    }

    pub fn is_mapped(self) -> bool {
        matches!(self, AxisValue::Mapped(_))
    }

    pub fn as_option(self) -> Option<f64> {
        match self {
            AxisValue::Mapped(v) => Some(v),
            AxisValue::Unmapped => None,
        }
    }

    /// Numeric form with the sentinel substituted for unmapped values.
    pub fn value(self) -> f64 {
        self.as_option().unwrap_or(UNMAPPED)
    }
}

impl Serialize for AxisValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

/// Set of architecture layer codes. Empty means the layer axis is unmapped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LayerSet(BTreeSet<u8>);

impl LayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, layer: u8) -> bool {
        self.0.insert(layer)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u8> for LayerSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Position of a microsystem in the RAMI 4.0 cube.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Coordinates {
    pub x: AxisValue,
    pub y: AxisValue,
    pub z: LayerSet,
}

impl Coordinates {
    /// Axes that carry no mapped value, in X, Y, Z order.
    pub fn unmapped_axes(&self) -> Vec<Axis> {
        let mut axes = Vec::new();
        if !self.x.is_mapped() {
            axes.push(Axis::X);
        }
        if !self.y.is_mapped() {
            axes.push(Axis::Y);
        }
        if self.z.is_empty() {
            axes.push(Axis::Z);
        }
        axes
    }
}

// ---------------------------------------------------------------------------
// Microsystem records
// ---------------------------------------------------------------------------

/// Owner of a microsystem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stakeholder {
    #[serde(deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(deserialize_with = "lenient_text")]
    pub description: String,
}

/// Cost and value figures of a microsystem. `profit` is read as an alias
/// of `value`. Numeric strings are accepted; other values read as absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default, deserialize_with = "lenient_number")]
    pub cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing, deserialize_with = "lenient_number")]
    pub profit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub environmental_impact: Option<f64>,
}

impl Metrics {
    pub fn value(&self) -> Option<f64> {
        self.value.or(self.profit)
    }
}

#[derive(Deserialize)]
struct MicrosystemFields {
    id: Value,
    #[serde(deserialize_with = "lenient_text")]
    name: String,
    #[serde(rename = "type", deserialize_with = "lenient_opt_text")]
    kind: Option<String>,
    #[serde(deserialize_with = "lenient_opt_text")]
    role: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    shell: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    provides: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    consumes: Vec<String>,
    #[serde(default, deserialize_with = "lenient_ids")]
    interactions: Vec<MicrosystemId>,
    #[serde(default, deserialize_with = "lenient_list")]
    involvement: Vec<String>,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    phase: Option<String>,
    #[serde(default, deserialize_with = "lenient_metrics")]
    metrics: Option<Metrics>,
}

#[derive(Deserialize)]
struct RecordShape {
    microsystem: MicrosystemFields,
    microsystem_stakeholder: Stakeholder,
    #[serde(default, deserialize_with = "lenient_metrics")]
    metrics: Option<Metrics>,
}

/// A present field whose value cannot be used at all.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Invalid field type: {path}")]
pub struct InvalidField {
    pub path: &'static str,
}

/// Typed view of a validated microsystem record. The raw record is kept
/// verbatim so that output documents round-trip every field.
#[derive(Clone, Debug, PartialEq)]
pub struct Microsystem {
    /// Position of the record in the input batch.
    pub index: usize,
    pub id: MicrosystemId,
    pub name: String,
    /// `None` when `type` is present but not a scalar.
    pub kind: Option<String>,
    pub role: Option<String>,
    pub shell: Vec<String>,
    pub provides: Vec<String>,
    pub consumes: Vec<String>,
    pub interactions: Vec<MicrosystemId>,
    pub involvement: Vec<String>,
    pub phase: Option<String>,
    pub metrics: Metrics,
    pub stakeholder: Stakeholder,
    pub raw: Value,
}

impl Microsystem {
    /// Build the typed view of a record that passed the presence check.
    /// Only an `id` that is neither a string nor an integer, or a parent
    /// that is not an object, fails.
    pub fn from_record(index: usize, raw: Value) -> Result<Self, InvalidField> {
        let shape = RecordShape::deserialize(&raw).map_err(|_| {
            let path = if raw.get("microsystem").is_some_and(Value::is_object) {
                "microsystem_stakeholder"
            } else {
                "microsystem"
            };
            InvalidField { path }
        })?;
        let fields = shape.microsystem;
        let id = MicrosystemId::from_value(&fields.id).ok_or(InvalidField {
            path: "microsystem.id",
        })?;
        let metrics = shape.metrics.or(fields.metrics).unwrap_or_default();
        Ok(Self {
            index,
            id,
            name: fields.name,
            kind: fields.kind,
            role: fields.role,
            shell: fields.shell,
            provides: fields.provides,
            consumes: fields.consumes,
            interactions: fields.interactions,
            involvement: fields.involvement,
            phase: fields.phase,
            metrics,
            stakeholder: shape.microsystem_stakeholder,
            raw,
        })
    }
}

/// A microsystem with its computed coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct MappedMicrosystem {
    pub microsystem: Microsystem,
    pub coordinates: Coordinates,
}

impl MappedMicrosystem {
    pub fn id(&self) -> &MicrosystemId {
        &self.microsystem.id
    }

    /// The raw record with a `coordinates` key added.
    pub fn to_document(&self) -> Value {
        let mut document = match &self.microsystem.raw {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("record".to_string(), other.clone());
                map
            }
        };
        let layers: Vec<u8> = self.coordinates.z.iter().collect();
        let coordinates = json!({
            "x": self.coordinates.x.value(),
            "y": self.coordinates.y.value(),
            "z": layers,
        });
        document.insert("coordinates".to_string(), coordinates);
        Value::Object(document)
    }
}

impl Serialize for MappedMicrosystem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

/// Per-record problem reported next to stage output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub index: usize,
    pub error: String,
}

impl RecordError {
    pub fn new(index: usize, error: impl Into<String>) -> Self {
        Self {
            index,
            error: error.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Interactions and workflows
// ---------------------------------------------------------------------------

/// Directed interaction edge between two microsystems. Extra keys are kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub source_id: MicrosystemId,
    pub target_id: MicrosystemId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Interaction {
    pub fn new(source_id: impl Into<MicrosystemId>, target_id: impl Into<MicrosystemId>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            extra: Map::new(),
        }
    }

    pub fn key(&self) -> (MicrosystemId, MicrosystemId) {
        (self.source_id.clone(), self.target_id.clone())
    }
}

/// One step of an operational workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    #[serde(default)]
    pub step_id: Value,
    pub services: Vec<String>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

/// Ordered workflow definition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub steps: Vec<WorkflowStep>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Value {
        json!({
            "microsystem": {
                "id": 7,
                "name": "Press line",
                "description": "Hydraulic press",
                "type": "Station",
                "role": "assembly",
                "asset": null,
                "shell": ["Physical"],
                "provides": ["machine_data"],
                "consumes": [],
                "interactions": ["M2", 3],
                "custom": {"kept": true}
            },
            "microsystem_stakeholder": {"id": "S1", "description": "OEM"},
            "metrics": {"cost": 4.5, "profit": 10}
        })
    }

    #[test]
    fn test_integer_ids_normalised() {
        let m = Microsystem::from_record(0, record()).unwrap();
        assert_eq!(m.id.as_str(), "7");
        assert_eq!(m.interactions, vec![MicrosystemId::new("M2"), MicrosystemId::new("3")]);
    }

    #[test]
    fn test_profit_alias_for_value() {
        let m = Microsystem::from_record(0, record()).unwrap();
        assert_eq!(m.metrics.cost, Some(4.5));
        assert_eq!(m.metrics.value(), Some(10.0));
        assert_eq!(m.metrics.environmental_impact, None);
    }

    #[test]
    fn test_bare_string_list_read_as_one_entry() {
        let mut raw = record();
        raw["microsystem"]["shell"] = json!("Physical");
        let m = Microsystem::from_record(0, raw).unwrap();
        assert_eq!(m.shell, vec!["Physical"]);
    }

    #[test]
    fn test_null_fields_degrade_to_empty() {
        let mut raw = record();
        raw["microsystem"]["name"] = Value::Null;
        raw["microsystem"]["type"] = Value::Null;
        raw["microsystem"]["role"] = json!({"nested": true});
        raw["microsystem"]["consumes"] = Value::Null;
        raw["microsystem"]["interactions"] = Value::Null;
        raw["microsystem"]["involvement"] = Value::Null;
        raw["microsystem_stakeholder"]["description"] = Value::Null;
        raw["metrics"] = json!({"cost": "12.5", "value": "n/a", "environmental_impact": [1]});

        let m = Microsystem::from_record(0, raw).unwrap();
        assert_eq!(m.name, "");
        assert_eq!(m.kind, None);
        assert_eq!(m.role, None);
        assert!(m.consumes.is_empty());
        assert!(m.interactions.is_empty());
        assert!(m.involvement.is_empty());
        assert_eq!(m.stakeholder.description, "");
        assert_eq!(m.metrics.cost, Some(12.5));
        assert_eq!(m.metrics.value(), None);
        assert_eq!(m.metrics.environmental_impact, None);
    }

    #[test]
    fn test_non_object_metrics_ignored() {
        let mut raw = record();
        raw["metrics"] = json!("expensive");
        raw["microsystem"]["metrics"] = json!({"cost": 3});
        let m = Microsystem::from_record(0, raw).unwrap();
        assert_eq!(m.metrics.cost, Some(3.0));
    }

    #[test]
    fn test_unusable_id_names_its_path() {
        let mut raw = record();
        raw["microsystem"]["id"] = json!({"code": 7});
        let err = Microsystem::from_record(0, raw).unwrap_err();
        assert_eq!(err.path, "microsystem.id");
        assert_eq!(err.to_string(), "Invalid field type: microsystem.id");

        let mut raw = record();
        raw["microsystem_stakeholder"] = json!({"id": "S1", "description": "OEM", "x": 1});
        raw["microsystem"] = json!([]);
        assert_eq!(Microsystem::from_record(0, raw).unwrap_err().path, "microsystem");
    }

    #[test]
    fn test_document_keeps_raw_fields() {
        let m = Microsystem::from_record(0, record()).unwrap();
        let mapped = MappedMicrosystem {
            microsystem: m,
            coordinates: Coordinates {
                x: AxisValue::Mapped(3.0),
                y: AxisValue::Unmapped,
                z: [3, 0].into_iter().collect(),
            },
        };
        let doc = mapped.to_document();
        assert_eq!(doc["microsystem"]["custom"], json!({"kept": true}));
        assert_eq!(doc["coordinates"], json!({"x": 3.0, "y": -1.0, "z": [0, 3]}));
    }

    #[test]
    fn test_unmapped_axes_listed() {
        let coords = Coordinates {
            x: AxisValue::Unmapped,
            y: AxisValue::Mapped(0.0),
            z: LayerSet::new(),
        };
        assert_eq!(coords.unmapped_axes(), vec![Axis::X, Axis::Z]);
    }

    #[test]
    fn test_interaction_extra_keys_kept() {
        let edge: Interaction =
            serde_json::from_value(json!({"source_id": "A", "target_id": 2, "label": "sync"}))
                .unwrap();
        assert_eq!(edge.target_id.as_str(), "2");
        let back = serde_json::to_value(&edge).unwrap();
        assert_eq!(back, json!({"source_id": "A", "target_id": "2", "label": "sync"}));
    }
}

//! Value-addition projection onto the hierarchy / lifecycle plane.

use serde::Serialize;

use crate::ingest::document::MetricsTable;
use crate::models::{MappedMicrosystem, MicrosystemId};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValueProjection {
    pub id: MicrosystemId,
    pub x: f64,
    pub y: f64,
    pub cost: f64,
    pub value: f64,
    pub environmental_impact: f64,
}

/// One projection per microsystem. Each metric is taken from `table`, then
/// from the record's own metrics, then defaults to zero.
pub fn project_values(records: &[MappedMicrosystem], table: &MetricsTable) -> Vec<ValueProjection> {
    records
        .iter()
        .map(|record| {
            let own = &record.microsystem.metrics;
            let external = table.get(record.id());
            let pick = |external: Option<f64>, own: Option<f64>| external.or(own).unwrap_or(0.0);
            ValueProjection {
                id: record.id().clone(),
                x: record.coordinates.x.value(),
                y: record.coordinates.y.value(),
                cost: pick(external.and_then(|m| m.cost), own.cost),
                value: pick(external.and_then(|m| m.value()), own.value()),
                environmental_impact: pick(
                    external.and_then(|m| m.environmental_impact),
                    own.environmental_impact,
                ),
            }
        })
        .collect()
}

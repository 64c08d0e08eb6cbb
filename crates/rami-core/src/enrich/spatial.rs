//! Flattened 3-D points for plotting microsystems in the cube.

use serde::Serialize;

use crate::graph::MatrixReport;
use crate::models::{MappedMicrosystem, MicrosystemId, UNMAPPED};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpatialPoint {
    pub id: MicrosystemId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub cluster: i64,
    pub stakeholder: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// One point per layer of each microsystem. A microsystem without layers
/// still yields a single point at the unmapped sentinel.
pub fn spatial_points(records: &[MappedMicrosystem], report: &MatrixReport) -> Vec<SpatialPoint> {
    let mut points = Vec::with_capacity(records.len());
    for record in records {
        let microsystem = &record.microsystem;
        let cluster = report.cluster_of(record.id());
        let point = |z: f64| SpatialPoint {
            id: record.id().clone(),
            name: microsystem.name.clone(),
            x: record.coordinates.x.value(),
            y: record.coordinates.y.value(),
            z,
            cluster,
            stakeholder: microsystem.stakeholder.description.clone(),
            kind: microsystem.kind.clone(),
        };
        if record.coordinates.z.is_empty() {
            points.push(point(UNMAPPED));
        } else {
            points.extend(record.coordinates.z.iter().map(|layer| point(f64::from(layer))));
        }
    }
    points
}

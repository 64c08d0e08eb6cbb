//! Engineering-phase views: the lifecycle timeline and phase assignment.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::models::{MappedMicrosystem, MicrosystemId, UNSPECIFIED_PHASE};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub id: MicrosystemId,
    pub phase: String,
    pub x: f64,
    pub y: f64,
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LifecycleTimeline {
    /// Distinct phases in first-seen order.
    pub phases: Vec<String>,
    pub timeline: Vec<TimelineEntry>,
}

pub fn lifecycle_timeline(records: &[MappedMicrosystem]) -> LifecycleTimeline {
    let mut phases: IndexSet<String> = IndexSet::new();
    let timeline = records
        .iter()
        .map(|record| {
            let phase = record
                .microsystem
                .phase
                .clone()
                .unwrap_or_else(|| UNSPECIFIED_PHASE.to_string());
            phases.insert(phase.clone());
            TimelineEntry {
                id: record.id().clone(),
                phase,
                x: record.coordinates.x.value(),
                y: record.coordinates.y.value(),
                description: record.microsystem.name.clone(),
            }
        })
        .collect();
    LifecycleTimeline {
        phases: phases.into_iter().collect(),
        timeline,
    }
}

/// Phases from `phases` that each microsystem lists in `involvement`,
/// in the order of `phases`.
pub fn assign_phases(
    records: &[MappedMicrosystem],
    phases: &[String],
) -> IndexMap<MicrosystemId, Vec<String>> {
    records
        .iter()
        .map(|record| {
            let involvement = &record.microsystem.involvement;
            let assigned = phases
                .iter()
                .filter(|phase| involvement.contains(phase))
                .cloned()
                .collect();
            (record.id().clone(), assigned)
        })
        .collect()
}

//! Stakeholder integration map across engineering phases and lifecycle
//! stages.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::ingest::document::StakeholderValues;
use crate::models::{Interaction, MappedMicrosystem, MicrosystemId};

/// Rows are stakeholders in first-seen order, columns are the engineering
/// phases followed by the lifecycle stages.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IntegrationMap {
    pub stakeholders: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
    pub skipped_interactions: usize,
}

impl IntegrationMap {
    pub fn get(&self, stakeholder: &str, column: &str) -> Option<f64> {
        let row = self.stakeholders.iter().position(|s| s == stakeholder)?;
        let col = self.columns.iter().position(|c| c == column)?;
        Some(self.values[row][col])
    }
}

pub fn integration_map(
    records: &[MappedMicrosystem],
    interactions: &[Interaction],
    phases: &[String],
    lifecycle_stages: &[String],
    stakeholder_values: &StakeholderValues,
) -> IntegrationMap {
    let mut rows: IndexMap<&str, usize> = IndexMap::new();
    let mut owner: IndexMap<&MicrosystemId, usize> = IndexMap::new();
    for record in records {
        let next = rows.len();
        let row = *rows
            .entry(record.microsystem.stakeholder.id.as_str())
            .or_insert(next);
        owner.entry(record.id()).or_insert(row);
    }

    let columns: Vec<String> = phases.iter().chain(lifecycle_stages).cloned().collect();
    let mut values = vec![vec![0.0; columns.len()]; rows.len()];
    let mut skipped = 0;

    for edge in interactions {
        match (owner.get(&edge.source_id), owner.get(&edge.target_id)) {
            (Some(&source), Some(&target)) => {
                for row in [source, target] {
                    values[row].iter_mut().for_each(|cell| *cell += 1.0);
                }
            }
            _ => {
                skipped += 1;
                debug!(
                    source = %edge.source_id,
                    target = %edge.target_id,
                    "interaction outside working set skipped"
                );
            }
        }
    }

    for (stakeholder, &row) in &rows {
        let Some(metrics) = stakeholder_values.get(*stakeholder) else {
            continue;
        };
        for (col, column) in columns.iter().enumerate() {
            if let Some(extra) = metrics.get(column) {
                values[row][col] += extra;
            }
        }
    }

    IntegrationMap {
        stakeholders: rows.keys().map(|s| s.to_string()).collect(),
        columns,
        values,
        skipped_interactions: skipped,
    }
}

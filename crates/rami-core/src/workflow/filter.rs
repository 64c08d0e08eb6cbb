//! Workflow-relevant subsetting of the mapped working set.

use std::collections::HashSet;

use indexmap::IndexMap;
use pyo3::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::RamiError;
use crate::ingest::document::{parse_input_document, parse_workflow};
use crate::ingest::schema::validate_batch;
use crate::mapping::AxisMapper;
use crate::models::{Interaction, MappedMicrosystem, Microsystem, MicrosystemId, Workflow};

/// True when the microsystem provides or consumes any of `services`.
/// Service names compare exactly and case-sensitively.
pub fn is_relevant(microsystem: &Microsystem, services: &HashSet<&str>) -> bool {
    microsystem
        .provides
        .iter()
        .chain(microsystem.consumes.iter())
        .any(|service| services.contains(service.as_str()))
}

fn service_set(services: &[String]) -> HashSet<&str> {
    services.iter().map(String::as_str).collect()
}

/// Single pass over the working set, keeping input order.
pub fn filter_by_services(
    mapped: &[MappedMicrosystem],
    services: &[String],
) -> Vec<MappedMicrosystem> {
    let services = service_set(services);
    let relevant: Vec<MappedMicrosystem> = mapped
        .iter()
        .filter(|m| is_relevant(&m.microsystem, &services))
        .cloned()
        .collect();
    info!(
        kept = relevant.len(),
        total = mapped.len(),
        "filtered microsystems by services"
    );
    relevant
}

/// Microsystems and edges relevant to a workflow.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilteredWorkset {
    pub microsystems: Vec<MappedMicrosystem>,
    pub interactions: Vec<Interaction>,
    /// Step edges with an endpoint outside their step's subset.
    pub dropped_interactions: usize,
}

/// Step-scoped filtering aggregated over the whole workflow.
///
/// Each step keeps the microsystems relevant to its own services and the
/// edges of that step whose endpoints both survived. Microsystems are then
/// deduplicated by ID and edges by `(source, target)`; a duplicate keeps the
/// first position and the last-seen copy.
pub fn filter_workflow(mapped: &[MappedMicrosystem], workflow: &Workflow) -> FilteredWorkset {
    let mut microsystems: IndexMap<MicrosystemId, MappedMicrosystem> = IndexMap::new();
    let mut interactions: IndexMap<(MicrosystemId, MicrosystemId), Interaction> = IndexMap::new();
    let mut dropped = 0usize;

    for step in &workflow.steps {
        let services = service_set(&step.services);
        let subset: Vec<&MappedMicrosystem> = mapped
            .iter()
            .filter(|m| is_relevant(&m.microsystem, &services))
            .collect();
        let members: HashSet<&MicrosystemId> = subset.iter().map(|m| m.id()).collect();

        for microsystem in &subset {
            microsystems.insert(microsystem.id().clone(), (*microsystem).clone());
        }
        for interaction in &step.interactions {
            if members.contains(&interaction.source_id) && members.contains(&interaction.target_id)
            {
                interactions.insert(interaction.key(), interaction.clone());
            } else {
                dropped += 1;
                debug!(
                    step = %step.step_id,
                    source = %interaction.source_id,
                    target = %interaction.target_id,
                    "interaction outside step subset dropped"
                );
            }
        }
    }

    info!(
        steps = workflow.steps.len(),
        microsystems = microsystems.len(),
        interactions = interactions.len(),
        dropped_interactions = dropped,
        "filtered working set for workflow"
    );
    FilteredWorkset {
        microsystems: microsystems.into_values().collect(),
        interactions: interactions.into_values().collect(),
        dropped_interactions: dropped,
    }
}

fn mapped_working_set(input_json: &str) -> PyResult<Vec<MappedMicrosystem>> {
    let validation = validate_batch(parse_input_document(input_json)?);
    Ok(AxisMapper::default().map_batch(validation.valid)?.mapped)
}

/// Validate, map with the default rules, and filter by a workflow document.
#[pyfunction]
#[pyo3(name = "filter_workflow")]
pub fn filter_workflow_document(input_json: &str, workflow_json: &str) -> PyResult<String> {
    let mapped = mapped_working_set(input_json)?;
    let workflow = parse_workflow(workflow_json)?;
    let workset = filter_workflow(&mapped, &workflow);
    Ok(serde_json::to_string(&workset).map_err(RamiError::from)?)
}

/// Validate, map with the default rules, and filter by a flat service list.
#[pyfunction]
#[pyo3(name = "filter_by_services")]
pub fn filter_by_services_document(input_json: &str, services: Vec<String>) -> PyResult<String> {
    let mapped = mapped_working_set(input_json)?;
    let relevant = filter_by_services(&mapped, &services);
    Ok(serde_json::to_string(&relevant).map_err(RamiError::from)?)
}

//! Output document of the matrix and cluster stage.

use indexmap::IndexMap;
use pyo3::prelude::*;
use serde::Serialize;

use crate::errors::{RamiError, RamiResult};
use crate::graph::cluster::{cluster, ClusterAssignment, ClusterPolicy};
use crate::graph::matrix::{edges_from_records, InteractionMatrix, WeightMode};
use crate::ingest::document::parse_input_document;
use crate::ingest::schema::validate_batch;
use crate::mapping::AxisMapper;
use crate::models::{Interaction, MicrosystemId};

/// `{"matrix", "index_map", "reverse_map", "clusters", "policy", "dropped_edges"}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatrixReport {
    pub matrix: Vec<Vec<u32>>,
    pub index_map: IndexMap<MicrosystemId, usize>,
    pub reverse_map: Vec<MicrosystemId>,
    pub clusters: IndexMap<usize, i64>,
    pub policy: ClusterPolicy,
    pub dropped_edges: usize,
}

impl MatrixReport {
    pub fn new(matrix: &InteractionMatrix, assignment: &ClusterAssignment) -> Self {
        Self {
            matrix: matrix.rows(),
            index_map: matrix.index_map().clone(),
            reverse_map: matrix.reverse_map(),
            clusters: assignment.by_index(),
            policy: assignment.policy().clone(),
            dropped_edges: matrix.dropped_edges(),
        }
    }

    /// Cluster label of a microsystem, `-1` when it is not indexed.
    pub fn cluster_of(&self, id: &MicrosystemId) -> i64 {
        self.index_map
            .get(id)
            .and_then(|index| self.clusters.get(index))
            .copied()
            .unwrap_or(crate::graph::cluster::NO_CLUSTER)
    }
}

/// Build the matrix over `reference` and cluster it.
pub fn analyse<'a, I>(
    reference: I,
    edges: &[Interaction],
    mode: WeightMode,
    policy: &ClusterPolicy,
) -> RamiResult<MatrixReport>
where
    I: IntoIterator<Item = &'a MicrosystemId>,
{
    let matrix = InteractionMatrix::build(reference, edges, mode)?;
    let assignment = cluster(&matrix, policy)?;
    Ok(MatrixReport::new(&matrix, &assignment))
}

/// Validate and map an input document, then build the matrix from the
/// records' own `interactions` lists.
#[pyfunction]
#[pyo3(signature = (input_json, policy_json=None, presence_only=false))]
pub fn build_interaction_matrix(
    input_json: &str,
    policy_json: Option<&str>,
    presence_only: bool,
) -> PyResult<String> {
    let policy: ClusterPolicy = match policy_json {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| RamiError::Config(format!("cluster policy: {e}")))?,
        None => ClusterPolicy::default(),
    };
    let mode = if presence_only {
        WeightMode::Presence
    } else {
        WeightMode::Frequency
    };
    let validation = validate_batch(parse_input_document(input_json)?);
    let mapped = AxisMapper::default().map_batch(validation.valid)?.mapped;
    let edges = edges_from_records(&mapped);
    let report = analyse(mapped.iter().map(|m| m.id()), &edges, mode, &policy)?;
    Ok(serde_json::to_string(&report).map_err(RamiError::from)?)
}

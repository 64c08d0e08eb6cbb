//! Undirected interaction matrix over a reference set of microsystems.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::RamiResult;
use crate::guards::{ensure_capacity, MAX_MATRIX_MICROSYSTEMS};
use crate::models::{Interaction, MappedMicrosystem, MicrosystemId};

/// How repeated interactions between the same pair are weighted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMode {
    /// Count every interaction.
    #[default]
    Frequency,
    /// 1 when any interaction exists.
    Presence,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InteractionMatrix {
    size: usize,
    weights: Vec<u32>,
    index_map: IndexMap<MicrosystemId, usize>,
    dropped_edges: usize,
}

impl InteractionMatrix {
    /// Build the matrix. Rows follow the first appearance of each ID in
    /// `reference`; edges with an endpoint outside it are dropped.
    pub fn build<'a, I>(reference: I, edges: &[Interaction], mode: WeightMode) -> RamiResult<Self>
    where
        I: IntoIterator<Item = &'a MicrosystemId>,
    {
        let mut index_map: IndexMap<MicrosystemId, usize> = IndexMap::new();
        for id in reference {
            let next = index_map.len();
            index_map.entry(id.clone()).or_insert(next);
        }
        let size = index_map.len();
        ensure_capacity(size, MAX_MATRIX_MICROSYSTEMS)?;

        let mut matrix = Self {
            size,
            weights: vec![0; size * size],
            index_map,
            dropped_edges: 0,
        };
        for edge in edges {
            let source = matrix.index_of(&edge.source_id);
            let target = matrix.index_of(&edge.target_id);
            match (source, target) {
                (Some(s), Some(t)) => matrix.record(s, t, mode),
                _ => {
                    matrix.dropped_edges += 1;
                    debug!(
                        source = %edge.source_id,
                        target = %edge.target_id,
                        "dangling interaction endpoint dropped"
                    );
                }
            }
        }
        Ok(matrix)
    }

    fn record(&mut self, source: usize, target: usize, mode: WeightMode) {
        self.bump(source * self.size + target, mode);
        if source != target {
            self.bump(target * self.size + source, mode);
        }
    }

    fn bump(&mut self, cell: usize, mode: WeightMode) {
        match mode {
            WeightMode::Frequency => self.weights[cell] += 1,
            WeightMode::Presence => self.weights[cell] = 1,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, column: usize) -> u32 {
        self.weights[row * self.size + column]
    }

    pub fn row(&self, row: usize) -> &[u32] {
        &self.weights[row * self.size..(row + 1) * self.size]
    }

    pub fn row_sum(&self, row: usize) -> u64 {
        self.row(row).iter().map(|&w| u64::from(w)).sum()
    }

    pub fn max_weight(&self) -> u32 {
        self.weights.iter().copied().max().unwrap_or(0)
    }

    pub fn rows(&self) -> Vec<Vec<u32>> {
        (0..self.size).map(|r| self.row(r).to_vec()).collect()
    }

    pub fn index_of(&self, id: &MicrosystemId) -> Option<usize> {
        self.index_map.get(id).copied()
    }

    pub fn id_at(&self, index: usize) -> Option<&MicrosystemId> {
        self.index_map.get_index(index).map(|(id, _)| id)
    }

    pub fn index_map(&self) -> &IndexMap<MicrosystemId, usize> {
        &self.index_map
    }

    /// IDs in row order.
    pub fn reverse_map(&self) -> Vec<MicrosystemId> {
        self.index_map.keys().cloned().collect()
    }

    /// Number of edges dropped for referencing an unknown microsystem.
    pub fn dropped_edges(&self) -> usize {
        self.dropped_edges
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.size).all(|i| (0..i).all(|j| self.get(i, j) == self.get(j, i)))
    }
}

/// Edges declared on the records themselves via `microsystem.interactions`.
pub fn edges_from_records(records: &[MappedMicrosystem]) -> Vec<Interaction> {
    records
        .iter()
        .flat_map(|record| {
            let source = record.id();
            record
                .microsystem
                .interactions
                .iter()
                .map(move |target| Interaction::new(source.clone(), target.clone()))
        })
        .collect()
}

//! Cluster labelling over an interaction matrix.
//!
//! Two policies exist and their labels mean different things. The density
//! threshold flags each sufficiently active microsystem with its own
//! singleton label; it never groups microsystems together. The agglomerative
//! policy groups structurally close microsystems into a requested number of
//! clusters. A single assignment always records the policy that produced it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::RamiResult;
use crate::graph::matrix::InteractionMatrix;
use crate::guards::{ensure_capacity, MAX_AGGLOMERATIVE_MICROSYSTEMS};

/// Label for a microsystem that belongs to no cluster.
pub const NO_CLUSTER: i64 = -1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ClusterPolicy {
    /// Singleton label for every row whose weight sum reaches `threshold`.
    DensityThreshold { threshold: f64 },
    /// Average-linkage grouping into `n_clusters` clusters.
    Agglomerative { n_clusters: usize },
}

impl Default for ClusterPolicy {
    fn default() -> Self {
        ClusterPolicy::DensityThreshold { threshold: 1.0 }
    }
}

impl ClusterPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            ClusterPolicy::DensityThreshold { .. } => "density_threshold",
            ClusterPolicy::Agglomerative { .. } => "agglomerative",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClusterAssignment {
    policy: ClusterPolicy,
    labels: Vec<i64>,
}

impl ClusterAssignment {
    pub fn policy(&self) -> &ClusterPolicy {
        &self.policy
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Label of a matrix row, [`NO_CLUSTER`] when out of range.
    pub fn label(&self, index: usize) -> i64 {
        self.labels.get(index).copied().unwrap_or(NO_CLUSTER)
    }

    pub fn cluster_count(&self) -> usize {
        let mut distinct: Vec<i64> = self
            .labels
            .iter()
            .copied()
            .filter(|&l| l != NO_CLUSTER)
            .collect();
        distinct.sort_unstable();
        distinct.dedup();
        distinct.len()
    }

    /// `{row index: label}`.
    pub fn by_index(&self) -> IndexMap<usize, i64> {
        self.labels.iter().copied().enumerate().collect()
    }
}

pub fn cluster(matrix: &InteractionMatrix, policy: &ClusterPolicy) -> RamiResult<ClusterAssignment> {
    let labels = match policy {
        ClusterPolicy::DensityThreshold { threshold } => density_threshold(matrix, *threshold),
        ClusterPolicy::Agglomerative { n_clusters } => agglomerative(matrix, *n_clusters)?,
    };
    let assignment = ClusterAssignment {
        policy: policy.clone(),
        labels,
    };
    info!(
        policy = policy.name(),
        size = matrix.size(),
        clusters = assignment.cluster_count(),
        "clustered interaction matrix"
    );
    Ok(assignment)
}

/// Triage flag: rows at or above `threshold` get the next singleton label
/// in row order, the rest get [`NO_CLUSTER`].
pub fn density_threshold(matrix: &InteractionMatrix, threshold: f64) -> Vec<i64> {
    let mut next = 0i64;
    (0..matrix.size())
        .map(|row| {
            if matrix.row_sum(row) as f64 >= threshold {
                next += 1;
                next - 1
            } else {
                NO_CLUSTER
            }
        })
        .collect()
}

/// `1 - w / max(w)` off the diagonal, 0 on it. With no interactions at all
/// every off-diagonal distance is 1.
pub fn distance_matrix(matrix: &InteractionMatrix) -> Vec<Vec<f64>> {
    let n = matrix.size();
    let max = f64::from(matrix.max_weight());
    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j {
                        0.0
                    } else if max > 0.0 {
                        1.0 - f64::from(matrix.get(i, j)) / max
                    } else {
                        1.0
                    }
                })
                .collect()
        })
        .collect()
}

/// Average-linkage agglomerative clustering.
///
/// Clusters live in the slot of their lowest member; merging always folds
/// the higher slot into the lower one. Ties pick the lowest slot pair.
/// Labels are numbered by ascending lowest member.
pub fn agglomerative(matrix: &InteractionMatrix, n_clusters: usize) -> RamiResult<Vec<i64>> {
    let n = matrix.size();
    ensure_capacity(n, MAX_AGGLOMERATIVE_MICROSYSTEMS)?;
    if n == 0 {
        return Ok(Vec::new());
    }
    let target = n_clusters.clamp(1, n);

    let mut distance = distance_matrix(matrix);
    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    let mut active: Vec<bool> = vec![true; n];
    let mut remaining = n;

    while remaining > target {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in (0..n).filter(|&i| active[i]) {
            for j in (i + 1..n).filter(|&j| active[j]) {
                let d = distance[i][j];
                if best.map_or(true, |(_, _, current)| d < current) {
                    best = Some((i, j, d));
                }
            }
        }
        let Some((keep, absorb, _)) = best else {
            break;
        };

        // Lance-Williams update for average linkage.
        let size_keep = members[keep].len() as f64;
        let size_absorb = members[absorb].len() as f64;
        for k in (0..n).filter(|&k| active[k] && k != keep && k != absorb) {
            let merged = (size_keep * distance[keep][k] + size_absorb * distance[absorb][k])
                / (size_keep + size_absorb);
            distance[keep][k] = merged;
            distance[k][keep] = merged;
        }
        let absorbed = std::mem::take(&mut members[absorb]);
        members[keep].extend(absorbed);
        active[absorb] = false;
        remaining -= 1;
    }

    let mut labels = vec![NO_CLUSTER; n];
    for (label, slot) in (0..n).filter(|&s| active[s]).enumerate() {
        for &member in &members[slot] {
            labels[member] = label as i64;
        }
    }
    Ok(labels)
}

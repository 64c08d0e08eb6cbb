//! Interaction matrix construction and clustering.

pub mod cluster;
pub mod matrix;
pub mod report;

pub use cluster::{ClusterAssignment, ClusterPolicy, NO_CLUSTER};
pub use matrix::{edges_from_records, InteractionMatrix, WeightMode};
pub use report::{analyse, MatrixReport};

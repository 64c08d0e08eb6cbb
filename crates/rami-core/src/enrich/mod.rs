//! Downstream projections of mapped microsystems.
pub mod integration;
pub mod lifecycle;
pub mod spatial;
pub mod value;

pub use integration::{integration_map, IntegrationMap};
pub use lifecycle::{assign_phases, lifecycle_timeline, LifecycleTimeline, TimelineEntry};
pub use spatial::{spatial_points, SpatialPoint};
pub use value::{project_values, ValueProjection};

//! Rule-based classification of microsystems onto the RAMI 4.0 axes.

pub mod conditional;
pub mod mapper;
pub mod rules;

pub use mapper::{AxisMapper, MappingOutcome, RuleSource, UnmappedAxisNotice, UnmappedPolicy};

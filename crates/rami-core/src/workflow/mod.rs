pub mod filter;

pub use filter::{filter_by_services, filter_workflow, is_relevant, FilteredWorkset};

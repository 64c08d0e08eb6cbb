//! RAMI core library: Rust backend for the RAMI 4.0 microsystem mapper.
//!
//! Raw microsystem records are validated, placed on the three RAMI 4.0
//! axes, filtered down to the microsystems relevant to a workflow, linked
//! into a clustered interaction matrix and projected for visualisation.
//! The crate is compiled as a Python extension module (`_rami_core`) via
//! PyO3; every Python entry point takes and returns JSON strings.

pub mod config;
pub mod enrich;
pub mod errors;
pub mod graph;
pub mod guards;
pub mod ingest;
pub mod mapping;
pub mod models;
pub mod pipeline;
pub mod workflow;

use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

// ---------------------------------------------------------------------------
// Top-level Python module: _rami_core
// ---------------------------------------------------------------------------

#[pymodule]
fn _rami_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // -- Constants ----------------------------------------------------------
    m.add("UNMAPPED", models::UNMAPPED)?;
    m.add("UNSPECIFIED_PHASE", models::UNSPECIFIED_PHASE)?;
    m.add("NO_CLUSTER", graph::NO_CLUSTER)?;
    m.add("MAX_MATRIX_MICROSYSTEMS", guards::MAX_MATRIX_MICROSYSTEMS)?;
    m.add(
        "MAX_AGGLOMERATIVE_MICROSYSTEMS",
        guards::MAX_AGGLOMERATIVE_MICROSYSTEMS,
    )?;
    m.add("MAX_WORKFLOW_STEPS", guards::MAX_WORKFLOW_STEPS)?;

    m.add_function(wrap_pyfunction!(guards::clamp_int, m)?)?;
    m.add_function(wrap_pyfunction!(guards::clamp_cluster_count, m)?)?;

    // -- Stages -------------------------------------------------------------
    m.add_function(wrap_pyfunction!(ingest::schema::validate_microsystems, m)?)?;
    m.add_function(wrap_pyfunction!(mapping::mapper::map_microsystems, m)?)?;
    m.add_function(wrap_pyfunction!(
        workflow::filter::filter_workflow_document,
        m
    )?)?;
    m.add_function(wrap_pyfunction!(
        workflow::filter::filter_by_services_document,
        m
    )?)?;
    m.add_function(wrap_pyfunction!(graph::report::build_interaction_matrix, m)?)?;

    // -- Pipeline -----------------------------------------------------------
    m.add_function(wrap_pyfunction!(pipeline::run_pipeline_document, m)?)?;
    m.add_class::<pipeline::RamiPipeline>()?;

    Ok(())
}

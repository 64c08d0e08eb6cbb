//! End-to-end run: parse, validate, map, filter, analyse and enrich.

use std::path::Path;

use indexmap::IndexMap;
use pyo3::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::enrich::{
    assign_phases, integration_map, lifecycle_timeline, project_values, spatial_points,
    IntegrationMap, LifecycleTimeline, SpatialPoint, ValueProjection,
};
use crate::errors::{RamiError, RamiResult};
use crate::graph::{analyse, edges_from_records, MatrixReport};
use crate::ingest::document::{
    input_digest, parse_input_document, parse_metrics_table, parse_stakeholder_values,
    parse_workflow, read_document, read_workflow, MetricsTable, StakeholderValues,
};
use crate::ingest::schema::validate_batch;
use crate::mapping::UnmappedAxisNotice;
use crate::models::{Interaction, MappedMicrosystem, MicrosystemId, RecordError, Workflow};
use crate::workflow::{filter_by_services, filter_workflow};

/// Optional side documents feeding the enrichment stage.
#[derive(Clone, Debug, Default)]
pub struct EnrichmentInputs {
    pub metrics: MetricsTable,
    pub stakeholder_values: StakeholderValues,
}

#[derive(Clone, Debug, Serialize)]
pub struct PipelineReport {
    pub status: &'static str,
    pub input_digest: String,
    /// Schema errors and mapper rejections, ordered by record index.
    pub validation_errors: Vec<RecordError>,
    pub unmapped: Vec<UnmappedAxisNotice>,
    /// The filtered working set.
    pub microsystems: Vec<MappedMicrosystem>,
    pub interactions: Vec<Interaction>,
    /// Interactions discarded before or during matrix construction for a
    /// dangling endpoint or, with a workflow, an endpoint outside the step.
    pub dropped_interactions: usize,
    pub interaction_matrix: MatrixReport,
    pub spatial_data: Vec<SpatialPoint>,
    pub value_projection: Vec<ValueProjection>,
    pub lifecycle_timeline: LifecycleTimeline,
    pub phase_assignment: IndexMap<MicrosystemId, Vec<String>>,
    pub integration_map: IntegrationMap,
}

/// Run every stage over a raw `{"microsystems": [...]}` document.
///
/// With a workflow the matrix indexes the whole mapped set over the
/// workflow's surviving edges. Without one the working set is filtered by
/// `config.services` and the matrix indexes that subset over the records'
/// own `interactions`.
pub fn run_pipeline(
    raw: &str,
    config: &PipelineConfig,
    workflow: Option<&Workflow>,
    inputs: &EnrichmentInputs,
) -> RamiResult<PipelineReport> {
    let digest = input_digest(raw);
    info!(digest = %digest, "pipeline run started");

    let validation = validate_batch(parse_input_document(raw)?);
    let mut validation_errors = validation.errors;
    let mapping = config.mapper()?.map_batch(validation.valid)?;
    validation_errors.extend(mapping.rejected);
    validation_errors.sort_by_key(|e| e.index);
    let mapped = mapping.mapped;

    let (microsystems, interactions, dropped_interactions, interaction_matrix) = match workflow {
        Some(workflow) => {
            let workset = filter_workflow(&mapped, workflow);
            let report = analyse(
                mapped.iter().map(|m| m.id()),
                &workset.interactions,
                config.weight_mode,
                &config.cluster,
            )?;
            let dropped = workset.dropped_interactions + report.dropped_edges;
            (workset.microsystems, workset.interactions, dropped, report)
        }
        None => {
            let relevant = filter_by_services(&mapped, &config.services);
            let edges = edges_from_records(&relevant);
            let report = analyse(
                relevant.iter().map(|m| m.id()),
                &edges,
                config.weight_mode,
                &config.cluster,
            )?;
            let dropped = report.dropped_edges;
            (relevant, edges, dropped, report)
        }
    };

    let spatial_data = spatial_points(&microsystems, &interaction_matrix);
    let value_projection = project_values(&microsystems, &inputs.metrics);
    let lifecycle_timeline = lifecycle_timeline(&microsystems);
    let phase_assignment = assign_phases(&microsystems, &config.phases);
    let integration_map = integration_map(
        &microsystems,
        &interactions,
        &config.phases,
        &config.lifecycle_stages,
        &inputs.stakeholder_values,
    );

    info!(
        validation_errors = validation_errors.len(),
        unmapped = mapping.unmapped.len(),
        microsystems = microsystems.len(),
        interactions = interactions.len(),
        dropped_interactions,
        points = spatial_data.len(),
        "pipeline run finished"
    );
    Ok(PipelineReport {
        status: "success",
        input_digest: digest,
        validation_errors,
        unmapped: mapping.unmapped,
        microsystems,
        interactions,
        dropped_interactions,
        interaction_matrix,
        spatial_data,
        value_projection,
        lifecycle_timeline,
        phase_assignment,
        integration_map,
    })
}

fn load_config(config_json: Option<&str>) -> RamiResult<PipelineConfig> {
    let config = match config_json {
        Some(raw) => PipelineConfig::from_json(raw)?,
        None => PipelineConfig::default(),
    };
    config.with_env_overrides()
}

fn load_side_documents(
    workflow_json: Option<&str>,
    metrics_json: Option<&str>,
    stakeholder_values_json: Option<&str>,
) -> RamiResult<(Option<Workflow>, EnrichmentInputs)> {
    let workflow = workflow_json.map(parse_workflow).transpose()?;
    let inputs = EnrichmentInputs {
        metrics: metrics_json
            .map(parse_metrics_table)
            .transpose()?
            .unwrap_or_default(),
        stakeholder_values: stakeholder_values_json
            .map(parse_stakeholder_values)
            .transpose()?
            .unwrap_or_default(),
    };
    Ok((workflow, inputs))
}

fn report_json(report: &PipelineReport) -> PyResult<String> {
    Ok(serde_json::to_string(report).map_err(RamiError::from)?)
}

/// One-shot run. Environment overrides apply on top of `config_json`.
#[pyfunction]
#[pyo3(
    name = "run_pipeline",
    signature = (input_json, config_json=None, workflow_json=None, metrics_json=None, stakeholder_values_json=None)
)]
pub fn run_pipeline_document(
    input_json: &str,
    config_json: Option<&str>,
    workflow_json: Option<&str>,
    metrics_json: Option<&str>,
    stakeholder_values_json: Option<&str>,
) -> PyResult<String> {
    let config = load_config(config_json)?;
    let (workflow, inputs) =
        load_side_documents(workflow_json, metrics_json, stakeholder_values_json)?;
    let report = run_pipeline(input_json, &config, workflow.as_ref(), &inputs)?;
    report_json(&report)
}

/// Reusable pipeline holding a resolved configuration.
#[pyclass(frozen)]
pub struct RamiPipeline {
    config: PipelineConfig,
}

#[pymethods]
impl RamiPipeline {
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        Ok(Self {
            config: load_config(config_json)?,
        })
    }

    #[pyo3(signature = (input_json, workflow_json=None, metrics_json=None, stakeholder_values_json=None))]
    fn run(
        &self,
        input_json: &str,
        workflow_json: Option<&str>,
        metrics_json: Option<&str>,
        stakeholder_values_json: Option<&str>,
    ) -> PyResult<String> {
        let (workflow, inputs) =
            load_side_documents(workflow_json, metrics_json, stakeholder_values_json)?;
        let report = run_pipeline(input_json, &self.config, workflow.as_ref(), &inputs)?;
        report_json(&report)
    }

    #[pyo3(signature = (input_path, workflow_path=None))]
    fn run_file(&self, input_path: &str, workflow_path: Option<&str>) -> PyResult<String> {
        let raw = read_document(Path::new(input_path))?;
        let workflow = workflow_path
            .map(|path| read_workflow(Path::new(path)))
            .transpose()?;
        let report = run_pipeline(
            &raw,
            &self.config,
            workflow.as_ref(),
            &EnrichmentInputs::default(),
        )?;
        report_json(&report)
    }

    fn config_json(&self) -> PyResult<String> {
        Ok(serde_json::to_string(&self.config).map_err(RamiError::from)?)
    }
}

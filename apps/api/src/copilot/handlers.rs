//! Axum route handlers for the Job Copilot API.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::copilot::export::{ExportedResult, RunSummary};
use crate::copilot::pipeline::PipelineTopology;
use crate::copilot::state::{PipelineState, StageId};
use crate::copilot::validation::{validate_inputs, MIN_INPUT_LENGTH};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub job_description: String,
    pub resume: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub run_id: Uuid,
    pub matching_score: Option<f64>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub cover_letter: Option<String>,
    pub skill_gaps: Vec<String>,
    pub summary: RunSummary,
    pub executed_stages: Vec<StageId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchItemStatus {
    Completed,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub id: String,
    pub status: BatchItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExportedResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowDocs {
    pub name: &'static str,
    pub description: &'static str,
    pub workflow: PipelineTopology,
    pub inputs: Vec<FieldDoc>,
    pub outputs: Vec<FieldDoc>,
}

#[derive(Debug, Serialize)]
pub struct FieldDoc {
    pub name: &'static str,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/job-copilot/analyze
///
/// Runs the full pipeline. A degraded run is reported as `PIPELINE_ERROR`
/// with the partial export attached.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    validate_inputs(&request.job_description, &request.resume)?;
    state.gateway.get()?;

    info!(user_id = ?request.user_id, "Analyzing job application");
    let result = state
        .pipeline
        .run(&request.job_description, &request.resume)
        .await;

    if let Some(message) = result.error() {
        return Err(AppError::Pipeline {
            message: message.to_string(),
            details: serde_json::to_value(ExportedResult::from_state(&result))
                .map_err(anyhow::Error::from)?,
        });
    }

    Ok(Json(analyze_response(&result)))
}

/// POST /api/v1/job-copilot/analyze/stream
///
/// Server-Sent Events: one `stage` event per attempted stage, then `done`.
pub async fn handle_analyze_stream(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    validate_inputs(&request.job_description, &request.resume)?;
    state.gateway.get()?;

    let stages = state
        .pipeline
        .run_streaming(&request.job_description, &request.resume)
        .map(|event| Event::default().event("stage").json_data(&event));
    let done = stream::once(async { Ok(Event::default().event("done").data("{}")) });

    Ok(Sse::new(stages.chain(done)).keep_alive(KeepAlive::default()))
}

/// POST /api/v1/job-copilot/batch-analyze
///
/// Runs every valid item as an independent, concurrent run. Invalid items are
/// reported as failed without aborting the batch.
pub async fn handle_batch_analyze(
    State(state): State<AppState>,
    Json(requests): Json<Vec<AnalyzeRequest>>,
) -> Result<Json<BatchResponse>, AppError> {
    if requests.is_empty() {
        return Err(AppError::Validation("No applications provided".to_string()));
    }
    if requests.len() > state.max_batch_size {
        return Err(AppError::Validation(format!(
            "Maximum {} applications per batch",
            state.max_batch_size
        )));
    }
    state.gateway.get()?;

    info!("Running batch analysis for {} applications", requests.len());

    let runs = requests.into_iter().enumerate().map(|(index, request)| {
        let pipeline = state.pipeline.clone();
        async move {
            let id = request.user_id.clone().unwrap_or_else(|| index.to_string());
            if let Err(e) = validate_inputs(&request.job_description, &request.resume) {
                return BatchItem {
                    id,
                    status: BatchItemStatus::Failed,
                    result: None,
                    error: Some(e.to_string()),
                };
            }

            let result = pipeline.run(&request.job_description, &request.resume).await;
            BatchItem {
                id,
                status: match result.error() {
                    None => BatchItemStatus::Completed,
                    Some(_) => BatchItemStatus::Failed,
                },
                error: result.error().map(str::to_string),
                result: Some(ExportedResult::from_state(&result)),
            }
        }
    });
    let results = futures::future::join_all(runs).await;

    let successful = results
        .iter()
        .filter(|r| matches!(r.status, BatchItemStatus::Completed))
        .count();

    Ok(Json(BatchResponse {
        total: results.len(),
        successful,
        failed: results.len() - successful,
        results,
    }))
}

/// GET /api/v1/job-copilot/graph/structure
pub async fn handle_graph_structure(State(state): State<AppState>) -> Json<PipelineTopology> {
    Json(state.pipeline.describe_topology())
}

/// GET /api/v1/job-copilot/docs/workflow
///
/// Human-readable description of the workflow and its request/response fields.
pub async fn handle_workflow_docs(State(state): State<AppState>) -> Json<WorkflowDocs> {
    let field = |name: &'static str, description: &str| FieldDoc {
        name,
        description: description.to_string(),
    };

    Json(WorkflowDocs {
        name: "Job Copilot",
        description: "Three-stage workflow: parse a job posting, analyze a resume against it, write a cover letter",
        workflow: state.pipeline.describe_topology(),
        inputs: vec![
            field(
                "job_description",
                &format!("Raw job posting text (minimum {MIN_INPUT_LENGTH} characters)"),
            ),
            field(
                "resume",
                &format!("Raw resume text (minimum {MIN_INPUT_LENGTH} characters)"),
            ),
            field("user_id", "Optional caller identifier, echoed in batch results"),
        ],
        outputs: vec![
            field("matching_score", "Overall fit score between 0 and 1"),
            field("job_title", "Extracted job title"),
            field("company", "Extracted company name"),
            field("cover_letter", "Generated cover letter body"),
            field("skill_gaps", "Job skills the resume does not demonstrate"),
            field("summary", "Fit percentages, matched and missing skills, strengths, recommendations"),
            field("executed_stages", "Stages that committed, in order"),
        ],
    })
}

fn analyze_response(result: &PipelineState) -> AnalyzeResponse {
    let job = result.job_description();
    AnalyzeResponse {
        success: true,
        run_id: result.run_id(),
        matching_score: result.matching_score(),
        job_title: job.map(|j| j.title.clone()),
        company: job.map(|j| j.company.clone()),
        cover_letter: result.cover_letter().map(|l| l.body.clone()),
        skill_gaps: result.skill_gaps().to_vec(),
        summary: RunSummary::from_state(result),
        executed_stages: result.executed_stages().to_vec(),
    }
}

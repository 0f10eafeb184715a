//! Copilot pipeline: sequences the three stages over one `PipelineState`.
//!
//! Flow: parse_job_description → analyze_resume → generate_cover_letter.
//!
//! Progress rule: a stage is attempted while the run has no error, or when its
//! own prerequisites are satisfied. After a failure the downstream stages lack
//! their inputs, so the run stops there and the failing stage's error message
//! is what the caller sees. Neither `run` nor `run_streaming` ever fails; a
//! degraded run is a state with `error` set.

use std::sync::Arc;

use futures::stream::{self, Stream};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::copilot::cover_letter::generate_cover_letter;
use crate::copilot::jd_parser::parse_job_description;
use crate::copilot::resume_analyzer::analyze_resume;
use crate::copilot::state::{PipelineState, StageId};
use crate::llm_client::LlmGateway;

/// One streamed notification: a stage finished (or failed) and this is the state after it.
#[derive(Debug, Clone, Serialize)]
pub struct StageEvent {
    pub run_id: Uuid,
    pub stage: StageId,
    pub succeeded: bool,
    pub error_kind: Option<&'static str>,
    pub error: Option<String>,
    pub state: PipelineState,
}

impl StageEvent {
    /// Event for `stage` given the state it left behind. Each stage runs at most
    /// once per run, so a stage succeeded exactly when it was recorded.
    fn after(stage: StageId, state: &PipelineState) -> Self {
        let succeeded = state.executed_stages().contains(&stage);
        Self {
            run_id: state.run_id(),
            stage,
            succeeded,
            error_kind: state.error_kind().filter(|_| !succeeded),
            error: state.error().filter(|_| !succeeded).map(str::to_string),
            state: state.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageDescriptor {
    pub stage: StageId,
    pub description: &'static str,
    pub inputs: Vec<&'static str>,
    pub outputs: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyEdge {
    pub from: &'static str,
    pub to: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineTopology {
    pub stages: Vec<StageDescriptor>,
    pub edges: Vec<TopologyEdge>,
}

/// The orchestrator. Cheap to clone; holds only the shared gateway.
#[derive(Clone)]
pub struct CopilotPipeline {
    gateway: Arc<LlmGateway>,
}

impl CopilotPipeline {
    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self { gateway }
    }

    /// Runs all stages to completion and returns the final (possibly degraded) state.
    pub async fn run(&self, job_text: &str, resume_text: &str) -> PipelineState {
        let mut state = self.start(job_text, resume_text);

        for stage in StageId::ORDERED {
            if !should_attempt(&state, stage) {
                break;
            }
            state = run_stage(stage, state, &self.gateway).await;
        }

        finish(&state);
        state
    }

    /// Same semantics as [`run`](Self::run), yielding one event per attempted stage.
    ///
    /// Stages run only while the stream is polled: dropping the stream after an
    /// event leaves no stage in flight.
    pub fn run_streaming(
        &self,
        job_text: &str,
        resume_text: &str,
    ) -> impl Stream<Item = StageEvent> + Send + 'static {
        let state = self.start(job_text, resume_text);
        let gateway = self.gateway.clone();

        stream::unfold(
            (state, 0usize, gateway),
            |(state, position, gateway)| async move {
                let Some(stage) = StageId::ORDERED
                    .get(position)
                    .copied()
                    .filter(|stage| should_attempt(&state, *stage))
                else {
                    finish(&state);
                    return None;
                };

                let state = run_stage(stage, state, &gateway).await;
                let event = StageEvent::after(stage, &state);
                debug!(run_id = %event.run_id, stage = %stage, succeeded = event.succeeded, "stage event");

                Some((event, (state, position + 1, gateway)))
            },
        )
    }

    /// Ordered stages with their declared inputs and outputs. Pure.
    pub fn describe_topology(&self) -> PipelineTopology {
        let stages = StageId::ORDERED
            .iter()
            .map(|stage| StageDescriptor {
                stage: *stage,
                description: stage.description(),
                inputs: stage.requires().iter().map(|f| f.as_str()).collect(),
                outputs: stage.produces().iter().map(|f| f.as_str()).collect(),
            })
            .collect();

        let names: Vec<&'static str> = std::iter::once("START")
            .chain(StageId::ORDERED.iter().map(|s| s.as_str()))
            .chain(std::iter::once("END"))
            .collect();
        let edges = names
            .windows(2)
            .map(|pair| TopologyEdge {
                from: pair[0],
                to: pair[1],
            })
            .collect();

        PipelineTopology { stages, edges }
    }

    fn start(&self, job_text: &str, resume_text: &str) -> PipelineState {
        let state = PipelineState::new(job_text, resume_text);
        info!(
            run_id = %state.run_id(),
            "Starting copilot run (job: {} chars, resume: {} chars)",
            job_text.len(),
            resume_text.len()
        );
        state
    }
}

fn should_attempt(state: &PipelineState, stage: StageId) -> bool {
    state.error().is_none() || state.missing_prerequisite(stage).is_none()
}

async fn run_stage(stage: StageId, state: PipelineState, gateway: &LlmGateway) -> PipelineState {
    match stage {
        StageId::ParseJobDescription => parse_job_description(state, gateway).await,
        StageId::AnalyzeResume => analyze_resume(state, gateway).await,
        StageId::GenerateCoverLetter => generate_cover_letter(state, gateway).await,
    }
}

fn finish(state: &PipelineState) {
    let stages: Vec<&str> = state.executed_stages().iter().map(|s| s.as_str()).collect();
    match state.error() {
        None => info!(
            run_id = %state.run_id(),
            "Copilot run completed. Stages: {:?}. Matching score: {:?}",
            stages,
            state.matching_score()
        ),
        Some(error) => warn!(
            run_id = %state.run_id(),
            "Copilot run degraded after stages {:?}: {}",
            stages,
            error
        ),
    }
}

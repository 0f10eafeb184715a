//! Shared stage driver.
//!
//! Every stage follows the same contract: prerequisite check → one model call
//! → structured parse → commit. Failures are written into `state.error` and
//! the state is always handed back; nothing here returns an error to the caller.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::copilot::state::{PipelineState, StageId, StateField};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::structured::StructuredOutputError;
use crate::llm_client::{LlmError, LlmGateway};

/// The three recoverable failure kinds of a stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage}: prerequisite missing: {field} is not available")]
    PrerequisiteMissing { stage: StageId, field: StateField },

    #[error("{stage}: generation failure: {source}")]
    GenerationFailure {
        stage: StageId,
        #[source]
        source: LlmError,
    },

    #[error("{stage}: output parse failure: {source}")]
    OutputParseFailure {
        stage: StageId,
        #[source]
        source: StructuredOutputError,
    },
}

impl StageError {
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::PrerequisiteMissing { .. } => "prerequisite_missing",
            StageError::GenerationFailure { .. } => "generation_failure",
            StageError::OutputParseFailure { .. } => "output_parse_failure",
        }
    }
}

/// One pipeline stage: how to prompt, how to parse, where to commit.
pub trait Stage {
    const ID: StageId;
    /// Stage-specific system prompt; the JSON-only instruction is appended.
    const SYSTEM: &'static str;

    type Output: Send;

    fn build_prompt(state: &PipelineState) -> String;

    fn parse(text: &str, state: &PipelineState) -> Result<Self::Output, StructuredOutputError>;

    fn commit(state: &mut PipelineState, output: Self::Output) -> Result<(), StateField>;
}

/// Runs stage `S` and returns the state, with the failure (if any) recorded in it.
pub async fn execute<S: Stage>(mut state: PipelineState, gateway: &LlmGateway) -> PipelineState {
    match attempt::<S>(&mut state, gateway).await {
        Ok(()) => info!(run_id = %state.run_id(), stage = %S::ID, "stage committed"),
        Err(e) => {
            warn!(run_id = %state.run_id(), stage = %S::ID, kind = e.kind(), "stage failed: {e}");
            state.record_error(e.kind(), e.to_string());
        }
    }
    state
}

async fn attempt<S: Stage>(
    state: &mut PipelineState,
    gateway: &LlmGateway,
) -> Result<(), StageError> {
    if let Some(field) = state.missing_prerequisite(S::ID) {
        return Err(StageError::PrerequisiteMissing { stage: S::ID, field });
    }

    let generation_failure = |source: LlmError| StageError::GenerationFailure {
        stage: S::ID,
        source,
    };

    let generator = gateway
        .get()
        .map_err(|e| generation_failure(LlmError::from(e)))?;

    let system = format!("{} {}", S::SYSTEM, JSON_ONLY_INSTRUCTION);
    let prompt = S::build_prompt(state);
    debug!(
        run_id = %state.run_id(),
        stage = %S::ID,
        model = %generator.options().model,
        "calling model ({} prompt chars)",
        prompt.len()
    );

    // The single suspension point of a stage.
    let text = generator
        .generate(&system, &prompt)
        .await
        .map_err(generation_failure)?;

    let output = S::parse(&text, state).map_err(|source| StageError::OutputParseFailure {
        stage: S::ID,
        source,
    })?;

    S::commit(state, output).map_err(|field| StageError::PrerequisiteMissing { stage: S::ID, field })
}

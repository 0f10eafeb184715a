use std::sync::Arc;

use crate::copilot::pipeline::CopilotPipeline;
use crate::llm_client::LlmGateway;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: CopilotPipeline,
    /// Same gateway the pipeline uses; exposed for health reporting.
    pub gateway: Arc<LlmGateway>,
    /// Upper bound on items in one batch request.
    pub max_batch_size: usize,
}

impl AppState {
    pub fn new(gateway: Arc<LlmGateway>, max_batch_size: usize) -> Self {
        Self {
            pipeline: CopilotPipeline::new(gateway.clone()),
            gateway,
            max_batch_size,
        }
    }
}

pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::copilot::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Job Copilot API
        .route("/api/v1/job-copilot/analyze", post(handlers::handle_analyze))
        .route(
            "/api/v1/job-copilot/analyze/stream",
            post(handlers::handle_analyze_stream),
        )
        .route(
            "/api/v1/job-copilot/batch-analyze",
            post(handlers::handle_batch_analyze),
        )
        .route(
            "/api/v1/job-copilot/graph/structure",
            get(handlers::handle_graph_structure),
        )
        .route(
            "/api/v1/job-copilot/docs/workflow",
            get(handlers::handle_workflow_docs),
        )
        .with_state(state)
}

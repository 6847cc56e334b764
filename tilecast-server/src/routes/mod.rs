use axum::{Router, routing::post};
use tilecast_core::api_routes::work;
use tower_http::trace::TraceLayer;

use crate::{handlers, infra::app_state::AppState};

/// Create the router for the work endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(work::TRIGGER, post(handlers::trigger_work_handler))
        .route(work::JOBS, post(handlers::poll_job_handler))
        .route(work::RESULT, post(handlers::submit_result_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

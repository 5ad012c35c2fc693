use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST API router
///
/// `/health` is mirrored under `/api/health` so deployments probing either
/// path keep working.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(api::health_check))
        .route("/conversations", get(api::list_conversations))
        .route("/api/health", get(api::health_check))
        .route("/api/get-config", get(api::get_config))
        .route("/api/save-config", post(api::save_config))
        .route("/api/scheduled-tasks", get(api::scheduled_tasks))
        .route("/api/test-emergency", post(api::test_emergency))
        .layer(TraceLayer::new_for_http())
}

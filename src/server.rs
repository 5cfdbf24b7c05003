use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;

use crate::dispatch::TaskDispatcher;
use crate::handlers;
use crate::store::ResultStore;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<TaskDispatcher>,
    pub results: ResultStore,
    pub uploads_dir: PathBuf,
}

// ============================================================================
// Server Setup
// ============================================================================

pub fn build_app(state: AppState, request_timeout_seconds: u64) -> Router {
    let api_v1 = Router::new()
        .route("/analyze", post(handlers::analyze))
        .route("/health", get(handlers::health))
        .route("/analysis", get(handlers::get_all_analyses))
        .route(
            "/analysis/{document_id}",
            get(handlers::get_analysis).delete(handlers::delete_analysis),
        )
        .route("/reset-database", post(handlers::reset_database))
        .with_state(state.clone())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_seconds),
        ))
        .layer(DefaultBodyLimit::max(64 * 1024 * 1024)); // 64 MB, uploads are videos

    Router::new()
        .route("/run", post(handlers::run))
        .with_state(state)
        .nest("/api/v1", api_v1)
}

//! Stored-result endpoints: lookup, listing, deletion, and reset.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, info};

use super::problem_details;
use crate::server::AppState;

#[derive(Serialize)]
pub struct OperationResponse {
    pub status: String,
    pub message: String,
}

/// GET /api/v1/analysis/{document_id}
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Response {
    match state.results.get(&document_id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => problem_details::not_found(format!(
            "Analysis result not found for document ID: {document_id}"
        )),
        Err(e) => {
            error!(error = %e, document_id = %document_id, "failed to load analysis result");
            problem_details::internal_error("failed to load analysis result")
        }
    }
}

/// GET /api/v1/analysis
pub async fn get_all_analyses(State(state): State<AppState>) -> Response {
    match state.results.list_all().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!(error = %e, "failed to list analysis results");
            problem_details::internal_error("failed to list analysis results")
        }
    }
}

/// DELETE /api/v1/analysis/{document_id}
pub async fn delete_analysis(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Response {
    match state.results.delete(&document_id).await {
        Ok(true) => {
            info!(document_id = %document_id, "deleted analysis result");
            Json(OperationResponse {
                status: "success".to_string(),
                message: format!("Analysis result deleted for document ID: {document_id}"),
            })
            .into_response()
        }
        Ok(false) => problem_details::not_found(format!(
            "Analysis result not found for document ID: {document_id}"
        )),
        Err(e) => {
            error!(error = %e, document_id = %document_id, "failed to delete analysis result");
            problem_details::internal_error("failed to delete analysis result")
        }
    }
}

/// POST /api/v1/reset-database
pub async fn reset_database(State(state): State<AppState>) -> Response {
    match state.results.reset().await {
        Ok(()) => Json(OperationResponse {
            status: "success".to_string(),
            message: "Database reset successfully".to_string(),
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "failed to reset database");
            problem_details::internal_error("Error resetting database")
        }
    }
}

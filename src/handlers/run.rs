//! Generic agent endpoint.

use axum::Json;
use axum::extract::State;

use crate::api::{AgentRequest, Envelope};
use crate::server::AppState;

/// POST /run
///
/// Dispatches a raw agent request. Both success and failure come back as a
/// 200 envelope so clients handle one shape.
pub async fn run(State(state): State<AppState>, Json(request): Json<AgentRequest>) -> Json<Envelope> {
    let envelope = state
        .dispatcher
        .process(&request.message, &request.context, request.session_id)
        .await;
    Json(envelope)
}

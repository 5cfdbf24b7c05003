//! Plain error bodies for the administrative endpoints.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Serialize)]
struct ProblemDetails {
    status: u16,
    detail: String,
}

pub fn not_found(detail: impl Into<String>) -> Response {
    build(StatusCode::NOT_FOUND, detail)
}

pub fn bad_request(detail: impl Into<String>) -> Response {
    build(StatusCode::BAD_REQUEST, detail)
}

pub fn internal_error(detail: impl Into<String>) -> Response {
    build(StatusCode::INTERNAL_SERVER_ERROR, detail)
}

fn build(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ProblemDetails {
            status: status.as_u16(),
            detail: detail.into(),
        }),
    )
        .into_response()
}

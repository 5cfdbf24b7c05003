//! The unified analysis endpoint.

use std::path::{Path as FsPath, PathBuf};

use axum::Json;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::problem_details;
use crate::analysis::AnalysisReport;
use crate::api::Envelope;
use crate::classify::{self, AnalysisTarget};
use crate::server::AppState;
use crate::store::AnalysisRecord;

// ============================================================================
// Form
// ============================================================================

#[derive(Default)]
struct AnalyzeForm {
    document_name: Option<String>,
    session_id: Option<String>,
    context: Option<String>,
    url: Option<String>,
    document_type: Option<String>,
    guidelines: Option<String>,
    file_path: Option<PathBuf>,
}

// ============================================================================
// Handler
// ============================================================================

/// POST /api/v1/analyze
///
/// Unified endpoint for analyzing a video ad, an image post, or a website.
/// Request-shape problems (ambiguous target, unsupported extension,
/// malformed context) are rejected with 400 before any backend work;
/// everything downstream of dispatch comes back as a 200 envelope.
pub async fn analyze(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match collect_form(&state, multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    let session_id = form.session_id.clone();

    let mut context = match parse_context(form.context.as_deref()) {
        Ok(context) => context,
        Err(e) => {
            return validation_rejection(format!("Invalid context JSON: {e}"), session_id);
        }
    };

    let target = match AnalysisTarget::from_inputs(form.file_path.clone(), form.url.clone()) {
        Ok(target) => target,
        Err(e) => return validation_rejection(e.to_string(), session_id),
    };

    if let AnalysisTarget::File(path) = &target
        && !path.exists()
    {
        return validation_rejection(
            format!("File not found at path: {}", path.display()),
            session_id,
        );
    }

    // Classify up front so an unsupported extension never reaches dispatch.
    let classified = match classify::classify(target, form.guidelines.as_deref()) {
        Ok(classified) => classified,
        Err(e) => return validation_rejection(e.to_string(), session_id),
    };

    match &classified.target {
        AnalysisTarget::File(path) => {
            context.insert("file_path".to_string(), json!(path.display().to_string()));
        }
        AnalysisTarget::Url(url) => {
            context.insert("url".to_string(), json!(url));
        }
    }
    if let Some(guidelines) = &form.guidelines {
        context.insert("guidelines".to_string(), json!(guidelines));
    }

    info!(modality = %classified.modality, "dispatching analysis request");
    let mut envelope = state
        .dispatcher
        .process(&classified.instruction, &context, form.session_id.clone())
        .await;

    if envelope.is_success() {
        persist_result(&state, &mut envelope, &form, &context, &classified.target).await;
    }

    (StatusCode::OK, Json(envelope)).into_response()
}

/// Store a successful analysis and stamp its document id into the envelope.
///
/// A storage failure is logged and swallowed so it never masks the analysis
/// the caller is waiting for.
async fn persist_result(
    state: &AppState,
    envelope: &mut Envelope,
    form: &AnalyzeForm,
    context: &serde_json::Map<String, Value>,
    target: &AnalysisTarget,
) {
    let report: AnalysisReport = match serde_json::from_str(&envelope.message) {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "success envelope did not carry a parseable report");
            return;
        }
    };

    let document_id = context
        .get("document_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let record = AnalysisRecord {
        document_id: document_id.clone(),
        document_name: form.document_name.clone(),
        upload_time: AnalysisRecord::now_timestamp(),
        status: report.status().to_string(),
        score: report.clamped_score(),
        file_type: form.document_type.clone().unwrap_or_default(),
        file_url: target.source(),
        suggestions: report.suggestions,
        conflicts: report.conflicts,
        guidelines: report.guidelines,
        summary: report.summary,
    };

    match state.results.upsert(&record).await {
        Ok(()) => {
            info!(document_id = %document_id, status = %record.status, "stored analysis result");
        }
        Err(e) => {
            error!(error = %e, document_id = %document_id, "failed to store analysis result");
        }
    }

    if let Value::Object(data) = &mut envelope.data {
        data.insert("document_id".to_string(), json!(document_id));
    }
}

// ============================================================================
// Implementation Details
// ============================================================================

fn validation_rejection(message: String, session_id: Option<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(Envelope::error(
            message,
            json!({ "error_type": "validation" }),
            session_id,
        )),
    )
        .into_response()
}

/// The `context` form field is a JSON object string, default `{}`.
fn parse_context(
    raw: Option<&str>,
) -> Result<serde_json::Map<String, Value>, serde_json::Error> {
    let raw = match raw {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => "{}",
    };
    let value: Value = serde_json::from_str(raw)?;
    match value {
        Value::Object(map) => Ok(map),
        _ => {
            // Reuse serde's error type for the non-object case.
            Err(serde::de::Error::custom("context must be a JSON object"))
        }
    }
}

async fn collect_form(state: &AppState, mut multipart: Multipart) -> Result<AnalyzeForm, Response> {
    let mut form = AnalyzeForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(problem_details::bad_request(format!(
                    "malformed multipart request: {e}"
                )));
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "document_name" => form.document_name = Some(read_text(field).await?),
            "session_id" => form.session_id = Some(read_text(field).await?),
            "context" => form.context = Some(read_text(field).await?),
            "url" => form.url = Some(read_text(field).await?),
            "document_type" => form.document_type = Some(read_text(field).await?),
            "guidelines" => form.guidelines = Some(read_text(field).await?),
            "file" => form.file_path = save_upload(state, field).await?,
            // Unknown fields are ignored.
            _ => {}
        }
    }

    // Empty strings from form widgets count as absent.
    for slot in [&mut form.url, &mut form.session_id] {
        if slot.as_deref().is_some_and(|s| s.trim().is_empty()) {
            *slot = None;
        }
    }

    Ok(form)
}

async fn read_text(field: Field<'_>) -> Result<String, Response> {
    field.text().await.map_err(|e| {
        problem_details::bad_request(format!("malformed multipart request: {e}"))
    })
}

/// Stream the uploaded file into the uploads directory under its own name.
///
/// Returns `None` for a file part with no filename (an empty form widget).
async fn save_upload(state: &AppState, mut field: Field<'_>) -> Result<Option<PathBuf>, Response> {
    let Some(original_name) = field
        .file_name()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
    else {
        return Ok(None);
    };

    // Client-supplied names keep only their final component.
    let file_name = FsPath::new(&original_name)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());

    if let Err(e) = tokio::fs::create_dir_all(&state.uploads_dir).await {
        error!(error = %e, dir = %state.uploads_dir.display(), "failed to create uploads directory");
        return Err(problem_details::internal_error("failed to save uploaded file"));
    }

    let path = state.uploads_dir.join(&file_name);
    let mut out = match tokio::fs::File::create(&path).await {
        Ok(file) => file,
        Err(e) => {
            error!(error = %e, path = %path.display(), "failed to create upload file");
            return Err(problem_details::internal_error("failed to save uploaded file"));
        }
    };

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = out.write_all(&chunk).await {
                    error!(error = %e, path = %path.display(), "failed to write upload");
                    return Err(problem_details::internal_error("failed to save uploaded file"));
                }
            }
            Ok(None) => break,
            Err(e) => {
                return Err(problem_details::bad_request(format!(
                    "malformed multipart request: {e}"
                )));
            }
        }
    }

    if let Err(e) = out.flush().await {
        error!(error = %e, path = %path.display(), "failed to flush upload");
        return Err(problem_details::internal_error("failed to save uploaded file"));
    }

    info!(path = %path.display(), "saved uploaded file");
    Ok(Some(path))
}

// ============================================================================
// Tests
// ============================================================================

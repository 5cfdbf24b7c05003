//! Common test utilities.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Request;

use complyd::analysis::{ModelInvoker, ResponseNormalizer};
use complyd::dispatch::TaskDispatcher;
use complyd::llm::{FileState, GenerativeBackend, LlmError, RemoteFile};
use complyd::server::{self, AppState};
use complyd::session::SessionStore;
use complyd::store::ResultStore;

/// Report JSON the scripted backend returns from the normalization call.
pub const REPORT_JSON: &str = r#"{
    "summary": "A 30-second product ad",
    "suggestions": ["Add a transcript", "Raise text contrast"],
    "conflicts": ["Background music covers the disclaimer"],
    "score": 85,
    "guidelines": ["Use simple, clear language."]
}"#;

/// Scripted backend: uploads succeed instantly, first-pass generation
/// returns raw text, and the normalization call returns [`REPORT_JSON`].
pub struct ScriptedBackend {
    fail_generation: bool,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn ok() -> Self {
        Self {
            fail_generation: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_generation: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of backend calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        self.record();
        Ok(REPORT_JSON.to_string())
    }

    async fn generate_with_file(
        &self,
        _prompt: &str,
        _file: &RemoteFile,
    ) -> Result<String, LlmError> {
        self.record();
        if self.fail_generation {
            return Err(LlmError::Api {
                status: 504,
                message: "backend timeout".to_string(),
            });
        }
        Ok("raw first-pass analysis".to_string())
    }

    async fn upload_file(&self, _path: &Path, _mime_type: &str) -> Result<RemoteFile, LlmError> {
        self.record();
        Ok(RemoteFile {
            name: "files/test".to_string(),
            uri: "https://backend/files/test".to_string(),
            mime_type: "video/mp4".to_string(),
            state: FileState::Active,
        })
    }

    async fn get_file(&self, _name: &str) -> Result<RemoteFile, LlmError> {
        self.record();
        Ok(RemoteFile {
            name: "files/test".to_string(),
            uri: "https://backend/files/test".to_string(),
            mime_type: "video/mp4".to_string(),
            state: FileState::Active,
        })
    }

    async fn delete_file(&self, _name: &str) -> Result<(), LlmError> {
        self.record();
        Ok(())
    }
}

/// Create a test `AppState` over the given backend, an in-memory result
/// store, and a temp uploads directory.
pub async fn test_app_state(backend: Arc<ScriptedBackend>) -> AppState {
    use tempfile::TempDir;

    let tmp = TempDir::new().unwrap();
    // Leak the TempDir so it doesn't get cleaned up during the test.
    let tmp = Box::leak(Box::new(tmp));
    let uploads_dir = tmp.path().join("uploads");

    let invoker = ModelInvoker::new(backend.clone(), Duration::from_millis(1), 3);
    let normalizer = ResponseNormalizer::new(backend);
    let dispatcher = TaskDispatcher::new(SessionStore::new(), invoker, normalizer);

    AppState {
        dispatcher: Arc::new(dispatcher),
        results: ResultStore::connect_in_memory().await.unwrap(),
        uploads_dir,
    }
}

/// Create a test app over a healthy scripted backend.
pub async fn test_app() -> Router {
    let state = test_app_state(Arc::new(ScriptedBackend::ok())).await;
    server::build_app(state, 300)
}

/// Build a router from existing state (for multi-request tests).
pub fn app_from_state(state: &AppState) -> Router {
    server::build_app(state.clone(), 300)
}

// ============================================================================
// Multipart Helpers
// ============================================================================

pub const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

/// Build a multipart/form-data request for the analyze endpoint.
pub fn multipart_request(
    uri: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    if let Some((filename, bytes)) = file {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

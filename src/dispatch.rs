//! Task dispatch: session lifecycle around the classifier -> invoker ->
//! normalizer pipeline, funneled into a uniform envelope.

use std::path::PathBuf;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::{
    AnalysisReport, InvokeError, ModelInvoker, NormalizeError, ResponseNormalizer, guidelines,
};
use crate::api::Envelope;
use crate::classify::{self, AnalysisTarget, ClassifyError, Modality};
use crate::session::{DEFAULT_USER_ID, SessionStore, Turn};

// ============================================================================
// DispatchError
// ============================================================================

/// Everything that can go wrong between accepting a request and producing a
/// report. Dispatch never propagates these; they are folded into an error
/// envelope tagged with the error kind.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ClassifyError),

    #[error(transparent)]
    Invocation(#[from] InvokeError),

    #[error(transparent)]
    Normalization(#[from] NormalizeError),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Validation(_) => "validation",
            DispatchError::Invocation(_) => "invocation",
            DispatchError::Normalization(_) => "normalization",
        }
    }
}

// ============================================================================
// TaskDispatcher
// ============================================================================

/// Orchestrates one analysis request end to end.
pub struct TaskDispatcher {
    sessions: SessionStore,
    invoker: ModelInvoker,
    normalizer: ResponseNormalizer,
}

/// What a successful pipeline run produced.
struct PipelineOutcome {
    report: AnalysisReport,
    modality: Modality,
    source: String,
}

impl TaskDispatcher {
    pub fn new(
        sessions: SessionStore,
        invoker: ModelInvoker,
        normalizer: ResponseNormalizer,
    ) -> Self {
        Self {
            sessions,
            invoker,
            normalizer,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Process one request.
    ///
    /// Resolves the session (creating it on first reference), appends the
    /// user turn, drives the pipeline, and appends the model turn on
    /// success. Always returns an envelope - pipeline failures become error
    /// envelopes, never propagated errors. A user turn appended before a
    /// failing pipeline stays in the log.
    pub async fn process(
        &self,
        message: &str,
        context: &serde_json::Map<String, Value>,
        session_id: Option<String>,
    ) -> Envelope {
        let user_id = context
            .get("user_id")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_USER_ID)
            .to_string();

        let session_id = session_id.unwrap_or_else(|| {
            let generated = Uuid::new_v4().to_string();
            info!(session_id = %generated, "generated new session id");
            generated
        });

        self.sessions.get_or_create(&user_id, &session_id).await;
        let _ = self
            .sessions
            .append_turn(&user_id, &session_id, Turn::user(message))
            .await;

        match self.run_pipeline(context).await {
            Ok(outcome) => {
                let report_json = match serde_json::to_string(&outcome.report) {
                    Ok(json) => json,
                    Err(e) => {
                        // Serializing a plain struct; if this fails something
                        // is deeply wrong, but the envelope contract holds.
                        warn!(error = %e, "failed to serialize report");
                        return Envelope::error(
                            format!("Error processing your request: {e}"),
                            json!({ "error_type": "normalization" }),
                            Some(session_id),
                        );
                    }
                };

                let _ = self
                    .sessions
                    .append_turn(&user_id, &session_id, Turn::model(report_json.clone()))
                    .await;

                Envelope::success(
                    report_json,
                    json!({
                        "modality": outcome.modality,
                        "source": outcome.source,
                    }),
                    session_id,
                )
            }
            Err(e) => {
                warn!(
                    error = %e,
                    kind = e.kind(),
                    session_id = %session_id,
                    "analysis pipeline failed"
                );
                Envelope::error(
                    format!("Error processing your request: {e}"),
                    json!({ "error_type": e.kind() }),
                    Some(session_id),
                )
            }
        }
    }

    /// Classifier -> invoker -> normalizer, with the target resolved from
    /// the context map (`file_path` xor `url`, optional `guidelines`).
    async fn run_pipeline(
        &self,
        context: &serde_json::Map<String, Value>,
    ) -> Result<PipelineOutcome, DispatchError> {
        let file_path = context
            .get("file_path")
            .and_then(Value::as_str)
            .map(PathBuf::from);
        let url = context
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string);
        let guidelines_override = context.get("guidelines").and_then(Value::as_str);

        let target = AnalysisTarget::from_inputs(file_path, url)?;
        let content = classify::classify(target, guidelines_override)?;

        let raw = self.invoker.invoke(&content).await?;

        let applied_guidelines = guidelines_override
            .unwrap_or_else(|| guidelines::for_modality(content.modality));
        let report = self.normalizer.normalize(&raw, applied_guidelines).await?;

        Ok(PipelineOutcome {
            report,
            modality: content.modality,
            source: content.target.source(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::api::EnvelopeStatus;
    use crate::llm::{FileState, GenerativeBackend, LlmError, RemoteFile};

    const REPORT_JSON: &str = r#"{
        "summary": "A compliant ad",
        "suggestions": ["Louder voiceover"],
        "conflicts": [],
        "score": 85,
        "guidelines": ["Use simple, clear language."]
    }"#;

    /// Backend returning raw text for file generation and a scripted reply
    /// for the normalization (text) call.
    struct PipelineBackend {
        normalizer_reply: String,
        fail_generation: bool,
        calls: Mutex<Vec<String>>,
    }

    impl PipelineBackend {
        fn new(normalizer_reply: &str) -> Self {
            Self {
                normalizer_reply: normalizer_reply.to_string(),
                fail_generation: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                normalizer_reply: String::new(),
                fail_generation: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerativeBackend for PipelineBackend {
        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push("generate".to_string());
            Ok(self.normalizer_reply.clone())
        }

        async fn generate_with_file(
            &self,
            _prompt: &str,
            _file: &RemoteFile,
        ) -> Result<String, LlmError> {
            self.calls
                .lock()
                .unwrap()
                .push("generate_with_file".to_string());
            if self.fail_generation {
                return Err(LlmError::Api {
                    status: 504,
                    message: "backend timeout".to_string(),
                });
            }
            Ok("raw first-pass analysis".to_string())
        }

        async fn upload_file(
            &self,
            _path: &Path,
            _mime_type: &str,
        ) -> Result<RemoteFile, LlmError> {
            self.calls.lock().unwrap().push("upload_file".to_string());
            Ok(RemoteFile {
                name: "files/x".to_string(),
                uri: "https://backend/files/x".to_string(),
                mime_type: "video/mp4".to_string(),
                state: FileState::Active,
            })
        }

        async fn get_file(&self, _name: &str) -> Result<RemoteFile, LlmError> {
            self.calls.lock().unwrap().push("get_file".to_string());
            unreachable!("assets start active in these tests")
        }

        async fn delete_file(&self, _name: &str) -> Result<(), LlmError> {
            self.calls.lock().unwrap().push("delete_file".to_string());
            Ok(())
        }
    }

    fn dispatcher(backend: Arc<PipelineBackend>) -> TaskDispatcher {
        let invoker = ModelInvoker::new(backend.clone(), Duration::from_millis(1), 3);
        let normalizer = ResponseNormalizer::new(backend);
        TaskDispatcher::new(SessionStore::new(), invoker, normalizer)
    }

    fn video_context() -> serde_json::Map<String, Value> {
        let mut context = serde_json::Map::new();
        context.insert("file_path".to_string(), json!("ad.mp4"));
        context
    }

    #[tokio::test]
    async fn successful_dispatch_returns_report_envelope() {
        let backend = Arc::new(PipelineBackend::new(REPORT_JSON));
        let dispatcher = dispatcher(backend);

        let envelope = dispatcher
            .process("Analyze this video ad in file path: ad.mp4", &video_context(), None)
            .await;

        assert_eq!(envelope.status, EnvelopeStatus::Success);
        assert!(envelope.session_id.is_some());

        let report: AnalysisReport = serde_json::from_str(&envelope.message).unwrap();
        assert_eq!(report.score, 85.0);
        assert_eq!(envelope.data["modality"], "video");
        assert_eq!(envelope.data["source"], "ad.mp4");
    }

    #[tokio::test]
    async fn session_turns_accumulate_across_calls() {
        let backend = Arc::new(PipelineBackend::new(REPORT_JSON));
        let dispatcher = dispatcher(backend);

        let first = dispatcher
            .process("Analyze this video ad", &video_context(), Some("s1".to_string()))
            .await;
        assert_eq!(first.session_id.as_deref(), Some("s1"));
        assert_eq!(
            dispatcher.sessions().turn_count(DEFAULT_USER_ID, "s1").await,
            Some(2) // user + model
        );

        dispatcher
            .process("Analyze this video ad", &video_context(), Some("s1".to_string()))
            .await;
        assert_eq!(
            dispatcher.sessions().turn_count(DEFAULT_USER_ID, "s1").await,
            Some(4)
        );
    }

    #[tokio::test]
    async fn user_id_from_context_scopes_the_session() {
        let backend = Arc::new(PipelineBackend::new(REPORT_JSON));
        let dispatcher = dispatcher(backend);

        let mut context = video_context();
        context.insert("user_id".to_string(), json!("alice"));

        dispatcher
            .process("Analyze", &context, Some("s1".to_string()))
            .await;

        assert_eq!(dispatcher.sessions().turn_count("alice", "s1").await, Some(2));
        assert!(
            dispatcher
                .sessions()
                .turn_count(DEFAULT_USER_ID, "s1")
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn ambiguous_target_is_a_validation_envelope_without_backend_calls() {
        let backend = Arc::new(PipelineBackend::new(REPORT_JSON));
        let dispatcher = dispatcher(backend.clone());

        let mut context = video_context();
        context.insert("url".to_string(), json!("example.com"));

        let envelope = dispatcher.process("Analyze", &context, None).await;

        assert_eq!(envelope.status, EnvelopeStatus::Error);
        assert!(envelope.message.starts_with("Error processing your request:"));
        assert_eq!(envelope.data["error_type"], "validation");
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_target_is_a_validation_envelope() {
        let backend = Arc::new(PipelineBackend::new(REPORT_JSON));
        let dispatcher = dispatcher(backend.clone());

        let envelope = dispatcher
            .process("Analyze", &serde_json::Map::new(), None)
            .await;

        assert_eq!(envelope.status, EnvelopeStatus::Error);
        assert_eq!(envelope.data["error_type"], "validation");
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn unsupported_extension_is_a_validation_envelope() {
        let backend = Arc::new(PipelineBackend::new(REPORT_JSON));
        let dispatcher = dispatcher(backend.clone());

        let mut context = serde_json::Map::new();
        context.insert("file_path".to_string(), json!("report.pdf"));

        let envelope = dispatcher.process("Analyze", &context, None).await;

        assert_eq!(envelope.status, EnvelopeStatus::Error);
        assert!(envelope.message.contains("Unsupported file type"));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn backend_failure_is_an_invocation_envelope() {
        let backend = Arc::new(PipelineBackend::failing());
        let dispatcher = dispatcher(backend);

        let envelope = dispatcher
            .process("Analyze", &video_context(), Some("s1".to_string()))
            .await;

        assert_eq!(envelope.status, EnvelopeStatus::Error);
        assert!(envelope.message.contains("Error processing your request"));
        assert!(envelope.message.contains("backend timeout"));
        assert_eq!(envelope.data["error_type"], "invocation");
    }

    #[tokio::test]
    async fn malformed_model_reply_is_a_normalization_envelope() {
        let backend = Arc::new(PipelineBackend::new("not json at all"));
        let dispatcher = dispatcher(backend);

        let envelope = dispatcher.process("Analyze", &video_context(), None).await;

        assert_eq!(envelope.status, EnvelopeStatus::Error);
        assert_eq!(envelope.data["error_type"], "normalization");
    }

    #[tokio::test]
    async fn user_turn_survives_pipeline_failure() {
        let backend = Arc::new(PipelineBackend::failing());
        let dispatcher = dispatcher(backend);

        dispatcher
            .process("Analyze", &video_context(), Some("s1".to_string()))
            .await;

        // Only the user turn; no model turn was appended.
        assert_eq!(
            dispatcher.sessions().turn_count(DEFAULT_USER_ID, "s1").await,
            Some(1)
        );
    }
}

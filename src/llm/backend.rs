//! The seam between the analysis pipeline and a hosted generative model.

use std::path::Path;

use async_trait::async_trait;

use super::error::LlmError;

/// Processing state of a remotely stored asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Processing,
    Active,
    Failed,
}

/// Handle to an asset uploaded to the backend's file store.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    /// Backend-assigned resource name (e.g. `files/abc123`).
    pub name: String,
    /// URI used to reference the asset in a generation call.
    pub uri: String,
    pub mime_type: String,
    pub state: FileState,
}

/// A hosted generative model.
///
/// One implementation talks to the real Gemini REST API; tests substitute a
/// scripted backend. All calls are single-shot - retries are a caller
/// concern and are deliberately absent from the pipeline.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Run a text-only generation call and return the response text.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Run a generation call over a prompt plus a previously uploaded asset.
    async fn generate_with_file(
        &self,
        prompt: &str,
        file: &RemoteFile,
    ) -> Result<String, LlmError>;

    /// Upload a local file to the backend's file store.
    async fn upload_file(&self, path: &Path, mime_type: &str) -> Result<RemoteFile, LlmError>;

    /// Fetch the current state of an uploaded asset.
    async fn get_file(&self, name: &str) -> Result<RemoteFile, LlmError>;

    /// Delete an uploaded asset from the backend.
    async fn delete_file(&self, name: &str) -> Result<(), LlmError>;
}

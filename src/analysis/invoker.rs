//! Model invocation, one flavor per modality.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::guidelines;
use super::scrape;
use crate::classify::{self, AnalysisTarget, ClassifiedContent, Modality};
use crate::llm::{FileState, GenerativeBackend, LlmError, RemoteFile};

/// Errors raised while driving the backend for one analysis.
///
/// None of these are retried; the dispatcher treats them as terminal for
/// the request.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Backend(#[from] LlmError),

    #[error("uploaded asset '{name}' was not ready after {attempts} checks")]
    AssetTimeout { name: String, attempts: u32 },

    #[error("backend failed to process uploaded asset '{name}'")]
    AssetFailed { name: String },

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("failed to fetch '{url}': {source}")]
    Fetch { url: String, source: reqwest::Error },
}

/// Drives the generative backend for a classified input.
pub struct ModelInvoker {
    backend: Arc<dyn GenerativeBackend>,
    http: reqwest::Client,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl ModelInvoker {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        poll_interval: Duration,
        max_poll_attempts: u32,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(format!("complyd/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            backend,
            http,
            poll_interval,
            max_poll_attempts,
        }
    }

    /// Run the first-pass analysis and return the raw model text.
    pub async fn invoke(&self, content: &ClassifiedContent) -> Result<String, InvokeError> {
        match &content.target {
            AnalysisTarget::File(path) => {
                self.analyze_media(path, content.modality, &content.instruction)
                    .await
            }
            AnalysisTarget::Url(url) => self.analyze_website(url, &content.instruction).await,
        }
    }

    /// Upload the asset, wait for the backend to finish ingesting it, run a
    /// single generation call, and release the remote asset.
    async fn analyze_media(
        &self,
        path: &std::path::Path,
        modality: Modality,
        instruction: &str,
    ) -> Result<String, InvokeError> {
        let prompt = media_prompt(instruction, modality);
        let mime = classify::mime_for_path(path);

        let uploaded = self.backend.upload_file(path, mime).await?;
        let asset_name = uploaded.name.clone();
        debug!(asset = %asset_name, mime = %mime, "uploaded asset");

        let result = self.generate_for_asset(uploaded, &prompt).await;

        // The remote asset is released on every exit path once the upload
        // succeeded; a delete failure does not change the outcome.
        if let Err(e) = self.backend.delete_file(&asset_name).await {
            warn!(asset = %asset_name, error = %e, "failed to delete uploaded asset");
        }

        result
    }

    async fn generate_for_asset(
        &self,
        file: RemoteFile,
        prompt: &str,
    ) -> Result<String, InvokeError> {
        let file = self.await_asset_ready(file).await?;
        Ok(self.backend.generate_with_file(prompt, &file).await?)
    }

    /// Poll the asset at a fixed interval until it leaves the processing
    /// state, bounded by the configured attempt cap.
    async fn await_asset_ready(&self, mut file: RemoteFile) -> Result<RemoteFile, InvokeError> {
        let mut attempts = 0u32;
        while file.state == FileState::Processing {
            if attempts >= self.max_poll_attempts {
                return Err(InvokeError::AssetTimeout {
                    name: file.name,
                    attempts,
                });
            }
            attempts += 1;
            tokio::time::sleep(self.poll_interval).await;
            file = self.backend.get_file(&file.name).await?;
        }

        if file.state == FileState::Failed {
            return Err(InvokeError::AssetFailed { name: file.name });
        }

        Ok(file)
    }

    /// Fetch the page, reduce it to text, and run a generation call over it.
    /// No remote asset is involved, so there is nothing to clean up.
    async fn analyze_website(&self, url: &str, instruction: &str) -> Result<String, InvokeError> {
        let fetch_url = scrape::normalize_url(url);
        url::Url::parse(&fetch_url).map_err(|source| InvokeError::InvalidUrl {
            url: fetch_url.clone(),
            source,
        })?;
        debug!(url = %fetch_url, "fetching website content");

        let page_text = scrape::fetch_page_text(&self.http, &fetch_url)
            .await
            .map_err(|source| InvokeError::Fetch {
                url: fetch_url.clone(),
                source,
            })?;

        let prompt = website_prompt(instruction, &page_text);
        Ok(self.backend.generate(&prompt).await?)
    }
}

// ============================================================================
// Prompt Assembly
// ============================================================================

fn media_prompt(instruction: &str, modality: Modality) -> String {
    format!(
        "{instruction}\n\nYou must use the following guidelines for the {}: {}\n\n\
         Also, provide a score out of 100 based on the guidelines.",
        guidelines::subject(modality),
        guidelines::for_modality(modality),
    )
}

fn website_prompt(instruction: &str, page_text: &str) -> String {
    format!(
        "{instruction}\n\nWebsite content:\n{page_text}\n\n\
         You must use the following guidelines for the website: {}\n\n\
         Also, provide a score out of 100 based on the guidelines.",
        guidelines::for_modality(Modality::Website),
    )
}

// ============================================================================
// Tests
// ============================================================================

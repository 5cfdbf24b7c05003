//! Gemini generative backend over the REST API.
//!
//! Covers the two surfaces the pipeline needs: `generateContent` for text
//! and file-grounded generation, and the media file store
//! (upload / get / delete) for video and image assets.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::backend::{FileState, GenerativeBackend, RemoteFile};
use super::error::LlmError;
use crate::config::GeminiConfig;

/// Gemini backend client.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Build a client from configuration with a resolved API key.
    ///
    /// The generation timeout is applied at the HTTP client level, so a
    /// hanging backend call is bounded by it.
    pub fn new(config: &GeminiConfig, api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .user_agent(format!("complyd/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.generation_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    async fn send_generate(&self, request: &GenerateContentRequest) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        extract_text(parsed)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::Text {
                    text: prompt.to_string(),
                }],
            }],
        };
        self.send_generate(&request).await
    }

    async fn generate_with_file(
        &self,
        prompt: &str,
        file: &RemoteFile,
    ) -> Result<String, LlmError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    Part::FileData {
                        file_data: FileDataPayload {
                            file_uri: file.uri.clone(),
                            mime_type: file.mime_type.clone(),
                        },
                    },
                ],
            }],
        };
        self.send_generate(&request).await
    }

    async fn upload_file(&self, path: &Path, mime_type: &str) -> Result<RemoteFile, LlmError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| LlmError::Api {
            status: 0,
            message: format!("failed to read '{}': {e}", path.display()),
        })?;

        let url = format!("{}/upload/v1beta/files?key={}", self.base_url, self.api_key);

        let response = self
            .client
            .post(&url)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("Content-Type", mime_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        let parsed: UploadResponse = response.json().await?;
        Ok(parsed.file.into_remote_file())
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, LlmError> {
        let url = format!("{}/v1beta/{}?key={}", self.base_url, name, self.api_key);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        let parsed: FileResource = response.json().await?;
        Ok(parsed.into_remote_file())
    }

    async fn delete_file(&self, name: &str) -> Result<(), LlmError> {
        let url = format!("{}/v1beta/{}?key={}", self.base_url, name, self.api_key);

        let response = self.client.delete(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        Ok(())
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(serde::Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(serde::Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(serde::Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileDataPayload,
    },
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct FileDataPayload {
    file_uri: String,
    mime_type: String,
}

#[derive(serde::Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(serde::Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(serde::Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(serde::Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: String,
}

impl FileResource {
    fn into_remote_file(self) -> RemoteFile {
        let state = match self.state.as_str() {
            "ACTIVE" => FileState::Active,
            "FAILED" => FileState::Failed,
            // PROCESSING and anything newer the API may add
            _ => FileState::Processing,
        };
        RemoteFile {
            name: self.name,
            uri: self.uri,
            mime_type: self.mime_type,
            state,
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn extract_text(response: GenerateContentResponse) -> Result<String, LlmError> {
    response
        .candidates
        .and_then(|mut candidates| {
            if candidates.is_empty() {
                None
            } else {
                Some(candidates.remove(0))
            }
        })
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .ok_or(LlmError::EmptyResponse)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_serializes_text_part() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::Text {
                    text: "Analyze this".to_string(),
                }],
            }],
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"text\":\"Analyze this\""));
        assert!(!json.contains("fileData"));
    }

    #[test]
    fn generate_request_serializes_file_part_camel_case() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::FileData {
                    file_data: FileDataPayload {
                        file_uri: "https://example.com/files/abc".to_string(),
                        mime_type: "video/mp4".to_string(),
                    },
                }],
            }],
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"fileData\""));
        assert!(json.contains("\"fileUri\":\"https://example.com/files/abc\""));
        assert!(json.contains("\"mimeType\":\"video/mp4\""));
    }

    #[test]
    fn response_text_is_extracted() {
        let json = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "analysis text"}]}}
            ]
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_text(response).unwrap(), "analysis text");
    }

    #[test]
    fn empty_candidates_is_an_error() {
        let json = r#"{"candidates": []}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            extract_text(response),
            Err(LlmError::EmptyResponse)
        ));
    }

    #[test]
    fn file_resource_states_map() {
        let processing: FileResource = serde_json::from_str(
            r#"{"name": "files/a", "uri": "u", "mimeType": "video/mp4", "state": "PROCESSING"}"#,
        )
        .unwrap();
        assert_eq!(
            processing.into_remote_file().state,
            FileState::Processing
        );

        let active: FileResource =
            serde_json::from_str(r#"{"name": "files/a", "state": "ACTIVE"}"#).unwrap();
        assert_eq!(active.into_remote_file().state, FileState::Active);

        let failed: FileResource =
            serde_json::from_str(r#"{"name": "files/a", "state": "FAILED"}"#).unwrap();
        assert_eq!(failed.into_remote_file().state, FileState::Failed);
    }
}

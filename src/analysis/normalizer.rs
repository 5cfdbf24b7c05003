//! The typed normalization boundary.
//!
//! A second backend call re-expresses the free-text analysis in the fixed
//! report shape; the reply must parse into [`AnalysisReport`] or the
//! normalization fails. This is the one place schema validation happens,
//! independent of which backend produced the raw text.

use std::sync::Arc;

use thiserror::Error;

use super::report::AnalysisReport;
use crate::llm::{GenerativeBackend, LlmError};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Backend(#[from] LlmError),

    #[error("model output does not match the expected report shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Coerces raw model output into the fixed report shape.
pub struct ResponseNormalizer {
    backend: Arc<dyn GenerativeBackend>,
}

impl ResponseNormalizer {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    /// Issue the formatting call and parse the reply. Not retried: a shape
    /// mismatch is surfaced to the dispatcher as-is.
    pub async fn normalize(
        &self,
        raw_analysis: &str,
        guidelines: &str,
    ) -> Result<AnalysisReport, NormalizeError> {
        let prompt = format_prompt(raw_analysis, guidelines);
        let reply = self.backend.generate(&prompt).await?;
        parse_report(&reply)
    }
}

fn format_prompt(raw_analysis: &str, guidelines: &str) -> String {
    format!(
        "You are the response agent for responding to the analysis of previous agents.\n\
         Re-express the analysis below as a single JSON object with exactly these fields:\n\
         - summary: string summarizing the analyzed content\n\
         - suggestions: array of strings with improvement suggestions\n\
         - conflicts: array of strings listing conflicts with the guidelines\n\
         - score: number from 0 to 100\n\
         - guidelines: array of strings listing the guidelines that were applied\n\
         Respond with the JSON object only, no prose.\n\n\
         Analysis:\n{raw_analysis}\n\n\
         Guidelines applied:\n{guidelines}"
    )
}

/// Parse a model reply into a report, tolerating a markdown code fence.
fn parse_report(reply: &str) -> Result<AnalysisReport, NormalizeError> {
    let cleaned = strip_code_fence(reply);
    Ok(serde_json::from_str(cleaned)?)
}

/// Strip a wrapping ``` / ```json fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

// ============================================================================
// Tests
// ============================================================================

//! Content classification: decide which analysis pipeline applies to a
//! submitted input and build the instruction for it.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Known video file extensions (lowercase, without the leading dot).
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "wmv", "flv", "mkv"];

/// Known image file extensions (lowercase, without the leading dot).
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff"];

// ============================================================================
// Modality
// ============================================================================

/// The kind of content under analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Video,
    Post,
    Website,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Video => write!(f, "video"),
            Modality::Post => write!(f, "post"),
            Modality::Website => write!(f, "website"),
        }
    }
}

// ============================================================================
// AnalysisTarget
// ============================================================================

/// The single input an analysis request operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisTarget {
    File(PathBuf),
    Url(String),
}

impl AnalysisTarget {
    /// Build a target from optional file and URL inputs, enforcing that
    /// exactly one is present.
    pub fn from_inputs(
        file_path: Option<PathBuf>,
        url: Option<String>,
    ) -> Result<Self, ClassifyError> {
        match (file_path, url) {
            (Some(_), Some(_)) => Err(ClassifyError::MultipleInputs),
            (Some(path), None) => Ok(AnalysisTarget::File(path)),
            (None, Some(url)) => Ok(AnalysisTarget::Url(url)),
            (None, None) => Err(ClassifyError::MissingInput),
        }
    }

    /// The source reference as stored alongside a result.
    pub fn source(&self) -> String {
        match self {
            AnalysisTarget::File(path) => path.display().to_string(),
            AnalysisTarget::Url(url) => url.clone(),
        }
    }
}

// ============================================================================
// ClassifiedContent
// ============================================================================

/// A classified input with the instruction that drives the pipeline.
#[derive(Debug, Clone)]
pub struct ClassifiedContent {
    pub modality: Modality,
    pub target: AnalysisTarget,
    pub instruction: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("Unsupported file type: .{0}")]
    UnsupportedFileType(String),

    #[error("Cannot provide multiple inputs. Choose one: URL or file path.")]
    MultipleInputs,

    #[error("Must provide one input: URL or file path.")]
    MissingInput,
}

/// Classify a target and build its instruction string.
///
/// File targets are classified by extension against fixed tables; anything
/// outside them is rejected before any network call. URL targets are always
/// websites. Pure - no I/O.
pub fn classify(
    target: AnalysisTarget,
    guidelines_override: Option<&str>,
) -> Result<ClassifiedContent, ClassifyError> {
    let (modality, mut instruction) = match &target {
        AnalysisTarget::File(path) => {
            let modality = classify_extension(path)?;
            let lead = match modality {
                Modality::Video => "Analyze this video ad",
                Modality::Post => "Analyze this Instagram post",
                Modality::Website => unreachable!("file targets are never websites"),
            };
            (modality, format!("{lead} in file path: {}", path.display()))
        }
        AnalysisTarget::Url(url) => (
            Modality::Website,
            format!("Analyze this website at URL: {url}"),
        ),
    };

    if let Some(guidelines) = guidelines_override {
        instruction.push_str(&format!(" with guidelines: {guidelines}"));
    }

    Ok(ClassifiedContent {
        modality,
        target,
        instruction,
    })
}

/// Classify a file path by extension into video or post.
fn classify_extension(path: &Path) -> Result<Modality, ClassifyError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Ok(Modality::Video)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(Modality::Post)
    } else {
        Err(ClassifyError::UnsupportedFileType(ext))
    }
}

/// MIME type for an upload, derived from the file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("mkv") => "video/x-matroska",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_extension_classifies_as_video() {
        let target = AnalysisTarget::File(PathBuf::from("ads/ad.mp4"));
        let classified = classify(target, None).unwrap();

        assert_eq!(classified.modality, Modality::Video);
        assert!(classified.instruction.contains("Analyze this video ad"));
        assert!(classified.instruction.contains("ads/ad.mp4"));
    }

    #[test]
    fn image_extension_classifies_as_post() {
        let target = AnalysisTarget::File(PathBuf::from("post.PNG"));
        let classified = classify(target, None).unwrap();

        assert_eq!(classified.modality, Modality::Post);
        assert!(
            classified
                .instruction
                .contains("Analyze this Instagram post")
        );
    }

    #[test]
    fn url_classifies_as_website() {
        let target = AnalysisTarget::Url("example.com".to_string());
        let classified = classify(target, None).unwrap();

        assert_eq!(classified.modality, Modality::Website);
        assert_eq!(
            classified.instruction,
            "Analyze this website at URL: example.com"
        );
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let target = AnalysisTarget::File(PathBuf::from("report.pdf"));
        let err = classify(target, None).unwrap_err();

        assert_eq!(err, ClassifyError::UnsupportedFileType("pdf".to_string()));
        assert!(err.to_string().contains("pdf"));
    }

    #[test]
    fn extension_missing_is_rejected() {
        let target = AnalysisTarget::File(PathBuf::from("no-extension"));
        assert!(matches!(
            classify(target, None),
            Err(ClassifyError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn guidelines_override_is_appended() {
        let target = AnalysisTarget::Url("example.com".to_string());
        let classified = classify(target, Some("No health claims.")).unwrap();

        assert!(
            classified
                .instruction
                .ends_with("with guidelines: No health claims.")
        );
    }

    #[test]
    fn both_inputs_rejected() {
        let result = AnalysisTarget::from_inputs(
            Some(PathBuf::from("ad.mp4")),
            Some("example.com".to_string()),
        );
        assert_eq!(result.unwrap_err(), ClassifyError::MultipleInputs);
    }

    #[test]
    fn neither_input_rejected() {
        let result = AnalysisTarget::from_inputs(None, None);
        assert_eq!(result.unwrap_err(), ClassifyError::MissingInput);
    }

    #[test]
    fn mime_lookup_covers_known_extensions() {
        assert_eq!(mime_for_path(Path::new("a.mp4")), "video/mp4");
        assert_eq!(mime_for_path(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(
            mime_for_path(Path::new("a.unknown")),
            "application/octet-stream"
        );
    }
}

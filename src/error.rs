use crate::image_loader::ImageLoadError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures that abort a whole operation (report generation, ingest, CLI command).
#[derive(Debug, Error)]
pub enum SnapdiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image comparison error: {0}")]
    Compare(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot store error: {0}")]
    Store(String),

    #[error("Report cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid capture time '{value}': {reason}")]
    InvalidDate { value: String, reason: String },
}

impl SnapdiffError {
    pub fn store(message: impl Into<String>) -> Self {
        SnapdiffError::Store(message.into())
    }

    pub fn cache(message: impl Into<String>) -> Self {
        SnapdiffError::Cache(message.into())
    }

    pub fn invalid_date(value: impl Into<String>, reason: impl ToString) -> Self {
        SnapdiffError::InvalidDate {
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            SnapdiffError::Io(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check file paths/permissions of the storage directories.",
            ),
            SnapdiffError::Image(e) => ErrorPayload::new(
                ErrorCategory::Image,
                e.to_string(),
                "Verify image path/format and readability.",
            ),
            SnapdiffError::Compare(msg) => ErrorPayload::new(
                ErrorCategory::Image,
                msg.to_string(),
                "Check that the reports directory is writable; rerun with --no-artifact to skip the diff image.",
            ),
            SnapdiffError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check JSON inputs (records must carry story, state, browser, capturedAt); run with --verbose for details.",
            ),
            SnapdiffError::Store(msg) => ErrorPayload::new(
                ErrorCategory::Store,
                msg.to_string(),
                "Check that the snapshots file exists and is valid JSON; re-ingest records if it was corrupted.",
            ),
            SnapdiffError::Cache(msg) => ErrorPayload::new(
                ErrorCategory::Cache,
                msg.to_string(),
                "Check that the reports directory is writable; rerun with --reload to recompute.",
            ),
            SnapdiffError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("file not found") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Verify the file exists; use an absolute path or run from the working directory.",
                    )
                } else if lower.contains("rgb") || lower.contains("inaccuracy") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Use a per-channel tolerance between 0 and 255 (e.g., --rgb 8).",
                    )
                } else if lower.contains("workers") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Set [concurrency] report_workers/element_workers to a value of at least 1.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags and the [storage]/[diff] sections of the config file.",
                    )
                }
            }
            SnapdiffError::InvalidDate { .. } => ErrorPayload::new(
                ErrorCategory::Config,
                self.to_string(),
                "Use RFC 3339 timestamps (e.g., 2018-05-01T10:00:00.123Z); `snapdiff captures` lists known ones.",
            ),
        }
    }
}

impl From<ImageLoadError> for SnapdiffError {
    fn from(err: ImageLoadError) -> Self {
        match err {
            ImageLoadError::Load(e) => SnapdiffError::Image(e),
            ImageLoadError::NotFound(path) => {
                SnapdiffError::Config(format!("File not found: {}", path))
            }
            ImageLoadError::Save(msg) => SnapdiffError::Io(std::io::Error::other(format!(
                "Failed to save image: {}",
                msg
            ))),
        }
    }
}

pub type Result<T> = std::result::Result<T, SnapdiffError>;

/// Failures scoped to one snapshot group or one element.
///
/// These never abort a report: the owning item records the message as a
/// line of its `error` text and processing continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("{0}")]
    Alignment(String),

    #[error("{side} image could not be loaded: {message}")]
    ImageLoad { side: &'static str, message: String },

    #[error("image comparison failed: {0}")]
    ImageCompare(String),

    #[error("{side} elements could not be parsed: {message}")]
    ElementParse { side: &'static str, message: String },

    #[error("element '{name}' comparison failed: {message}")]
    ElementCompare { name: String, message: String },
}

impl ItemError {
    pub fn alignment(message: impl Into<String>) -> Self {
        ItemError::Alignment(message.into())
    }

    pub fn image_compare(message: impl Into<String>) -> Self {
        ItemError::ImageCompare(message.into())
    }

    pub fn element_compare(name: impl Into<String>, message: impl Into<String>) -> Self {
        ItemError::ElementCompare {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Joins item errors into the newline-separated text stored on a snapshot.
pub fn join_item_errors(errors: &[ItemError]) -> Option<String> {
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Image,
    Store,
    Cache,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}

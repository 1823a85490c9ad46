use serde::{Deserialize, Serialize};

use crate::error::ErrorPayload;
use crate::store::CaptureSummary;
use crate::types::{DiffReport, ReportSummary, SnapshotRecord};

/// Schema version for output payloads.
pub const SNAPDIFF_OUTPUT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum SnapdiffOutput {
    Report(ReportOutput),
    Ingest(IngestOutput),
    Captures(CapturesOutput),
    Records(RecordsOutput),
    CompareImages(CompareImagesOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutput {
    pub version: String,
    pub cached: bool,
    pub summary: ReportSummary,
    pub report: DiffReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutput {
    pub version: String,
    pub inserted: usize,
    pub updated: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturesOutput {
    pub version: String,
    pub captures: Vec<CaptureSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsOutput {
    pub version: String,
    pub captured_at: String,
    pub records: Vec<SnapshotRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareImagesOutput {
    pub version: String,
    pub actual: String,
    pub expected: String,
    pub inaccuracy: u8,
    pub diff_pixels: u64,
    pub diff_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: ErrorPayload,
}

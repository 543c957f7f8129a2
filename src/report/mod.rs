/// Patient reports
///
/// A report is either a text note or a reference to an uploaded image/PDF
/// in the report file store. A file report must never point at a missing
/// artifact; [`ReportManager`] keeps the file and the row in step and can
/// sweep for reports that have lost their artifact.

mod manager;

pub use manager::ReportManager;

use crate::error::IcuError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Text,
    Image,
    Pdf,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Text => "text",
            ReportType::Image => "image",
            ReportType::Pdf => "pdf",
        }
    }

    /// File reports are PDFs or images, decided by mime type
    pub fn for_mime_type(mime_type: &str) -> Self {
        if mime_type.eq_ignore_ascii_case("application/pdf") {
            ReportType::Pdf
        } else {
            ReportType::Image
        }
    }
}

impl FromStr for ReportType {
    type Err = IcuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ReportType::Text),
            "image" => Ok(ReportType::Image),
            "pdf" => Ok(ReportType::Pdf),
            _ => Err(IcuError::Validation(format!("Unknown report type: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportCategory {
    Lab,
    Radiology,
    Clinical,
    Discharge,
    Consultation,
    #[default]
    Other,
}

impl ReportCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportCategory::Lab => "lab",
            ReportCategory::Radiology => "radiology",
            ReportCategory::Clinical => "clinical",
            ReportCategory::Discharge => "discharge",
            ReportCategory::Consultation => "consultation",
            ReportCategory::Other => "other",
        }
    }
}

impl FromStr for ReportCategory {
    type Err = IcuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lab" => Ok(ReportCategory::Lab),
            "radiology" => Ok(ReportCategory::Radiology),
            "clinical" => Ok(ReportCategory::Clinical),
            "discharge" => Ok(ReportCategory::Discharge),
            "consultation" => Ok(ReportCategory::Consultation),
            "other" => Ok(ReportCategory::Other),
            _ => Err(IcuError::Validation(format!("Unknown report category: {}", s))),
        }
    }
}

/// Report record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub patient_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub category: ReportCategory,
    pub content: String,
    pub file_url: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub description: String,
    pub tags: Vec<String>,
    pub uploaded_by: Option<String>,
    pub ai_processed: bool,
    pub ai_extracted_text: String,
    pub ai_summary: String,
    pub timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn has_file(&self) -> bool {
        self.report_type != ReportType::Text && !self.file_url.is_empty()
    }
}

/// A best-effort step that failed without failing the operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideEffectWarning {
    pub step: &'static str,
    pub message: String,
}

/// Operation result plus any side-effect warnings
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<SideEffectWarning>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, step: &'static str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{} failed: {}", step, message);
        self.warnings.push(SideEffectWarning { step, message });
    }
}

/// Text report request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTextReportRequest {
    #[validate(length(min = 1, message = "Patient id is required"))]
    pub patient_id: String,
    #[validate(length(min = 1, message = "Report title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Report content is required"))]
    pub content: String,
    #[serde(default)]
    pub category: ReportCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Text fields accompanying a file upload. `tags` is the raw JSON string
/// from the form and is parsed leniently.
#[derive(Debug, Clone, Default)]
pub struct FileReportFields {
    pub patient_id: String,
    pub title: String,
    pub category: ReportCategory,
    pub description: String,
    pub tags: Option<String>,
}

/// Whitelisted report update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReportRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<ReportCategory>,
    /// Ignored unless the report is a text report
    pub content: Option<String>,
}

/// Report list filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportListQuery {
    #[serde(rename = "type")]
    pub report_type: Option<ReportType>,
    pub category: Option<ReportCategory>,
}

/// AI write-back
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResultRequest {
    #[serde(default)]
    pub extracted_text: String,
    #[serde(default)]
    pub summary: String,
}

/// Artifact bytes ready to send
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

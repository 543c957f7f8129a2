/// Report manager implementation using runtime queries
use crate::{
    ai::{AiJob, AiProcessor},
    error::{IcuError, IcuResult},
    file_store::{FileStore, StoredArtifact, Upload, UploadConstraints},
    metrics,
    patient::PatientManager,
    report::{
        CreateTextReportRequest, Download, FileReportFields, Outcome, Report, ReportCategory,
        ReportType, UpdateReportRequest,
    },
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::{str::FromStr, sync::Arc};
use uuid::Uuid;

const REPORT_COLUMNS: &str = "id, patient_id, title, report_type, category, content, file_url,
     file_name, file_size, mime_type, description, tags, uploaded_by, ai_processed,
     ai_extracted_text, ai_summary, timestamp, updated_at";

/// Parse the tags form field. Anything that is not a JSON array of strings
/// becomes an empty list.
pub fn parse_tags(raw: Option<&str>) -> Vec<String> {
    match raw.map(str::trim) {
        None | Some("") => Vec::new(),
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!("Tags parsing error, using empty list: {}", e);
            Vec::new()
        }),
    }
}

/// Report manager service
pub struct ReportManager {
    db: SqlitePool,
    patients: Arc<PatientManager>,
    files: FileStore,
    constraints: UploadConstraints,
    ai: Option<Arc<dyn AiProcessor>>,
}

impl ReportManager {
    pub fn new(
        db: SqlitePool,
        patients: Arc<PatientManager>,
        files: FileStore,
        constraints: UploadConstraints,
        ai: Option<Arc<dyn AiProcessor>>,
    ) -> Self {
        Self {
            db,
            patients,
            files,
            constraints,
            ai,
        }
    }

    async fn require_patient(&self, patient_id: &str) -> IcuResult<()> {
        if self.patients.exists(patient_id).await? {
            Ok(())
        } else {
            Err(IcuError::NotFound("Patient not found".to_string()))
        }
    }

    /// Create a text report for an existing patient
    pub async fn create_text_report(
        &self,
        request: CreateTextReportRequest,
        uploaded_by: &str,
    ) -> IcuResult<Report> {
        if request.title.trim().is_empty() || request.content.is_empty() {
            return Err(IcuError::Validation(
                "Report title and content are required".to_string(),
            ));
        }

        self.require_patient(&request.patient_id).await?;

        let id = Uuid::new_v4().to_string();
        let tags = encode_tags(&request.tags)?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO reports (id, patient_id, title, report_type, category, content,
                                  description, tags, uploaded_by, timestamp, updated_at)
             VALUES (?1, ?2, ?3, 'text', ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        )
        .bind(&id)
        .bind(&request.patient_id)
        .bind(request.title.trim())
        .bind(request.category.as_str())
        .bind(&request.content)
        .bind(&request.description)
        .bind(&tags)
        .bind(uploaded_by)
        .bind(now)
        .execute(&self.db)
        .await?;

        metrics::record_report_created(ReportType::Text.as_str());
        tracing::info!("Created text report {} for patient {}", id, request.patient_id);

        self.get_report(&id).await
    }

    /// Create a file report.
    ///
    /// The artifact is written before any row exists. A missing patient or
    /// a failed insert removes it again. Malformed tags default to an empty
    /// list. A failed AI handoff is only a warning.
    pub async fn create_file_report(
        &self,
        fields: FileReportFields,
        upload: Upload,
        uploaded_by: &str,
    ) -> IcuResult<Outcome<Report>> {
        if fields.patient_id.trim().is_empty() || fields.title.trim().is_empty() {
            return Err(IcuError::Validation(
                "Patient id and report title are required".to_string(),
            ));
        }

        let artifact = self.files.store(upload, &self.constraints).await?;
        let mut outcome = Outcome::new(());

        match self.patients.exists(&fields.patient_id).await {
            Ok(true) => {}
            Ok(false) => {
                self.discard_artifact(&artifact, &mut outcome).await;
                return Err(IcuError::NotFound("Patient not found".to_string()));
            }
            Err(e) => {
                self.discard_artifact(&artifact, &mut outcome).await;
                return Err(e);
            }
        }

        let tags = parse_tags(fields.tags.as_deref());
        let report_type = ReportType::for_mime_type(&artifact.mime_type);
        let id = Uuid::new_v4().to_string();

        if let Err(e) = self
            .insert_file_report(&id, &fields, &tags, report_type, &artifact, uploaded_by)
            .await
        {
            tracing::error!("Report insert failed, removing uploaded artifact: {}", e);
            self.discard_artifact(&artifact, &mut outcome).await;
            return Err(IcuError::Internal(format!("Failed to save report: {}", e)));
        }

        metrics::record_report_created(report_type.as_str());
        tracing::info!(
            "Created {} report {} for patient {} ({})",
            report_type.as_str(),
            id,
            fields.patient_id,
            artifact.filename
        );

        if let Some(ai) = &self.ai {
            let job = AiJob {
                report_id: id.clone(),
                file_path: artifact.locator.clone(),
                report_type: report_type.as_str().to_string(),
            };
            if let Err(e) = ai.process_file(&job).await {
                outcome.warn("ai_handoff", e.to_string());
            }
        }

        let report = self.get_report(&id).await?;
        Ok(Outcome {
            value: report,
            warnings: outcome.warnings,
        })
    }

    async fn insert_file_report(
        &self,
        id: &str,
        fields: &FileReportFields,
        tags: &[String],
        report_type: ReportType,
        artifact: &StoredArtifact,
        uploaded_by: &str,
    ) -> IcuResult<()> {
        let tags = encode_tags(tags)?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO reports (id, patient_id, title, report_type, category, file_url, file_name,
                                  file_size, mime_type, description, tags, uploaded_by, timestamp, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        )
        .bind(id)
        .bind(&fields.patient_id)
        .bind(fields.title.trim())
        .bind(report_type.as_str())
        .bind(fields.category.as_str())
        .bind(&artifact.locator)
        .bind(&artifact.original_name)
        .bind(artifact.size as i64)
        .bind(&artifact.mime_type)
        .bind(&fields.description)
        .bind(&tags)
        .bind(uploaded_by)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Best-effort removal of an artifact during unwinding
    async fn discard_artifact<T>(&self, artifact: &StoredArtifact, outcome: &mut Outcome<T>) {
        match self.files.delete(&artifact.locator).await {
            Ok(()) => metrics::record_artifact_cleanup(true),
            Err(e) => {
                metrics::record_artifact_cleanup(false);
                outcome.warn("artifact_cleanup", format!("{}: {}", artifact.filename, e));
            }
        }
    }

    /// Get report by id
    pub async fn get_report(&self, id: &str) -> IcuResult<Report> {
        let row = sqlx::query(&format!("SELECT {} FROM reports WHERE id = ?1", REPORT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => report_from_row(&row),
            None => Err(IcuError::NotFound("Report not found".to_string())),
        }
    }

    /// Reports for a patient, newest first
    pub async fn list_patient_reports(
        &self,
        patient_id: &str,
        report_type: Option<ReportType>,
        category: Option<ReportCategory>,
    ) -> IcuResult<Vec<Report>> {
        self.require_patient(patient_id).await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM reports
             WHERE patient_id = ?1
               AND (?2 IS NULL OR report_type = ?2)
               AND (?3 IS NULL OR category = ?3)
             ORDER BY timestamp DESC, rowid DESC",
            REPORT_COLUMNS
        ))
        .bind(patient_id)
        .bind(report_type.map(|t| t.as_str()))
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(report_from_row).collect()
    }

    /// Update whitelisted fields. Content only changes on text reports.
    pub async fn update_report(&self, id: &str, update: UpdateReportRequest) -> IcuResult<Report> {
        let mut report = self.get_report(id).await?;

        if let Some(title) = update.title.filter(|t| !t.trim().is_empty()) {
            report.title = title.trim().to_string();
        }
        if let Some(description) = update.description.filter(|d| !d.is_empty()) {
            report.description = description;
        }
        if let Some(tags) = update.tags {
            report.tags = tags;
        }
        if let Some(category) = update.category {
            report.category = category;
        }
        if let Some(content) = update.content.filter(|c| !c.is_empty()) {
            if report.report_type == ReportType::Text {
                report.content = content;
            }
        }

        sqlx::query(
            "UPDATE reports SET title = ?1, description = ?2, tags = ?3, category = ?4,
                    content = ?5, updated_at = ?6
             WHERE id = ?7",
        )
        .bind(&report.title)
        .bind(&report.description)
        .bind(encode_tags(&report.tags)?)
        .bind(report.category.as_str())
        .bind(&report.content)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        self.get_report(id).await
    }

    /// Delete a report, removing its artifact first.
    ///
    /// An artifact that is already gone is not an error, and a failed file
    /// removal is reported as a warning rather than blocking the delete.
    pub async fn delete_report(&self, id: &str) -> IcuResult<Outcome<()>> {
        let report = self.get_report(id).await?;
        let mut outcome = Outcome::new(());

        if !report.file_url.is_empty() {
            match self.files.delete(&report.file_url).await {
                Ok(()) => metrics::record_artifact_cleanup(true),
                Err(e) => {
                    metrics::record_artifact_cleanup(false);
                    outcome.warn("artifact_delete", format!("{}: {}", report.file_url, e));
                }
            }
        }

        sqlx::query("DELETE FROM reports WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!("Deleted report {}", id);
        Ok(outcome)
    }

    /// Read the artifact behind a file report
    pub async fn open_download(&self, report: &Report) -> IcuResult<Download> {
        if !report.has_file() {
            return Err(IcuError::Validation(
                "This report has no file to download".to_string(),
            ));
        }

        let bytes = self
            .files
            .read(&report.file_url)
            .await?
            .ok_or_else(|| IcuError::NotFound("File not found on server".to_string()))?;

        let file_name = if report.file_name.is_empty() {
            FileStore::resolve_filename(&report.file_url)?
        } else {
            report.file_name.clone()
        };

        let mime_type = if report.mime_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            report.mime_type.clone()
        };

        Ok(Download {
            bytes,
            file_name,
            mime_type,
        })
    }

    /// Store results written back by the AI service
    pub async fn record_ai_result(
        &self,
        id: &str,
        extracted_text: &str,
        summary: &str,
    ) -> IcuResult<Report> {
        let result = sqlx::query(
            "UPDATE reports SET ai_processed = 1, ai_extracted_text = ?1, ai_summary = ?2, updated_at = ?3
             WHERE id = ?4",
        )
        .bind(extracted_text)
        .bind(summary)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(IcuError::NotFound("Report not found".to_string()));
        }

        self.get_report(id).await
    }

    /// File reports whose artifact no longer exists
    pub async fn find_orphans(&self) -> IcuResult<Vec<Report>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM reports WHERE report_type != 'text' ORDER BY timestamp DESC",
            REPORT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        let mut orphans = Vec::new();
        for row in &rows {
            let report = report_from_row(row)?;
            if report.file_url.is_empty() || !self.files.exists(&report.file_url).await? {
                orphans.push(report);
            }
        }

        if !orphans.is_empty() {
            tracing::warn!("Found {} orphaned file reports", orphans.len());
        }

        Ok(orphans)
    }
}

fn encode_tags(tags: &[String]) -> IcuResult<String> {
    serde_json::to_string(tags)
        .map_err(|e| IcuError::Internal(format!("Failed to encode tags: {}", e)))
}

fn report_from_row(row: &SqliteRow) -> IcuResult<Report> {
    let report_type: String = row.get("report_type");
    let category: String = row.get("category");
    let tags: String = row.get("tags");

    Ok(Report {
        id: row.get("id"),
        patient_id: row.get("patient_id"),
        title: row.get("title"),
        report_type: ReportType::from_str(&report_type)?,
        category: ReportCategory::from_str(&category).unwrap_or_default(),
        content: row.get("content"),
        file_url: row.get("file_url"),
        file_name: row.get("file_name"),
        file_size: row.get("file_size"),
        mime_type: row.get("mime_type"),
        description: row.get("description"),
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        uploaded_by: row.get("uploaded_by"),
        ai_processed: row.get("ai_processed"),
        ai_extracted_text: row.get("ai_extracted_text"),
        ai_summary: row.get("ai_summary"),
        timestamp: row.get("timestamp"),
        updated_at: row.get("updated_at"),
    })
}

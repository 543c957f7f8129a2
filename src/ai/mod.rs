/// Handoff to the external AI processing service
///
/// The service is told about new file reports and later writes its results
/// back through `PUT /reports/:id/ai-result`. Every failure here is
/// reported to the caller as a warning; report creation never depends on it.
use crate::error::{IcuError, IcuResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Notification sent for a new file report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiJob {
    pub report_id: String,
    /// Locator of the stored artifact
    pub file_path: String,
    #[serde(rename = "type")]
    pub report_type: String,
}

#[async_trait]
pub trait AiProcessor: Send + Sync {
    async fn process_file(&self, job: &AiJob) -> IcuResult<()>;
}

/// Posts jobs to `{base_url}/api/process-file`
pub struct HttpAiProcessor {
    http_client: Client,
    base_url: String,
}

impl HttpAiProcessor {
    pub fn new(base_url: &str, timeout_secs: u64) -> IcuResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| IcuError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/process-file", self.base_url)
    }
}

#[async_trait]
impl AiProcessor for HttpAiProcessor {
    async fn process_file(&self, job: &AiJob) -> IcuResult<()> {
        let response = self
            .http_client
            .post(self.endpoint())
            .json(job)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IcuError::Internal("AI service timed out".to_string())
                } else {
                    IcuError::Internal(format!("AI service unreachable: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(IcuError::Internal(format!(
                "AI service returned {}",
                response.status()
            )));
        }

        tracing::info!("AI processing initiated for report {}", job.report_id);
        Ok(())
    }
}

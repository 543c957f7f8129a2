/// Request plumbing shared by the API handlers
use crate::{
    error::{IcuError, IcuResult},
    file_store::Upload,
    metrics,
    report::{Outcome, SideEffectWarning},
};
use axum::{
    async_trait,
    extract::{
        multipart::{Multipart, MultipartError},
        rejection::JsonRejection,
        FromRequest, MatchedPath, Request,
    },
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{collections::HashMap, time::Instant};
use validator::Validate;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// JSON body that is deserialized and validated, with failures reported in
/// the uniform error body
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = IcuError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| IcuError::Validation(rejection.body_text()))?;

        value.validate().map_err(|errors| {
            let message = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .next()
                .unwrap_or_else(|| "Invalid request".to_string());
            IcuError::Validation(message)
        })?;

        Ok(ValidatedJson(value))
    }
}

/// JSON body without field validation
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = IcuError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| IcuError::Validation(rejection.body_text()))?;
        Ok(JsonBody(value))
    }
}

/// Text fields and the single file part of a multipart form
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<Upload>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Take the file part, failing when none was sent
    pub fn take_file(&mut self) -> IcuResult<Upload> {
        self.file
            .take()
            .ok_or_else(|| IcuError::Validation("Please upload a file".to_string()))
    }
}

fn multipart_error(e: MultipartError) -> IcuError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        IcuError::Validation("File too large".to_string())
    } else {
        IcuError::Validation(e.body_text())
    }
}

/// Read a multipart form where `file_field` carries the upload
pub async fn read_upload_form(mut multipart: Multipart, file_field: &str) -> IcuResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == file_field {
            let original_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(multipart_error)?;

            form.file = Some(Upload {
                original_name,
                content_type,
                data: data.to_vec(),
            });
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

/// Success envelope `{success: true, message?, data}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub data: T,
    /// Best-effort steps that failed while the request itself succeeded
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SideEffectWarning>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            count: None,
            data,
            warnings: Vec::new(),
        })
    }

    pub fn with_message(message: &str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.to_string()),
            count: None,
            data,
            warnings: Vec::new(),
        })
    }

    /// Success body carrying any side-effect warnings
    pub fn outcome(message: &str, outcome: Outcome<T>) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.to_string()),
            count: None,
            data: outcome.value,
            warnings: outcome.warnings,
        })
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn list(data: Vec<T>) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            count: Some(data.len()),
            data,
            warnings: Vec::new(),
        })
    }
}

/// Record request count and latency per matched route
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    metrics::HTTP_REQUESTS_ACTIVE.inc();
    let started = Instant::now();

    let response = next.run(request).await;

    metrics::HTTP_REQUESTS_ACTIVE.dec();
    metrics::record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}

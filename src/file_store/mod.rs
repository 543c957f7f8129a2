/// File artifact storage
///
/// Artifacts are written under generated names (`uuid` + original
/// extension) and addressed by a locator URL. Each [`FileStore`] is one
/// partition: report uploads live at `/uploads/<name>`, chat images at
/// `/uploads/chat-images/<name>`.

mod disk;

pub use disk::DiskFileBackend;

use crate::error::{IcuError, IcuResult};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Storage backend trait keyed by bare filename
#[async_trait]
pub trait FileBackend: Send + Sync {
    /// Write an artifact
    async fn put(&self, filename: &str, data: &[u8]) -> IcuResult<()>;

    /// Read an artifact
    async fn get(&self, filename: &str) -> IcuResult<Option<Vec<u8>>>;

    /// Delete an artifact; absent files are not an error
    async fn delete(&self, filename: &str) -> IcuResult<()>;

    /// Check if an artifact exists
    async fn exists(&self, filename: &str) -> IcuResult<bool>;
}

/// Limits checked before anything is written
#[derive(Debug, Clone)]
pub struct UploadConstraints {
    pub max_bytes: usize,
    pub allowed_mime_types: Vec<String>,
    /// Lowercase, without the dot. Empty allows any extension.
    pub allowed_extensions: Vec<String>,
}

impl UploadConstraints {
    /// Report uploads: JPEG, PNG, and PDF
    pub fn reports(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            allowed_mime_types: vec![
                "image/jpeg".into(),
                "image/jpg".into(),
                "image/png".into(),
                "application/pdf".into(),
            ],
            allowed_extensions: vec![
                "jpg".into(),
                "jpeg".into(),
                "png".into(),
                "pdf".into(),
            ],
        }
    }

    /// Chat image uploads: JPEG and PNG
    pub fn chat_images(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            allowed_mime_types: vec!["image/jpeg".into(), "image/jpg".into(), "image/png".into()],
            allowed_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
        }
    }

    fn check(&self, upload: &Upload) -> IcuResult<()> {
        if upload.data.is_empty() {
            return Err(IcuError::Validation("Uploaded file is empty".to_string()));
        }

        if upload.data.len() > self.max_bytes {
            return Err(IcuError::Validation(format!(
                "File too large: {} bytes (max: {} bytes)",
                upload.data.len(),
                self.max_bytes
            )));
        }

        if !self
            .allowed_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(&upload.content_type))
        {
            return Err(IcuError::Validation(format!(
                "File type {} is not allowed",
                upload.content_type
            )));
        }

        if !self.allowed_extensions.is_empty() {
            let ext = extension_of(&upload.original_name).unwrap_or_default();
            if !self.allowed_extensions.contains(&ext) {
                return Err(IcuError::Validation(format!(
                    "File extension .{} is not allowed",
                    ext
                )));
            }
        }

        Ok(())
    }
}

/// An upload received from a client
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArtifact {
    /// Generated filename inside the partition
    pub filename: String,
    /// Public locator (absolute URL)
    pub locator: String,
    pub original_name: String,
    pub size: usize,
    pub mime_type: String,
}

/// Lowercased extension without the dot
fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Reject anything that could escape the partition directory
pub fn validate_filename(filename: &str) -> IcuResult<()> {
    if filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains('\0')
    {
        return Err(IcuError::Validation(format!(
            "Invalid artifact name: {}",
            filename
        )));
    }
    Ok(())
}

/// One storage partition
#[derive(Clone)]
pub struct FileStore {
    backend: Arc<dyn FileBackend>,
    public_base_url: String,
    /// URL path prefix, e.g. `uploads` or `uploads/chat-images`
    url_path: String,
}

impl FileStore {
    pub fn new(backend: Arc<dyn FileBackend>, public_base_url: &str, url_path: &str) -> Self {
        Self {
            backend,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            url_path: url_path.trim_matches('/').to_string(),
        }
    }

    /// Locator for a filename in this partition
    pub fn locator_for(&self, filename: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.url_path, filename)
    }

    /// Normalize a locator to a filename.
    ///
    /// Accepts absolute URLs (last path segment is the filename) and legacy
    /// relative paths such as `/uploads/<name>` or `uploads\<name>`.
    pub fn resolve_filename(locator: &str) -> IcuResult<String> {
        let trimmed = locator.trim();
        let path = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.split(['?', '#']).next().unwrap_or_default()
        } else {
            trimmed
        };

        let filename = path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_string();

        validate_filename(&filename)?;
        Ok(filename)
    }

    /// Check constraints, then persist under a generated name
    pub async fn store(&self, upload: Upload, constraints: &UploadConstraints) -> IcuResult<StoredArtifact> {
        constraints.check(&upload)?;

        let filename = match extension_of(&upload.original_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        self.backend.put(&filename, &upload.data).await?;

        tracing::debug!(
            "Stored artifact {} ({} bytes, {})",
            filename,
            upload.data.len(),
            upload.content_type
        );

        Ok(StoredArtifact {
            locator: self.locator_for(&filename),
            filename,
            original_name: upload.original_name,
            size: upload.data.len(),
            mime_type: upload.content_type,
        })
    }

    /// Delete by locator. Missing artifacts count as deleted.
    pub async fn delete(&self, locator: &str) -> IcuResult<()> {
        let filename = Self::resolve_filename(locator)?;
        self.backend.delete(&filename).await
    }

    /// Whether the locator resolves to a stored artifact
    pub async fn exists(&self, locator: &str) -> IcuResult<bool> {
        match Self::resolve_filename(locator) {
            Ok(filename) => self.backend.exists(&filename).await,
            Err(_) => Ok(false),
        }
    }

    /// Read artifact bytes
    pub async fn read(&self, locator: &str) -> IcuResult<Option<Vec<u8>>> {
        let filename = Self::resolve_filename(locator)?;
        self.backend.get(&filename).await
    }
}

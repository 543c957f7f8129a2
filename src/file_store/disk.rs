/// Disk-based file storage backend
use crate::{
    error::IcuResult,
    file_store::{validate_filename, FileBackend},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Disk storage backend
///
/// One flat directory per partition. Filenames are validated so nothing
/// resolves outside `base_path`.
#[derive(Clone)]
pub struct DiskFileBackend {
    base_path: PathBuf,
}

impl DiskFileBackend {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn file_path(&self, filename: &str) -> IcuResult<PathBuf> {
        validate_filename(filename)?;
        Ok(self.base_path.join(filename))
    }
}

#[async_trait]
impl FileBackend for DiskFileBackend {
    async fn put(&self, filename: &str, data: &[u8]) -> IcuResult<()> {
        let path = self.file_path(filename)?;
        fs::create_dir_all(&self.base_path).await?;
        fs::write(&path, data).await?;
        Ok(())
    }

    async fn get(&self, filename: &str) -> IcuResult<Option<Vec<u8>>> {
        let path = self.file_path(filename)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, filename: &str) -> IcuResult<()> {
        let path = self.file_path(filename)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, filename: &str) -> IcuResult<bool> {
        let path = self.file_path(filename)?;
        Ok(fs::try_exists(&path).await?)
    }
}

//! Filesystem collaborator
//!
//! The resolver only ever hands absolute paths below the data root to a
//! [`FileReader`]; it never sees the raw request path.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::error::OriginError;
use crate::security;

/// Read access to the origin filesystem
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileReader: Send + Sync {
    /// True when a regular file exists at `path`
    async fn exists(&self, path: &Path) -> bool;

    /// True when a directory exists at `path`
    async fn is_directory(&self, path: &Path) -> bool;

    async fn read_all(&self, path: &Path) -> Result<Bytes, OriginError>;

    async fn last_modified(&self, path: &Path) -> Result<DateTime<Utc>, OriginError>;

    async fn size(&self, path: &Path) -> Result<u64, OriginError>;

    /// True when a normalized request path names a hidden file or directory
    fn is_dot_path(&self, normalized: &str) -> bool {
        security::is_dot_path(normalized)
    }

    /// Whether a file of `size` bytes may be buffered (and cached)
    fn can_buffer(&self, size: u64) -> bool;
}

/// [`FileReader`] over the local filesystem
#[derive(Debug, Clone)]
pub struct LocalFileReader {
    max_buffered_size: u64,
}

impl LocalFileReader {
    pub fn new(max_buffered_size: u64) -> Self {
        Self { max_buffered_size }
    }

    async fn metadata(path: &Path) -> Result<std::fs::Metadata, OriginError> {
        tokio::fs::metadata(path)
            .await
            .map_err(|e| OriginError::io(path, e))
    }
}

#[async_trait]
impl FileReader for LocalFileReader {
    async fn exists(&self, path: &Path) -> bool {
        matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_file())
    }

    async fn is_directory(&self, path: &Path) -> bool {
        matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_dir())
    }

    async fn read_all(&self, path: &Path) -> Result<Bytes, OriginError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| OriginError::io(path, e))?;
        Ok(Bytes::from(content))
    }

    async fn last_modified(&self, path: &Path) -> Result<DateTime<Utc>, OriginError> {
        let modified = Self::metadata(path)
            .await?
            .modified()
            .map_err(|e| OriginError::io(path, e))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    async fn size(&self, path: &Path) -> Result<u64, OriginError> {
        let meta = Self::metadata(path).await?;
        if !meta.is_file() {
            return Err(OriginError::NotAFile(path.to_path_buf()));
        }
        Ok(meta.len())
    }

    fn can_buffer(&self, size: u64) -> bool {
        size <= self.max_buffered_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_exists_and_is_directory() {
        let dir = fixture();
        let reader = LocalFileReader::new(1024);

        assert!(reader.exists(&dir.path().join("a.txt")).await);
        assert!(!reader.exists(&dir.path().join("docs")).await);
        assert!(!reader.exists(&dir.path().join("missing")).await);

        assert!(reader.is_directory(&dir.path().join("docs")).await);
        assert!(!reader.is_directory(&dir.path().join("a.txt")).await);
    }

    #[tokio::test]
    async fn test_read_size_and_mtime() {
        let dir = fixture();
        let reader = LocalFileReader::new(1024);
        let file = dir.path().join("a.txt");

        assert_eq!(reader.read_all(&file).await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(reader.size(&file).await.unwrap(), 5);
        let modified = reader.last_modified(&file).await.unwrap();
        assert!(modified <= Utc::now());
    }

    #[tokio::test]
    async fn test_errors_carry_path() {
        let dir = fixture();
        let reader = LocalFileReader::new(1024);
        let missing = dir.path().join("missing.txt");

        let err = reader.read_all(&missing).await.unwrap_err();
        assert!(matches!(err, OriginError::Io { .. }));
        assert!(matches!(
            reader.size(&dir.path().join("docs")).await,
            Err(OriginError::NotAFile(_))
        ));
    }

    #[test]
    fn test_can_buffer_threshold() {
        let reader = LocalFileReader::new(10);
        assert!(reader.can_buffer(10));
        assert!(!reader.can_buffer(11));
    }

    #[test]
    fn test_dot_path_default() {
        let reader = LocalFileReader::new(10);
        assert!(reader.is_dot_path("a/.git/config"));
        assert!(!reader.is_dot_path("a/b.txt"));
    }
}

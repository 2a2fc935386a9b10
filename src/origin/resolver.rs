//! Request resolution
//!
//! Turns a raw request path into a [`ResolvedFile`]:
//! 1. blank path: permanent redirect to `/`
//! 2. normalize (the raw path is not looked at again)
//! 3. reserved system prefix: built-in assets
//! 4. dot path: not found unless allowed
//! 5. regular file: cache, then disk; large files are streamed uncached
//! 6. directory: trailing-slash redirect, index file, or generated listing
//!
//! Collaborator failures end as "not found"; cache failures as misses.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::index::{HtmlIndexGenerator, IndexGenerator};
use super::reader::{FileReader, LocalFileReader};
use super::system::{BuiltinSystemFiles, SystemFileReader};
use crate::cache::{CacheError, CacheKey, CacheManager, CachedEntry};
use crate::cancel::Cancellation;
use crate::compression::{
    most_preferred, negotiate_entry, parse_accept_encoding, CompressionAlgorithm,
    CompressionConfig,
};
use crate::config::{Config, OriginConfig};
use crate::error::ResolveError;
use crate::mime::MimeType;
use crate::path;
use crate::security::{self, SecurityError};

/// A file too large to buffer; the transport streams it from `path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedFile {
    pub path: PathBuf,
    pub mime_type: MimeType,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
    /// Encoding of the file at `path` (a pre-compressed sidecar when not None)
    pub compression: CompressionAlgorithm,
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFile {
    /// Buffered body, possibly from the cache
    Regular(CachedEntry),
    Streamed(StreamedFile),
    Redirect { location: String, permanent: bool },
}

impl ResolvedFile {
    fn redirect(location: impl Into<String>) -> Self {
        ResolvedFile::Redirect {
            location: location.into(),
            permanent: true,
        }
    }
}

/// Resolves request paths against the data root
pub struct RequestResolver {
    config: OriginConfig,
    compression: CompressionConfig,
    cache: Arc<CacheManager>,
    reader: Arc<dyn FileReader>,
    index: Arc<dyn IndexGenerator>,
    system: Arc<dyn SystemFileReader>,
}

impl RequestResolver {
    /// Resolver with the local filesystem collaborators
    pub fn new(config: OriginConfig, cache: Arc<CacheManager>) -> Self {
        let reader = Arc::new(LocalFileReader::new(config.max_buffered_file_size));
        let index = Arc::new(HtmlIndexGenerator::new(
            &config.system_prefix,
            config.allow_dot_paths,
        ));
        Self {
            config,
            compression: CompressionConfig::default(),
            cache,
            reader,
            index,
            system: Arc::new(BuiltinSystemFiles::new()),
        }
    }

    /// Build the resolver and its cache from a full configuration
    pub fn from_config(config: &Config) -> Result<Self, CacheError> {
        let cache = Arc::new(CacheManager::from_config(&config.cache)?);
        Ok(Self::new(config.origin.clone(), cache).with_compression(config.compression.clone()))
    }

    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_reader(mut self, reader: Arc<dyn FileReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_index_generator(mut self, index: Arc<dyn IndexGenerator>) -> Self {
        self.index = index;
        self
    }

    pub fn with_system_files(mut self, system: Arc<dyn SystemFileReader>) -> Self {
        self.system = system;
        self
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Resolve `raw_path` and encode the result for `accept_encoding`
    ///
    /// Buffered bodies are negotiated in memory; streamed files switch to a
    /// pre-compressed sidecar when one exists for an accepted encoding.
    pub async fn serve(
        &self,
        raw_path: &str,
        accept_encoding: &str,
        cancel: &Cancellation,
    ) -> Result<Option<ResolvedFile>, ResolveError> {
        let resolved = self.resolve(raw_path, cancel).await?;
        let accepted = parse_accept_encoding(accept_encoding);

        match resolved {
            Some(ResolvedFile::Regular(entry)) => {
                match negotiate_entry(entry, &accepted, &self.compression) {
                    Ok(entry) => Ok(Some(ResolvedFile::Regular(entry))),
                    Err(e) => {
                        let path = security::sanitize_for_log(raw_path);
                        tracing::error!(path = %path, error = %e, "Failed to encode response body");
                        Err(ResolveError::Internal { path })
                    }
                }
            }
            Some(ResolvedFile::Streamed(file)) => {
                Ok(Some(ResolvedFile::Streamed(self.with_sidecar(file, &accepted).await)))
            }
            other => Ok(other),
        }
    }

    /// Resolve `raw_path` without content negotiation
    ///
    /// `Ok(None)` is "not found", which also covers refused paths.
    pub async fn resolve(
        &self,
        raw_path: &str,
        cancel: &Cancellation,
    ) -> Result<Option<ResolvedFile>, ResolveError> {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        if raw_path.trim().is_empty() {
            return Ok(Some(ResolvedFile::redirect("/")));
        }
        if let Err(e) = self.check_raw(raw_path) {
            tracing::debug!(error = %e, "Request path refused");
            return Ok(None);
        }

        let normalized = path::normalize(raw_path);
        if normalized.is_empty() {
            return Ok(Some(ResolvedFile::redirect("/")));
        }

        if let Some(name) = self.system_name(&normalized) {
            return Ok(self.system.resolve(name).map(ResolvedFile::Regular));
        }

        if let Err(e) = security::check_dot_path(&normalized, self.config.allow_dot_paths, |p| {
            self.reader.is_dot_path(p)
        }) {
            tracing::debug!(error = %e, "Request path refused");
            return Ok(None);
        }

        let absolute = self.absolute(&normalized);
        if self.reader.exists(&absolute).await {
            self.resolve_file(&normalized, &absolute, cancel).await
        } else if self.reader.is_directory(&absolute).await {
            self.resolve_directory(&normalized, &absolute, cancel).await
        } else {
            Ok(None)
        }
    }

    fn check_raw(&self, raw_path: &str) -> Result<(), SecurityError> {
        security::validate_path_length(raw_path, self.config.max_path_length)?;
        security::check_path_characters(raw_path)
    }

    /// Name inside the system namespace, if `normalized` is in it
    fn system_name<'a>(&self, normalized: &'a str) -> Option<&'a str> {
        let rest = normalized.strip_prefix(self.config.system_prefix.as_str())?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }

    fn absolute(&self, normalized: &str) -> PathBuf {
        self.config
            .data_root
            .join(normalized.trim_start_matches('/'))
    }

    async fn resolve_file(
        &self,
        normalized: &str,
        absolute: &Path,
        cancel: &Cancellation,
    ) -> Result<Option<ResolvedFile>, ResolveError> {
        let key = CacheKey::from_normalized(normalized);
        let Some(origin_modified) = self.origin_modified(absolute).await else {
            return Ok(None);
        };
        if let Some(entry) = self.fresh_entry(&key, origin_modified, cancel).await {
            return Ok(Some(ResolvedFile::Regular(entry)));
        }

        let size = match self.reader.size(absolute).await {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to stat origin file");
                return Ok(None);
            }
        };
        let mime_type = MimeType::from_path(absolute);
        if !self.reader.can_buffer(size) {
            return Ok(Some(ResolvedFile::Streamed(StreamedFile {
                path: absolute.to_path_buf(),
                mime_type,
                last_modified: origin_modified,
                size,
                compression: CompressionAlgorithm::None,
            })));
        }

        // A write racing the read must leave the entry stale.
        let filled_at = Utc::now();
        let content = match self.reader.read_all(absolute).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read origin file");
                return Ok(None);
            }
        };
        let entry = CachedEntry::new(content, mime_type, filled_at);
        self.store(&key, &entry, cancel).await?;
        Ok(Some(ResolvedFile::Regular(entry)))
    }

    async fn resolve_directory(
        &self,
        normalized: &str,
        absolute: &Path,
        cancel: &Cancellation,
    ) -> Result<Option<ResolvedFile>, ResolveError> {
        if !path::is_directory_path(normalized) {
            let location = format!("/{}/", normalized.trim_start_matches('/'));
            return Ok(Some(ResolvedFile::redirect(location)));
        }

        let index_path = absolute.join(&self.config.index_file);
        if self.reader.exists(&index_path).await {
            let index_normalized = format!("{}{}", normalized, self.config.index_file);
            return self.resolve_file(&index_normalized, &index_path, cancel).await;
        }

        let key = CacheKey::from_normalized(normalized);
        let Some(origin_modified) = self.origin_modified(absolute).await else {
            return Ok(None);
        };
        if let Some(entry) = self.fresh_entry(&key, origin_modified, cancel).await {
            return Ok(Some(ResolvedFile::Regular(entry)));
        }

        let relative = format!("/{}", normalized.trim_start_matches('/'));
        let filled_at = Utc::now();
        let Some(listing) = self.index.generate(absolute, &relative).await else {
            tracing::debug!(path = %security::sanitize_for_log(&relative), "Directory not accessible");
            return Ok(None);
        };

        let entry = CachedEntry::new(listing, MimeType::Html, filled_at);
        self.store(&key, &entry, cancel).await?;
        Ok(Some(ResolvedFile::Regular(entry)))
    }

    async fn origin_modified(&self, absolute: &Path) -> Option<DateTime<Utc>> {
        match self.reader.last_modified(absolute).await {
            Ok(modified) => Some(modified),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read origin modification time");
                None
            }
        }
    }

    /// Cached entry for `key` if it is newer than the origin copy
    ///
    /// A stale entry is invalidated.
    async fn fresh_entry(
        &self,
        key: &CacheKey,
        origin_modified: DateTime<Utc>,
        cancel: &Cancellation,
    ) -> Option<CachedEntry> {
        let entry = self.cache.get_entry(key, cancel).await?;
        if entry.is_fresh_against(origin_modified) {
            return Some(entry);
        }
        self.cache.invalidate(key, cancel).await;
        None
    }

    async fn store(
        &self,
        key: &CacheKey,
        entry: &CachedEntry,
        cancel: &Cancellation,
    ) -> Result<(), ResolveError> {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        self.cache.set_entry(key, entry, cancel).await;
        Ok(())
    }

    /// Point `file` at the best pre-compressed sidecar the client accepts
    async fn with_sidecar(
        &self,
        file: StreamedFile,
        accepted: &[CompressionAlgorithm],
    ) -> StreamedFile {
        if !self.compression.enabled {
            return file;
        }

        let mut available = Vec::new();
        for algorithm in accepted {
            if !self.compression.is_algorithm_enabled(*algorithm) {
                continue;
            }
            let sidecar = sidecar_path(&file.path, *algorithm);
            if self.reader.exists(&sidecar).await {
                available.push(*algorithm);
            }
        }

        let algorithm = most_preferred(
            self.compression.preference,
            available.iter().map(|algo| algo.wire_name()),
        );
        if algorithm.is_none() {
            return file;
        }

        let path = sidecar_path(&file.path, algorithm);
        match self.reader.size(&path).await {
            Ok(size) => StreamedFile {
                path,
                size,
                compression: algorithm,
                ..file
            },
            Err(e) => {
                tracing::debug!(error = %e, "Sidecar vanished, streaming original");
                file
            }
        }
    }
}

/// `<file><extension>`, e.g. `app.js.gz`
fn sidecar_path(file: &Path, algorithm: CompressionAlgorithm) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(algorithm.file_extension());
    PathBuf::from(name)
}

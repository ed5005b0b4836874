//! Per-provider page and metadata cache.
//!
//! Two artifacts are kept per `(provider, code)` below the library root:
//! - `cache/providers/<provider>/<CODE>.html`, the raw page as fetched
//! - `cache/providers/<provider>/<CODE>.json`, the parsed [`Metadata`]
//!
//! The cache is a convenience, not a source of truth: absence is never an
//! error, and a structured entry that no longer decodes is reported so the
//! caller can treat it as a miss and scrape again. A cache opened read-only
//! (every dry-run) rejects writes before anything reaches the disk.

pub mod error;
mod models;

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ErrorKind, Result};
use crate::models::MetadataRecord;
use avmc_extract::{Code, Metadata};
use avmc_storage::BackendHandle;
use avmc_storage::backend::ReadOnlyBackend;
use avmc_storage::error::ErrorKind as StorageErrorKind;
use exn::ResultExt;
use facet_json::{from_str as from_json, to_string as to_json};
use tracing::instrument;

const CACHE_DIR: &str = "cache/providers";

#[derive(Clone, Copy)]
enum Artifact {
    Document,
    Structured,
}
impl Artifact {
    fn extension(self) -> &'static str {
        match self {
            Self::Document => "html",
            Self::Structured => "json",
        }
    }
}

/// Lowercased, trimmed provider name, usable as a directory name.
pub fn normalize_provider(name: &str) -> Result<String> {
    let name = name.trim().to_lowercase();
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        exn::bail!(ErrorKind::InvalidProvider(name));
    }
    Ok(name)
}

#[derive(Clone)]
pub struct ProviderCache {
    backend: BackendHandle,
    read_only: bool,
}
impl ProviderCache {
    /// `backend` must be rooted at the library root. When `read_only` is set
    /// the backend is wrapped so that no write can get through even if the
    /// check below were bypassed.
    pub fn new(backend: BackendHandle, read_only: bool) -> Self {
        let backend = match read_only {
            true => Arc::new(ReadOnlyBackend::new(backend)) as BackendHandle,
            false => backend,
        };
        Self { backend, read_only }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn path(provider: &str, code: &Code, artifact: Artifact) -> Result<PathBuf> {
        let provider = normalize_provider(provider)?;
        Ok(PathBuf::from(CACHE_DIR)
            .join(provider)
            .join(format!("{}.{}", code.as_str(), artifact.extension())))
    }

    async fn read(&self, provider: &str, code: &Code, artifact: Artifact) -> Result<Option<Vec<u8>>> {
        let path = Self::path(provider, code, artifact)?;
        match self.backend.read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => Ok(None),
            Err(err) => Err(err).or_raise(|| ErrorKind::Storage),
        }
    }

    async fn write(&self, provider: &str, code: &Code, artifact: Artifact, data: &[u8]) -> Result<()> {
        if self.read_only {
            exn::bail!(ErrorKind::ReadOnly);
        }
        let path = Self::path(provider, code, artifact)?;
        self.backend.write(&path, data).await.or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(provider, code = %code, path = %path.display(), bytes = data.len(), "Cache entry written");
        Ok(())
    }

    pub async fn write_document(&self, provider: &str, code: &Code, html: &[u8]) -> Result<()> {
        self.write(provider, code, Artifact::Document, html).await
    }

    async fn read_structured(&self, provider: &str, code: &Code) -> Result<Option<Vec<u8>>> {
        self.read(provider, code, Artifact::Structured).await
    }

    async fn write_structured(&self, provider: &str, code: &Code, json: &[u8]) -> Result<()> {
        self.write(provider, code, Artifact::Structured, json).await
    }

    /// Decoded structured entry. An entry that exists but doesn't decode (or
    /// describes a different code) is [`InvalidData`](ErrorKind::InvalidData).
    #[instrument(skip(self), fields(code = %code))]
    pub async fn read_metadata(&self, provider: &str, code: &Code) -> Result<Option<Metadata>> {
        let Some(raw) = self.read_structured(provider, code).await? else {
            return Ok(None);
        };
        let text = std::str::from_utf8(&raw).or_raise(|| ErrorKind::InvalidData("utf-8"))?;
        let record = from_json::<MetadataRecord>(text).or_raise(|| ErrorKind::InvalidData("json"))?;
        let meta = Metadata::try_from(record)?;
        if &meta.code != code {
            exn::bail!(ErrorKind::InvalidData("code"));
        }
        Ok(Some(meta))
    }

    pub async fn write_metadata(&self, provider: &str, meta: &Metadata) -> Result<()> {
        let json = to_json(&MetadataRecord::from(meta)).or_raise(|| ErrorKind::InvalidData("metadata"))?;
        self.write_structured(provider, &meta.code, json.as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avmc_storage::backend::LocalBackend;
    use rstest::rstest;

    fn code() -> Code {
        Code::parse("ABC-123").unwrap()
    }

    fn cache(root: &std::path::Path, read_only: bool) -> ProviderCache {
        ProviderCache::new(Arc::new(LocalBackend::new("library", root).unwrap()), read_only)
    }

    fn metadata() -> Metadata {
        let mut meta = Metadata::new(code());
        meta.title = "Title".to_string();
        meta.actors = vec!["Actor One".to_string()];
        meta.runtime_minutes = Some(120);
        meta
    }

    #[rstest]
    #[case("javbus", "javbus")]
    #[case("  JavDB ", "javdb")]
    #[case("my_source2", "my_source2")]
    fn test_normalize_provider(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_provider(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("java-bus")]
    #[case("../etc")]
    #[case("jav bus")]
    fn test_normalize_provider_rejects(#[case] input: &str) {
        let err = normalize_provider(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidProvider(_)));
    }

    #[tokio::test]
    async fn test_round_trip_and_layout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = cache(temp_dir.path(), false);
        assert_eq!(cache.read_metadata("javbus", &code()).await.unwrap(), None);

        cache.write_document("JavBus", &code(), b"<html></html>").await.unwrap();
        cache.write_metadata("javbus", &metadata()).await.unwrap();

        assert!(temp_dir.path().join("cache/providers/javbus/ABC-123.html").is_file());
        assert!(temp_dir.path().join("cache/providers/javbus/ABC-123.json").is_file());
        assert_eq!(std::fs::read(temp_dir.path().join("cache/providers/javbus/ABC-123.html")).unwrap(), b"<html></html>");
        assert_eq!(cache.read_metadata("javbus", &code()).await.unwrap(), Some(metadata()));
        // Entries are per provider.
        assert_eq!(cache.read_metadata("javdb", &code()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes_without_touching_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = cache(temp_dir.path(), true);
        let err = cache.write_document("javbus", &code(), b"x").await.unwrap_err();
        assert_eq!(*err, ErrorKind::ReadOnly);
        let err = cache.write_metadata("javbus", &metadata()).await.unwrap_err();
        assert_eq!(*err, ErrorKind::ReadOnly);
        assert!(!temp_dir.path().join("cache").exists());
    }

    #[tokio::test]
    async fn test_read_only_still_reads() {
        let temp_dir = tempfile::tempdir().unwrap();
        cache(temp_dir.path(), false).write_metadata("javdb", &metadata()).await.unwrap();
        let ro = cache(temp_dir.path(), true);
        assert_eq!(ro.read_metadata("javdb", &code()).await.unwrap(), Some(metadata()));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_invalid_data() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = cache(temp_dir.path(), false);
        cache.write_structured("javbus", &code(), b"{not json").await.unwrap();
        let err = cache.read_metadata("javbus", &code()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData(_)));
    }
}

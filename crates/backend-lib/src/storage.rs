// ============================
// livepad-backend-lib/src/storage.rs
// ============================
//! Storage abstraction with flat-file and in-memory implementations.
use std::{fs, io::Write, path::{Path, PathBuf}, sync::Arc};
use async_trait::async_trait;
use base64::{engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD}, Engine as _};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::fs as tokio_fs;

use crate::error::StorageError;

/// One persisted document: the codec blob plus its update time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: String,
    pub content: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

/// Trait for storage backends
///
/// Backends offer point lookup plus idempotent upsert and delete by key.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the record stored under `id`
    async fn fetch(&self, id: &str) -> Result<Option<StoredDocument>, StorageError>;

    /// Insert or replace the record for `document.id`
    async fn upsert(&self, document: StoredDocument) -> Result<(), StorageError>;

    /// Remove the record for `id`; removing a missing record is not an error
    async fn remove(&self, id: &str) -> Result<(), StorageError>;

    /// Release any held resources
    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// On-disk layout of a record
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileRecord {
    id: String,
    /// Base64 of the codec blob
    content: String,
    updated_at: DateTime<Utc>,
}

/// Flat-file implementation of the Storage trait
///
/// Each document lives in `<root>/documents/<base64url(id)>.json`; writes go
/// to a temporary file in the same directory and are renamed into place.
#[derive(Clone, Debug)]
pub struct FlatFileStorage {
    root: PathBuf,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("documents"))?;
        Ok(Self { root })
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.root
            .join("documents")
            .join(format!("{}.json", URL_SAFE_NO_PAD.encode(id)))
    }
}

#[async_trait]
impl Storage for FlatFileStorage {
    async fn fetch(&self, id: &str) -> Result<Option<StoredDocument>, StorageError> {
        let path = self.document_path(id);

        let raw = match tokio_fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: FileRecord = serde_json::from_slice(&raw)?;
        Ok(Some(StoredDocument {
            id: record.id,
            content: STANDARD.decode(record.content)?,
            updated_at: record.updated_at,
        }))
    }

    async fn upsert(&self, document: StoredDocument) -> Result<(), StorageError> {
        let path = self.document_path(&document.id);
        let record = FileRecord {
            id: document.id,
            content: STANDARD.encode(&document.content),
            updated_at: document.updated_at,
        };
        let json = serde_json::to_vec(&record)?;

        // tempfile + rename is blocking filesystem work
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let dir = path.parent().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "document path has no parent")
            })?;
            let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
            tmp.write_all(&json)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| StorageError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
    }

    async fn remove(&self, id: &str) -> Result<(), StorageError> {
        match tokio_fs::remove_file(self.document_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "flat-file"
    }
}

/// Volatile in-process store
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    documents: Arc<DashMap<String, StoredDocument>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn fetch(&self, id: &str) -> Result<Option<StoredDocument>, StorageError> {
        Ok(self.documents.get(id).map(|doc| doc.clone()))
    }

    async fn upsert(&self, document: StoredDocument) -> Result<(), StorageError> {
        self.documents.insert(document.id.clone(), document);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), StorageError> {
        self.documents.remove(id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn document(id: &str, content: &[u8]) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            content: content.to_vec(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_flat_file_upsert_and_fetch() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FlatFileStorage::new(temp_dir.path()).unwrap();

        assert!(storage.fetch("doc1").await.unwrap().is_none());

        let doc = document("doc1", &[0, 159, 146, 150]);
        storage.upsert(doc.clone()).await.unwrap();
        assert_eq!(storage.fetch("doc1").await.unwrap(), Some(doc));

        // Upsert replaces, no history
        let newer = document("doc1", b"second");
        storage.upsert(newer.clone()).await.unwrap();
        assert_eq!(storage.fetch("doc1").await.unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn test_flat_file_opaque_ids() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FlatFileStorage::new(temp_dir.path()).unwrap();

        for id in ["../escape", "a/b\\c", "spaces and : colons", "日本"] {
            storage.upsert(document(id, id.as_bytes())).await.unwrap();
            let fetched = storage.fetch(id).await.unwrap().unwrap();
            assert_eq!(fetched.id, id);
            assert_eq!(fetched.content, id.as_bytes());
        }

        let files = fs::read_dir(temp_dir.path().join("documents")).unwrap().count();
        assert_eq!(files, 4);
    }

    #[tokio::test]
    async fn test_flat_file_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FlatFileStorage::new(temp_dir.path()).unwrap();

        storage.upsert(document("doc1", b"x")).await.unwrap();
        storage.remove("doc1").await.unwrap();
        storage.remove("doc1").await.unwrap();
        storage.remove("never-existed").await.unwrap();
        assert!(storage.fetch("doc1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flat_file_corrupt_record() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FlatFileStorage::new(temp_dir.path()).unwrap();

        fs::write(storage.document_path("doc1"), b"{not json").unwrap();
        assert!(matches!(
            storage.fetch("doc1").await,
            Err(StorageError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty());

        storage.upsert(document("a", b"1")).await.unwrap();
        assert!(storage.contains("a"));
        assert_eq!(storage.fetch("a").await.unwrap().unwrap().content, b"1");

        storage.remove("a").await.unwrap();
        storage.remove("a").await.unwrap();
        assert!(storage.fetch("a").await.unwrap().is_none());
        assert_eq!(storage.len(), 0);
    }
}

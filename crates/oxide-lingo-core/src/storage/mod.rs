//! Storage layer for per-user line records
//!
//! A [`RecordStore`] keeps one collection of text lines per user and can only
//! read the whole collection or replace it atomically. [`VocabularyStore`]
//! builds the vocabulary semantics on top of it.

mod vocabulary;

pub use vocabulary::{VocabularyEntry, VocabularyStore, FIELD_SEPARATOR};

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Storage location cannot hold records (e.g. path is not a directory)
    #[error("Corrupt storage: {0}")]
    Corrupt(String),
}

/// Interface for line-record persistence, addressed by user ID
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read every line of a user's collection. A missing collection is empty.
    async fn read_lines(&self, user_id: i64) -> Result<Vec<String>, PersistenceError>;
    /// Replace the whole collection. Readers see either the old or the new lines.
    async fn replace_lines(&self, user_id: i64, lines: &[String]) -> Result<(), PersistenceError>;
}

/// File-backed record store: one `{user_id}.txt` per user
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    directory: PathBuf,
}

impl FileRecordStore {
    /// Create a store rooted at `directory`. The directory is created on first write.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Root directory of the store
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_path(&self, user_id: i64) -> PathBuf {
        self.directory.join(format!("{user_id}.txt"))
    }

    async fn ensure_directory(&self) -> Result<(), PersistenceError> {
        match tokio::fs::metadata(&self.directory).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(PersistenceError::Corrupt(format!(
                "{} is not a directory",
                self.directory.display()
            ))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&self.directory).await?;
                info!("Created vocabulary directory {}", self.directory.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn read_lines(&self, user_id: i64) -> Result<Vec<String>, PersistenceError> {
        match tokio::fs::read_to_string(self.file_path(user_id)).await {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace_lines(&self, user_id: i64, lines: &[String]) -> Result<(), PersistenceError> {
        self.ensure_directory().await?;

        let target = self.file_path(user_id);
        let staging = self.directory.join(format!("{user_id}.txt.tmp"));

        let mut body = lines.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }

        // Write-then-rename keeps the previous file intact if the write fails
        if let Err(e) = tokio::fs::write(&staging, body.as_bytes()).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        tokio::fs::rename(&staging, &target).await?;

        debug!(
            "Replaced {} with {} records",
            target.display(),
            lines.len()
        );
        Ok(())
    }
}

/// In-memory record store, for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    collections: Mutex<HashMap<i64, Vec<String>>>,
}

impl MemoryRecordStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn read_lines(&self, user_id: i64) -> Result<Vec<String>, PersistenceError> {
        let collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(collections.get(&user_id).cloned().unwrap_or_default())
    }

    async fn replace_lines(&self, user_id: i64, lines: &[String]) -> Result<(), PersistenceError> {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        collections.insert(user_id, lines.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_missing_collection_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileRecordStore::new(dir.path().join("nested"));

        let lines = store.read_lines(42).await.expect("read");
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_replace_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileRecordStore::new(dir.path().join("vocab"));

        let lines = vec!["a".to_string(), "b".to_string()];
        store.replace_lines(7, &lines).await.expect("write");
        assert_eq!(store.read_lines(7).await.expect("read"), lines);

        store.replace_lines(7, &[]).await.expect("clear");
        assert!(store.read_lines(7).await.expect("read").is_empty());

        // No staging file left behind
        assert!(!dir.path().join("vocab").join("7.txt.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_users_are_separate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileRecordStore::new(dir.path());

        store
            .replace_lines(1, &["one".to_string()])
            .await
            .expect("write");
        assert!(store.read_lines(2).await.expect("read").is_empty());
        assert!(dir.path().join("1.txt").exists());
    }

    #[tokio::test]
    async fn test_file_store_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("occupied");
        std::fs::write(&root, "not a directory").expect("setup");

        let store = FileRecordStore::new(&root);
        let result = store.replace_lines(1, &["x".to_string()]).await;
        assert!(matches!(result, Err(PersistenceError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryRecordStore::new();
        store
            .replace_lines(3, &["line".to_string()])
            .await
            .expect("write");
        assert_eq!(store.read_lines(3).await.expect("read"), vec!["line"]);
        assert!(store.read_lines(4).await.expect("read").is_empty());
    }
}

//! Challenge persistence.
//!
//! A challenge is a record (key → blob name) plus its PNG blob. Records live
//! in Redis or in memory; blobs live on the filesystem or in memory.

use async_trait::async_trait;
use humancheck_common::constants::IMAGE_UPLOAD_DIR;
use humancheck_common::{ChallengeRecord, HumanCheckError};
use std::sync::Arc;

mod blob;
mod memory;
mod redis_store;

pub use blob::FsBlobStorage;
pub use memory::{MemoryBlobStorage, MemoryChallengeRecords};
pub use redis_store::RedisChallengeRecords;

/// Map a Redis failure into the storage error variant
pub fn redis_error(err: redis::RedisError) -> HumanCheckError {
    HumanCheckError::Storage(format!("redis: {err}"))
}

/// Challenge record table
#[async_trait]
pub trait ChallengeRecords: Send + Sync {
    /// Insert unless the key exists; `false` on conflict
    async fn insert(&self, record: &ChallengeRecord) -> Result<bool, HumanCheckError>;

    async fn get(&self, key: &str) -> Result<Option<ChallengeRecord>, HumanCheckError>;

    /// Remove the record; `true` only for the call that actually removed it
    async fn remove(&self, key: &str) -> Result<bool, HumanCheckError>;

    async fn ping(&self) -> Result<(), HumanCheckError>;
}

/// Image blob storage
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), HumanCheckError>;

    /// Blob contents, or `None` if missing
    async fn open(&self, name: &str) -> Result<Option<Vec<u8>>, HumanCheckError>;

    /// Delete the blob; `false` if it was already gone
    async fn delete(&self, name: &str) -> Result<bool, HumanCheckError>;
}

/// Challenge store combining records and their image blobs
#[derive(Clone)]
pub struct ChallengeStore {
    records: Arc<dyn ChallengeRecords>,
    blobs: Arc<dyn BlobStorage>,
}

impl ChallengeStore {
    pub fn new(records: Arc<dyn ChallengeRecords>, blobs: Arc<dyn BlobStorage>) -> Self {
        Self { records, blobs }
    }

    /// Fully in-memory store
    pub fn memory() -> Self {
        Self::new(
            Arc::new(MemoryChallengeRecords::new()),
            Arc::new(MemoryBlobStorage::new()),
        )
    }

    /// Persist a new challenge.
    ///
    /// Fails with `KeyConflict` if the key is already taken; the blob written
    /// for this call is removed again in that case.
    pub async fn create(&self, key: &str, png: Vec<u8>) -> Result<ChallengeRecord, HumanCheckError> {
        let image = format!("{IMAGE_UPLOAD_DIR}/{}.png", uuid::Uuid::new_v4().simple());
        self.blobs.save(&image, &png).await?;

        let record = ChallengeRecord::new(key.to_string(), image);
        match self.records.insert(&record).await {
            Ok(true) => Ok(record),
            Ok(false) => {
                self.discard_blob(&record.image).await;
                tracing::error!(key = %key, "Challenge key conflict on insert");
                Err(HumanCheckError::KeyConflict(key.to_string()))
            }
            Err(e) => {
                self.discard_blob(&record.image).await;
                Err(e)
            }
        }
    }

    pub async fn get(&self, key: &str) -> Result<ChallengeRecord, HumanCheckError> {
        self.records.get(key).await?.ok_or(HumanCheckError::NotFound)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, HumanCheckError> {
        Ok(self.records.get(key).await?.is_some())
    }

    /// Remove a challenge and its blob. Missing pieces are skipped, so
    /// deleting twice is fine.
    pub async fn delete(&self, record: &ChallengeRecord) -> Result<(), HumanCheckError> {
        self.records.remove(&record.key).await?;
        if !self.blobs.delete(&record.image).await? {
            tracing::debug!(image = %record.image, "Challenge image already gone");
        }
        Ok(())
    }

    /// Fetch a challenge's image and consume the challenge.
    ///
    /// Of several concurrent callers for one key, exactly one gets the image;
    /// the others see `NotFound`.
    pub async fn take(&self, key: &str) -> Result<(ChallengeRecord, Vec<u8>), HumanCheckError> {
        let record = self.get(key).await?;

        if !self.records.remove(key).await? {
            return Err(HumanCheckError::NotFound);
        }

        let png = self.blobs.open(&record.image).await;
        self.discard_blob(&record.image).await;

        match png? {
            Some(png) => Ok((record, png)),
            None => {
                tracing::warn!(image = %record.image, "Challenge image missing from storage");
                Err(HumanCheckError::NotFound)
            }
        }
    }

    pub async fn ping(&self) -> Result<(), HumanCheckError> {
        self.records.ping().await
    }

    async fn discard_blob(&self, name: &str) {
        if let Err(e) = self.blobs.delete(name).await {
            tracing::warn!(image = %name, error = %e, "Failed to remove challenge image");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    fn fs_store(root: &std::path::Path) -> (ChallengeStore, Arc<FsBlobStorage>) {
        let blobs = Arc::new(FsBlobStorage::new(root));
        let store = ChallengeStore::new(Arc::new(MemoryChallengeRecords::new()), blobs.clone());
        (store, blobs)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = ChallengeStore::memory();
        let record = store.create("key-1", PNG.to_vec()).await.unwrap();

        assert_eq!(store.get("key-1").await.unwrap(), record);
        assert!(store.exists("key-1").await.unwrap());
        assert!(record.image.starts_with("captcha/"));
        assert!(record.image.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = ChallengeStore::memory();
        assert!(matches!(store.get("nope").await, Err(HumanCheckError::NotFound)));
        assert!(!store.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_key_conflicts_and_keeps_original() {
        let store = ChallengeStore::memory();
        let original = store.create("key-1", PNG.to_vec()).await.unwrap();

        let result = store.create("key-1", b"other".to_vec()).await;
        assert!(matches!(result, Err(HumanCheckError::KeyConflict(ref k)) if k == "key-1"));

        let (record, png) = store.take("key-1").await.unwrap();
        assert_eq!(record, original);
        assert_eq!(png, PNG);
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        let store = ChallengeStore::memory();
        store.create("key-1", PNG.to_vec()).await.unwrap();

        let (_, png) = store.take("key-1").await.unwrap();
        assert_eq!(png, PNG);
        assert!(matches!(store.take("key-1").await, Err(HumanCheckError::NotFound)));
        assert!(!store.exists("key-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_take_has_one_winner() {
        let store = ChallengeStore::memory();
        store.create("key-1", PNG.to_vec()).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move { store.take("key-1").await }));
        }

        let mut winners = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => winners += 1,
                Err(HumanCheckError::NotFound) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = fs_store(dir.path());

        let record = store.create("key-1", PNG.to_vec()).await.unwrap();
        let path = dir.path().join(&record.image);
        assert!(path.is_file());

        store.delete(&record).await.unwrap();
        assert!(!path.exists());
        assert!(!store.exists("key-1").await.unwrap());

        // Second delete finds nothing and still succeeds
        store.delete(&record).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = fs_store(dir.path());

        let record = store.create("key-1", PNG.to_vec()).await.unwrap();
        std::fs::remove_file(dir.path().join(&record.image)).unwrap();

        store.delete(&record).await.unwrap();
        assert!(!store.exists("key-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_take_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = fs_store(dir.path());

        let record = store.create("key-1", PNG.to_vec()).await.unwrap();
        let (_, png) = store.take("key-1").await.unwrap();

        assert_eq!(png, PNG);
        assert!(!dir.path().join(&record.image).exists());
    }

    #[tokio::test]
    async fn test_blob_names_do_not_leak_keys() {
        let store = ChallengeStore::memory();
        let mut names = HashSet::new();
        for i in 0..20 {
            let key = format!("key-{i}");
            let record = store.create(&key, PNG.to_vec()).await.unwrap();
            assert!(!record.image.contains(&key));
            assert!(names.insert(record.image));
        }
    }
}

//! In-memory challenge records and blobs.

use async_trait::async_trait;
use humancheck_common::{ChallengeRecord, HumanCheckError};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::RwLock;

use super::{BlobStorage, ChallengeRecords};

#[derive(Default)]
pub struct MemoryChallengeRecords {
    records: RwLock<HashMap<String, ChallengeRecord>>,
}

impl MemoryChallengeRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ChallengeRecords for MemoryChallengeRecords {
    async fn insert(&self, record: &ChallengeRecord) -> Result<bool, HumanCheckError> {
        match self.records.write().await.entry(record.key.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<ChallengeRecord>, HumanCheckError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<bool, HumanCheckError> {
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn ping(&self) -> Result<(), HumanCheckError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlobStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), HumanCheckError> {
        self.blobs
            .write()
            .await
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn open(&self, name: &str) -> Result<Option<Vec<u8>>, HumanCheckError> {
        Ok(self.blobs.read().await.get(name).cloned())
    }

    async fn delete(&self, name: &str) -> Result<bool, HumanCheckError> {
        Ok(self.blobs.write().await.remove(name).is_some())
    }
}

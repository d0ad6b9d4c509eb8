//! Redis-backed challenge records.
//!
//! Records are JSON under `humancheck:challenge:{key}` without expiry.
//! Insert uses `SET NX`; the reply count of `DEL` decides which caller
//! consumed a record.

use async_trait::async_trait;
use humancheck_common::constants::redis_keys::CHALLENGE_PREFIX;
use humancheck_common::{ChallengeRecord, HumanCheckError};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{ChallengeRecords, redis_error};

pub struct RedisChallengeRecords {
    redis: ConnectionManager,
}

impl RedisChallengeRecords {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

fn record_key(key: &str) -> String {
    format!("{CHALLENGE_PREFIX}{key}")
}

#[async_trait]
impl ChallengeRecords for RedisChallengeRecords {
    async fn insert(&self, record: &ChallengeRecord) -> Result<bool, HumanCheckError> {
        let value = serde_json::to_string(record)
            .map_err(|e| HumanCheckError::Internal(e.to_string()))?;
        let mut conn = self.redis.clone();

        conn.set_nx(record_key(&record.key), value)
            .await
            .map_err(redis_error)
    }

    async fn get(&self, key: &str) -> Result<Option<ChallengeRecord>, HumanCheckError> {
        let mut conn = self.redis.clone();
        let stored: Option<String> = conn.get(record_key(key)).await.map_err(redis_error)?;

        stored
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| HumanCheckError::Storage(format!("corrupt challenge record: {e}")))
    }

    async fn remove(&self, key: &str) -> Result<bool, HumanCheckError> {
        let mut conn = self.redis.clone();
        let removed: u32 = conn.del(record_key(key)).await.map_err(redis_error)?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<(), HumanCheckError> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_layout() {
        assert_eq!(record_key("abc"), "humancheck:challenge:abc");
    }
}

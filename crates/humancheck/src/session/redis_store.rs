//! Redis-backed session store: one hash per session with a sliding TTL.

use async_trait::async_trait;
use humancheck_common::HumanCheckError;
use humancheck_common::constants::redis_keys::SESSION_PREFIX;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;

use super::{Session, SessionStore};
use crate::store::redis_error;

pub struct RedisSessionStore {
    redis: ConnectionManager,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

fn session_key(id: &str) -> String {
    format!("{SESSION_PREFIX}{id}")
}

/// Replace the session hash in one transaction.
///
/// `HMSET` rejects an empty field list, so an empty session is only deleted.
fn save_pipeline(session: &Session, ttl_secs: u64) -> redis::Pipeline {
    let key = session_key(session.id());
    let fields: Vec<(&String, &String)> = session.data().iter().collect();

    let mut pipe = redis::pipe();
    pipe.atomic().del(&key).ignore();
    if !fields.is_empty() {
        pipe.hset_multiple(&key, &fields)
            .ignore()
            .expire(&key, ttl_secs as i64)
            .ignore();
    }
    pipe
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, id: &str) -> Result<Option<HashMap<String, String>>, HumanCheckError> {
        let key = session_key(id);
        let mut conn = self.redis.clone();

        let data: HashMap<String, String> = conn.hgetall(&key).await.map_err(redis_error)?;

        // HGETALL on a missing key is an empty map
        if data.is_empty() {
            Ok(None)
        } else {
            Ok(Some(data))
        }
    }

    async fn save(&self, session: &Session, ttl_secs: u64) -> Result<(), HumanCheckError> {
        let mut conn = self.redis.clone();
        let pipe = save_pipeline(session, ttl_secs);

        let _: () = pipe.query_async(&mut conn).await.map_err(redis_error)?;

        tracing::debug!(fields = session.data().len(), ttl_secs, "Session saved");
        Ok(())
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

    fn packed(pipe: &redis::Pipeline) -> String {
        String::from_utf8_lossy(&pipe.get_packed_pipeline()).into_owned()
    }

    #[test]
    fn test_empty_session_is_only_deleted() {
        let session = Session::new();
        let commands = packed(&save_pipeline(&session, 60));

        assert!(commands.contains("MULTI"));
        assert!(commands.contains("DEL"));
        assert!(commands.contains(&session_key(session.id())));
        assert!(!commands.contains("HMSET"));
        assert!(!commands.contains("EXPIRE"));
    }

    #[test]
    fn test_session_fields_are_written_with_ttl() {
        let mut session = Session::new();
        session.insert("HumanCheckabc".into(), "deadbeef".into());
        let commands = packed(&save_pipeline(&session, 1_209_600));

        assert!(commands.contains("HMSET"));
        assert!(commands.contains("HumanCheckabc"));
        assert!(commands.contains("deadbeef"));
        assert!(commands.contains("EXPIRE"));
        assert!(commands.contains("1209600"));
    }

    #[test]
    fn test_session_key_layout() {
        assert_eq!(session_key("abc"), "humancheck:session:abc");
    }
}

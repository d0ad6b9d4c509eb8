//! In-process session store for development and tests.
//!
//! Entries never expire; the process lifetime bounds them.

use async_trait::async_trait;
use humancheck_common::HumanCheckError;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Session, SessionStore};

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<HashMap<String, String>>, HumanCheckError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn save(&self, session: &Session, _ttl_secs: u64) -> Result<(), HumanCheckError> {
        self.sessions
            .write()
            .await
            .insert(session.id().to_string(), session.data().clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), HumanCheckError> {
        Ok(())
    }
}

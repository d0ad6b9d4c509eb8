//! Cookie-identified session state.
//!
//! Handlers load a [`Session`] through the [`SessionManager`], pass it
//! explicitly to the CAPTCHA field, and save it back before responding.

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use humancheck_common::HumanCheckError;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use time::Duration;

mod memory;
mod redis_store;

pub use memory::MemorySessionStore;
pub use redis_store::RedisSessionStore;

use crate::config::SessionConfig;

/// A string map scoped to one client
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    data: HashMap<String, String>,
    modified: bool,
}

impl Session {
    /// Empty session with a fresh random id
    pub fn new() -> Self {
        Self {
            id: generate_session_id(),
            data: HashMap::new(),
            modified: false,
        }
    }

    /// Session restored from storage
    pub fn from_parts(id: String, data: HashMap<String, String>) -> Self {
        Self {
            id,
            data,
            modified: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &HashMap<String, String> {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.data.insert(key, value);
        self.modified = true;
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a cryptographically random session ID
fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Session persistence backend
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stored data for `id`, or `None` if unknown or expired
    async fn load(&self, id: &str) -> Result<Option<HashMap<String, String>>, HumanCheckError>;

    /// Replace the stored data for the session, refreshing its lifetime
    async fn save(&self, session: &Session, ttl_secs: u64) -> Result<(), HumanCheckError>;

    /// Backend health check
    async fn ping(&self) -> Result<(), HumanCheckError>;
}

/// Loads and saves sessions, and builds their cookies
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    /// Session for the given cookie value; unknown ids get a fresh session
    pub async fn load(&self, cookie: Option<&str>) -> Result<Session, HumanCheckError> {
        let Some(id) = cookie.filter(|id| is_valid_session_id(id)) else {
            return Ok(Session::new());
        };

        match self.store.load(id).await? {
            Some(data) => Ok(Session::from_parts(id.to_string(), data)),
            None => {
                tracing::debug!("Unknown or expired session, starting a new one");
                Ok(Session::new())
            }
        }
    }

    /// Persist the session if it changed
    pub async fn save(&self, session: &Session) -> Result<(), HumanCheckError> {
        if session.is_modified() {
            self.store.save(session, self.config.ttl_secs).await?;
        }
        Ok(())
    }

    pub fn cookie(&self, session: &Session) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), session.id().to_string()))
            .path("/")
            .http_only(true)
            .secure(self.config.secure_cookie)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(self.config.ttl_secs as i64))
            .build()
    }

    pub async fn ping(&self) -> Result<(), HumanCheckError> {
        self.store.ping().await
    }
}

/// Ids are URL-safe base64 of 32 bytes
fn is_valid_session_id(id: &str) -> bool {
    id.len() == 43 && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

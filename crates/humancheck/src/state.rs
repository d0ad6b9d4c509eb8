//! Application state and shared resources.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::captcha::{CaptchaGenerator, ChallengeField, ChallengeMinter, SolutionCodec};
use crate::config::{AppConfig, Backend};
use crate::session::{MemorySessionStore, RedisSessionStore, SessionManager, SessionStore};
use crate::store::{ChallengeStore, FsBlobStorage, RedisChallengeRecords};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Challenge records and images
    pub store: ChallengeStore,

    /// Cookie sessions
    pub sessions: SessionManager,

    /// The CAPTCHA form field served by this instance
    pub field: Arc<ChallengeField>,
}

impl AppState {
    /// Create application state, connecting to the configured backend
    pub async fn new(config: AppConfig) -> Result<Self> {
        let generator = CaptchaGenerator::from_config(&config.captcha)
            .context("Failed to initialize CAPTCHA generator")?;

        let (store, session_store): (ChallengeStore, Arc<dyn SessionStore>) = match config.backend {
            Backend::Redis => {
                // Connection manager reconnects on its own
                let client = redis::Client::open(config.redis_url.as_str())
                    .context("Failed to create Redis client")?;
                let redis = ConnectionManager::new(client)
                    .await
                    .context("Failed to connect to Redis")?;

                let store = ChallengeStore::new(
                    Arc::new(RedisChallengeRecords::new(redis.clone())),
                    Arc::new(FsBlobStorage::new(&config.media_root)),
                );
                let sessions: Arc<dyn SessionStore> = Arc::new(RedisSessionStore::new(redis));
                (store, sessions)
            }
            Backend::Memory => {
                tracing::warn!("Using in-memory backend; state is lost on restart");
                let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
                (ChallengeStore::memory(), sessions)
            }
        };

        Ok(Self::assemble(&config, generator, store, session_store))
    }

    /// In-memory state with the bundled faces
    pub fn in_memory(config: AppConfig) -> Self {
        Self::assemble(
            &config,
            CaptchaGenerator::bundled(),
            ChallengeStore::memory(),
            Arc::new(MemorySessionStore::new()),
        )
    }

    fn assemble(
        config: &AppConfig,
        generator: CaptchaGenerator,
        store: ChallengeStore,
        session_store: Arc<dyn SessionStore>,
    ) -> Self {
        let codec = SolutionCodec::new(config.secret_or_random());
        let minter = Arc::new(ChallengeMinter::new(
            codec,
            Arc::new(generator),
            store.clone(),
            config.captcha.max_mint_attempts,
        ));

        let name = config.captcha.field_name.clone();
        let field = match &config.captcha.field_salt {
            Some(salt) => ChallengeField::with_salt(name, salt.clone(), minter),
            None => ChallengeField::new(name, minter),
        };

        let sessions = SessionManager::new(session_store, config.session.clone());

        Self {
            store,
            sessions,
            field: Arc::new(field),
        }
    }

    /// Check every backend the service depends on
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await.context("Challenge store unavailable")?;
        self.sessions.ping().await.context("Session store unavailable")?;
        Ok(())
    }
}

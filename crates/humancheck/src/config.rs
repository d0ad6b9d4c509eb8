//! Configuration management for HumanCheck.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use humancheck_common::constants::{
    DEFAULT_FIELD_NAME, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_MINT_ATTEMPTS, DEFAULT_MEDIA_ROOT,
    DEFAULT_REDIS_URL, DEFAULT_SESSION_COOKIE, DEFAULT_SESSION_TTL_SECS,
};

/// Where challenge records, images, and sessions are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Records and sessions in Redis, images under `media_root`
    Redis,
    /// Everything in process memory (development only)
    Memory,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Storage backend
    #[serde(default = "default_backend")]
    pub backend: Backend,

    /// Directory challenge images are written to
    #[serde(default = "default_media_root")]
    pub media_root: String,

    /// Server secret mixed into every challenge key.
    /// A random per-process secret is used when unset.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// CAPTCHA configuration
    #[serde(default)]
    pub captcha: CaptchaConfig,

    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// CAPTCHA-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Form field name
    #[serde(default = "default_field_name")]
    pub field_name: String,

    /// Fixed field salt; pin it when several replicas must accept each other's keys
    #[serde(default)]
    pub field_salt: Option<String>,

    /// Font files glyphs are drawn with; the bundled DejaVu faces when empty
    #[serde(default)]
    pub font_paths: Vec<String>,

    /// Background image (resized to 180x40); built-in canvas when unset
    #[serde(default)]
    pub background_path: Option<String>,

    /// Solution re-draws allowed while looking for an unused key
    #[serde(default = "default_max_mint_attempts")]
    pub max_mint_attempts: u32,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            field_name: default_field_name(),
            field_salt: None,
            font_paths: Vec::new(),
            background_path: None,
            max_mint_attempts: default_max_mint_attempts(),
        }
    }
}

/// Session cookie configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session cookie name
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Mark the cookie `Secure`
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            ttl_secs: default_session_ttl(),
            secure_cookie: false,
        }
    }
}

// Default value functions
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_backend() -> Backend { Backend::Redis }
fn default_media_root() -> String { DEFAULT_MEDIA_ROOT.to_string() }
fn default_field_name() -> String { DEFAULT_FIELD_NAME.to_string() }
fn default_max_mint_attempts() -> u32 { DEFAULT_MAX_MINT_ATTEMPTS }
fn default_cookie_name() -> String { DEFAULT_SESSION_COOKIE.to_string() }
fn default_session_ttl() -> u64 { DEFAULT_SESSION_TTL_SECS } // 2 weeks

fn generate_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            Self::from_file(config_path)?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref redis_url) = args.redis_url {
            config.redis_url = redis_url.clone();
        }
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(backend) = args.backend {
            config.backend = backend;
        }
        if let Some(ref secret) = args.secret_key {
            config.secret_key = Some(secret.clone());
        }

        Ok(config)
    }

    pub fn from_file(config_path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .build()
            .context("Failed to load config file")?;

        settings
            .try_deserialize()
            .context("Failed to parse config")
    }

    /// The configured secret, or a fresh random one
    pub fn secret_or_random(&self) -> String {
        match &self.secret_key {
            Some(secret) if !secret.is_empty() => secret.clone(),
            _ => {
                tracing::warn!(
                    "No secret_key configured; challenges will not survive a restart \
                     or validate across replicas"
                );
                generate_secret()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            listen_addr: default_listen_addr(),
            backend: default_backend(),
            media_root: default_media_root(),
            secret_key: None,
            captcha: CaptchaConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

//! ============================================================================
//! Startup Configuration
//! ============================================================================
//! Consumer credentials and listener settings, read from the environment
//! (a `.env` file is loaded by the binary before this runs). Consumer key
//! and secret are hard requirements; everything else has a default.
//! ============================================================================

use std::path::PathBuf;

use crate::types::{AuthError, AuthResult};

/// Default local port for the callback listener
pub const DEFAULT_PORT: u16 = 8080;

/// Default audit log path, relative to the working directory
pub const DEFAULT_AUDIT_LOG: &str = "oauth_audit.log";

/// Validated process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth consumer key for the registered application
    pub consumer_key: String,
    /// OAuth consumer secret for the registered application
    pub consumer_secret: String,
    /// Local port the callback server binds
    pub port: u16,
    /// Where protocol events are appended
    pub audit_log: PathBuf,
    /// Externally reachable base URL, if the process is already public.
    /// When set, no tunnel is established.
    pub public_url: Option<String>,
}

impl Config {
    /// Read and validate configuration from the environment.
    ///
    /// Fails fast on missing consumer credentials so the process never
    /// starts a flow it cannot sign.
    pub fn from_env() -> AuthResult<Self> {
        let consumer_key = require_env("APP_CONSUMER_KEY")?;
        let consumer_secret = require_env("APP_CONSUMER_SECRET")?;

        let port = match std::env::var("BIRDKEY_PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|_| {
                AuthError::Configuration(format!("BIRDKEY_PORT is not a valid port: {raw}"))
            })?,
            Err(_) => DEFAULT_PORT,
        };

        let audit_log = std::env::var("BIRDKEY_AUDIT_LOG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_AUDIT_LOG));

        let public_url = std::env::var("BIRDKEY_PUBLIC_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            consumer_key,
            consumer_secret,
            port,
            audit_log,
            public_url,
        })
    }
}

fn require_env(name: &str) -> AuthResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AuthError::Configuration(format!(
            "required environment variable {name} is not set"
        ))),
    }
}

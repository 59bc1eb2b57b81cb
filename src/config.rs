//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::role_sync::RoleSyncPolicy;
use crate::services::session::SessionSettings;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Base URL of the hosted backend (auth at `/auth/v1`, rows at `/rest/v1`)
    pub supabase_url: String,
    /// Public (anon) API key sent with every backend request
    pub supabase_anon_key: String,
    /// Public site origin; OAuth callbacks land on `<origin>/auth/callback`
    pub site_origin: String,
    /// Server port
    pub port: u16,
    /// Upper bound on a single profile hydration
    pub profile_fetch_timeout: Duration,
    /// Attempts made while waiting for the backend to create a new user's row
    pub role_sync_attempts: u32,
    /// First retry delay for role sync (doubles per attempt)
    pub role_sync_backoff: Duration,

    // --- Secrets ---
    /// Service-role key for server-side row access (falls back to the anon key)
    pub supabase_service_key: Option<String>,
    /// HS256 secret the backend signs access tokens with
    pub jwt_secret: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            site_origin: "http://localhost:3000".to_string(),
            port: 8080,
            profile_fetch_timeout: Duration::from_secs(5),
            role_sync_attempts: 5,
            role_sync_backoff: Duration::from_millis(200),
            supabase_service_key: None,
            jwt_secret: b"test_jwt_secret_32_bytes_minimum!".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            supabase_url: env::var("SUPABASE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?,
            supabase_anon_key: env::var("SUPABASE_ANON_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            site_origin: env::var("SITE_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: parse_or("PORT", 8080)?,
            profile_fetch_timeout: Duration::from_secs(parse_or("PROFILE_FETCH_TIMEOUT_SECS", 5)?),
            role_sync_attempts: parse_or("ROLE_SYNC_ATTEMPTS", 5)?,
            role_sync_backoff: Duration::from_millis(parse_or("ROLE_SYNC_BACKOFF_MS", 200)?),

            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("SUPABASE_JWT_SECRET"))?
                .trim()
                .as_bytes()
                .to_vec(),
        })
    }

    /// Key used for server-side row access.
    pub fn server_api_key(&self) -> &str {
        self.supabase_service_key
            .as_deref()
            .unwrap_or(&self.supabase_anon_key)
    }

    /// Session manager settings derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            site_origin: self.site_origin.clone(),
            profile_fetch_timeout: self.profile_fetch_timeout,
            role_sync: RoleSyncPolicy {
                max_attempts: self.role_sync_attempts.max(1),
                initial_backoff: self.role_sync_backoff,
                ..RoleSyncPolicy::default()
            },
        }
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

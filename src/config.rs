//! Console configuration loaded from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! The shell builds the backend client, table store, and controller from one
//! `ConsoleConfig`. Required values missing means auth is unusable, so
//! `from_env` returns `None` rather than a half-configured client.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SESSION_FILE: &str = "clika-session.json";
const DEFAULT_INIT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_GUARD_STALL_SECS: u64 = 5;
const DEFAULT_REFRESH_LEEWAY_SECS: u64 = 60;

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Connection and timing settings for the console core.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Base URL of the hosted backend project.
    pub backend_url: String,
    /// Project API key sent with every request.
    pub api_key: String,
    /// Where OAuth providers redirect back to.
    pub oauth_redirect_url: String,
    /// Path of the persisted session bundle.
    pub session_file: PathBuf,
    /// Bound on session restore at startup.
    pub init_timeout: Duration,
    /// How long the route guard shows a bare spinner before offering the
    /// return-to-login escape.
    pub guard_stall: Duration,
    /// How close to expiry the token pair is renewed.
    pub refresh_leeway: Duration,
}

impl ConsoleConfig {
    /// Load from `CLIKA_BACKEND_URL`, `CLIKA_API_KEY`,
    /// `CLIKA_OAUTH_REDIRECT_URL`, and the optional tuning variables.
    /// Returns `None` if a required value is missing (auth will be disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let backend_url = std::env::var("CLIKA_BACKEND_URL").ok()?;
        let api_key = std::env::var("CLIKA_API_KEY").ok()?;
        let oauth_redirect_url = std::env::var("CLIKA_OAUTH_REDIRECT_URL").ok()?;

        let session_file = std::env::var("CLIKA_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SESSION_FILE));

        Some(Self {
            backend_url,
            api_key,
            oauth_redirect_url,
            session_file,
            init_timeout: Duration::from_secs(env_parse("CLIKA_INIT_TIMEOUT_SECS", DEFAULT_INIT_TIMEOUT_SECS)),
            guard_stall: Duration::from_secs(env_parse("CLIKA_GUARD_STALL_SECS", DEFAULT_GUARD_STALL_SECS)),
            refresh_leeway: Duration::from_secs(env_parse("CLIKA_REFRESH_LEEWAY_SECS", DEFAULT_REFRESH_LEEWAY_SECS)),
        })
    }

    /// A config pointing at `backend_url` with library defaults for the
    /// optional settings.
    #[must_use]
    pub fn new(backend_url: &str, api_key: &str, oauth_redirect_url: &str) -> Self {
        Self {
            backend_url: backend_url.to_owned(),
            api_key: api_key.to_owned(),
            oauth_redirect_url: oauth_redirect_url.to_owned(),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            init_timeout: Duration::from_secs(DEFAULT_INIT_TIMEOUT_SECS),
            guard_stall: Duration::from_secs(DEFAULT_GUARD_STALL_SECS),
            refresh_leeway: Duration::from_secs(DEFAULT_REFRESH_LEEWAY_SECS),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

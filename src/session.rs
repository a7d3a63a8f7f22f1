//! Identity, session, and persisted token-bundle types.
//!
//! DESIGN
//! ======
//! A `Session` owns its `Identity`, so "a live session always has an
//! authenticated principal" holds by construction. The persisted form is a
//! separate `TokenBundle` — tokens only, no identity — because the identity
//! is re-fetched from the backend on restore rather than trusted from disk.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated principal as known to the hosted auth backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable backend identifier.
    pub id: Uuid,
    /// Email address, if the provider supplied one.
    pub email: Option<String>,
    /// Arbitrary key-value bag attached by the backend. May carry a
    /// suggested `role` for first sign-in.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A live token pair proving authentication, bound to its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as epoch seconds.
    pub expires_at: i64,
    pub identity: Identity,
}

impl Session {
    /// Whether the access token expires within `leeway_secs` from now.
    #[must_use]
    pub fn expires_within(&self, leeway_secs: i64) -> bool {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        self.expires_at - now <= leeway_secs
    }

    /// Whether the access token is already past its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_within(0)
    }

    /// The persistable token bundle for this session.
    #[must_use]
    pub fn bundle(&self) -> TokenBundle {
        TokenBundle {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// The single persisted JSON document surviving console restarts.
///
/// Layout is owned by the backend client: `access_token`, `refresh_token`,
/// and `expires_at` epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

impl TokenBundle {
    /// Whether the bundled access token expires within `leeway_secs` from now.
    #[must_use]
    pub fn expires_within(&self, leeway_secs: i64) -> bool {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        self.expires_at - now <= leeway_secs
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

//! Error taxonomy for the auth/session core.
//!
//! ERROR HANDLING
//! ==============
//! Initialization failures are absorbed into a terminal logged-out snapshot
//! (the console must always become interactive); failures during explicit
//! user actions are returned to the caller verbatim for inline display.

use uuid::Uuid;

use crate::table::StoreError;

/// Errors produced by the auth backend, profile resolver, and controller.
///
/// Every variant is `Clone` so the active error can live inside the published
/// snapshot alongside the session triple.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Backend unreachable or returned an unusable response.
    #[error("backend unreachable: {0}")]
    Transport(String),
    /// Credential check rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,
    /// The account exists but its email address has not been confirmed.
    #[error("email address not confirmed")]
    EmailNotConfirmed,
    /// An operation that requires a signed-in identity was called without one.
    #[error("not authenticated")]
    NotAuthenticated,
    /// Two concurrent profile creations collided and the re-fetch also came
    /// back empty. Transient; never surfaced to callers by the resolver.
    #[error("profile conflict for user {user_id}")]
    ProfileConflict { user_id: Uuid },
    /// Session restore did not complete within the configured bound.
    #[error("initialization timed out after {0}s")]
    Timeout(u64),
    /// The OAuth completion state token did not match the begin state token.
    #[error("oauth state mismatch")]
    OAuthStateMismatch,
    /// No OAuth flow is in flight for the completion call.
    #[error("no oauth flow in progress")]
    OAuthNotStarted,
    /// Table-store failure while reading or writing profile rows.
    #[error("profile store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

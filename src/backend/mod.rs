//! Auth backend boundary — the hosted service the console authenticates
//! against.
//!
//! DESIGN
//! ======
//! Everything session-shaped the console does goes through [`AuthBackend`]:
//! restore, password sign-in, the OAuth redirect pair, sign-out, and user
//! updates. The backend also owns the persisted token bundle and pushes every
//! session transition (from this process or a concurrent one) onto a
//! broadcast stream, so the controller has exactly one reconciliation path.

pub mod http;
pub mod store;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::AuthError;
use crate::session::{Identity, Session};

/// Kinds of session transitions delivered on the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    /// Emitted once per restore attempt, with or without a session.
    InitialSession,
    /// A credential or OAuth sign-in completed.
    SignedIn,
    /// The token pair was renewed.
    TokenRefreshed,
    /// The session ended (explicit sign-out or rejected refresh).
    SignedOut,
}

/// One session transition pushed by the backend.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub session: Option<Session>,
}

/// External OAuth identity providers the console can delegate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }
}

/// Fields forwarded to the backend's user record.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct UserChanges {
    /// Replacement email address, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Metadata entries merged into the identity's bag. Serialized as the
    /// backend's `data` field.
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// The hosted auth service, as consumed by the controller.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Restore the persisted session, refreshing an expired token pair.
    /// `Ok(None)` means no usable persisted session exists.
    async fn persisted_session(&self) -> Result<Option<Session>, AuthError>;

    /// Check credentials and establish a session. State is populated via the
    /// resulting [`SessionEventKind::SignedIn`] event, not the return value.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<(), AuthError>;

    /// Begin a redirect-based OAuth flow; returns the authorization URL the
    /// shell must open. Completion arrives through [`AuthBackend::complete_oauth`].
    async fn begin_oauth(&self, provider: OAuthProvider) -> Result<String, AuthError>;

    /// Finish an OAuth flow with the code and state returned to the redirect
    /// URL.
    async fn complete_oauth(&self, code: &str, state: &str) -> Result<(), AuthError>;

    /// Invalidate the session remotely and clear the persisted bundle.
    /// The bundle is cleared even when the remote call fails.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Update the backend's user record for the current session.
    async fn update_user(&self, changes: &UserChanges) -> Result<Identity, AuthError>;

    /// Subscribe to session transitions. Dropping the receiver unsubscribes.
    fn events(&self) -> broadcast::Receiver<SessionEvent>;
}

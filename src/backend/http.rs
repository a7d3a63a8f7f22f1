//! Hosted auth service client — token grants, OAuth redirect flow, session
//! persistence, and the background refresh task.
//!
//! ARCHITECTURE
//! ============
//! All grants go through `POST /auth/v1/token?grant_type=…`; the OAuth
//! redirect pair is CSRF-guarded with a state token and PKCE (S256). Every
//! session transition is pushed onto the broadcast stream so the controller
//! reconciles sign-in, restore, refresh, and sign-out through one path.
//!
//! TRADE-OFFS
//! ==========
//! Rejected persisted tokens are dropped immediately rather than retried:
//! restore favors landing the operator on the login screen over wedging
//! startup on an unusable bundle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::store::SessionStore;
use crate::backend::{AuthBackend, OAuthProvider, SessionEvent, SessionEventKind, UserChanges};
use crate::config::ConsoleConfig;
use crate::error::AuthError;
use crate::session::{Identity, Session, TokenBundle};

const EVENT_CHANNEL_CAPACITY: usize = 16;
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;
const REFRESH_RETRY_SECS: u64 = 30;
const IDLE_POLL_SECS: u64 = 60;

fn bytes_to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

fn pkce_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: WireUser,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

impl From<WireUser> for Identity {
    fn from(user: WireUser) -> Self {
        Self { id: user.id, email: user.email, metadata: user.user_metadata }
    }
}

#[derive(Debug, Deserialize)]
struct FailureBody {
    error_code: Option<String>,
    msg: Option<String>,
}

fn map_auth_failure(status: reqwest::StatusCode, body: &str) -> AuthError {
    let parsed: Option<FailureBody> = serde_json::from_str(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|b| b.error_code.as_deref())
        .unwrap_or_default();
    match code {
        "invalid_credentials" | "invalid_grant" => AuthError::InvalidCredentials,
        "email_not_confirmed" => AuthError::EmailNotConfirmed,
        _ => {
            let msg = parsed.and_then(|b| b.msg).unwrap_or_else(|| body.to_owned());
            AuthError::Transport(format!("{status}: {msg}"))
        }
    }
}

#[derive(Debug)]
struct PendingOAuth {
    provider: OAuthProvider,
    state: String,
    verifier: String,
}

// =============================================================================
// BACKEND CLIENT
// =============================================================================

/// REST client for the hosted auth service. Owns the persisted bundle and the
/// session event stream.
pub struct HttpAuthBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    redirect_url: String,
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<SessionEvent>,
    pending_oauth: Mutex<Option<PendingOAuth>>,
    refresh_leeway_secs: i64,
}

impl HttpAuthBackend {
    #[must_use]
    pub fn new(config: &ConsoleConfig, store: Arc<dyn SessionStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http: reqwest::Client::new(),
            base_url: config.backend_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            redirect_url: config.oauth_redirect_url.clone(),
            store,
            events,
            pending_oauth: Mutex::new(None),
            refresh_leeway_secs: config.refresh_leeway.as_secs() as i64,
        }
    }

    fn emit(&self, kind: SessionEventKind, session: Option<Session>) {
        // Send errors only mean no subscriber is attached yet.
        let _ = self.events.send(SessionEvent { kind, session });
    }

    fn token_url(&self, grant: &str) -> String {
        format!("{}/auth/v1/token?grant_type={grant}", self.base_url)
    }

    async fn request_token(&self, grant: &str, payload: serde_json::Value) -> Result<Session, AuthError> {
        let resp = self
            .http
            .post(self.token_url(grant))
            .header("apikey", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(map_auth_failure(status, &body));
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|_| AuthError::Transport(format!("unexpected token response: {body}")))?;
        Ok(session_from_response(token))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Identity, AuthError> {
        let resp = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthError::NotAuthenticated);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(map_auth_failure(status, &body));
        }

        let user: WireUser =
            serde_json::from_str(&body).map_err(|_| AuthError::Transport(format!("unexpected user response: {body}")))?;
        Ok(user.into())
    }

    /// Exchange a refresh token for a new pair and persist it.
    async fn refresh_grant(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let session = self
            .request_token("refresh_token", serde_json::json!({ "refresh_token": refresh_token }))
            .await?;
        self.store.save(&session.bundle());
        Ok(session)
    }

    /// Rebuild a session from an unexpired bundle, falling back to the
    /// refresh grant when the access token is rejected server-side.
    async fn hydrate(&self, bundle: &TokenBundle) -> Result<Session, AuthError> {
        match self.fetch_user(&bundle.access_token).await {
            Ok(identity) => Ok(Session {
                access_token: bundle.access_token.clone(),
                refresh_token: bundle.refresh_token.clone(),
                expires_at: bundle.expires_at,
                identity,
            }),
            Err(AuthError::Transport(e)) => Err(AuthError::Transport(e)),
            Err(_) => self.refresh_grant(&bundle.refresh_token).await,
        }
    }

    /// Renew the current token pair, emitting [`SessionEventKind::TokenRefreshed`].
    ///
    /// A rejected refresh token ends the session: the bundle is cleared and
    /// [`SessionEventKind::SignedOut`] is emitted.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] when no bundle is persisted,
    /// or the grant failure otherwise.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let Some(bundle) = self.store.load() else {
            return Err(AuthError::NotAuthenticated);
        };
        match self.refresh_grant(&bundle.refresh_token).await {
            Ok(session) => {
                debug!(expires_at = session.expires_at, "token pair renewed");
                self.emit(SessionEventKind::TokenRefreshed, Some(session));
                Ok(())
            }
            Err(AuthError::Transport(e)) => Err(AuthError::Transport(e)),
            Err(e) => {
                warn!(error = %e, "refresh token rejected; ending session");
                self.store.clear();
                self.emit(SessionEventKind::SignedOut, None);
                Err(e)
            }
        }
    }

    /// Spawn the background renewal task. Sleeps until shortly before expiry,
    /// renews, and repeats. Returns a handle for shutdown.
    pub fn spawn_refresh_task(backend: Arc<Self>) -> JoinHandle<()> {
        info!(leeway_secs = backend.refresh_leeway_secs, "session refresh task configured");
        tokio::spawn(async move {
            loop {
                let wait_secs = match backend.store.load() {
                    Some(bundle) => {
                        if bundle.expires_within(backend.refresh_leeway_secs) {
                            match backend.refresh().await {
                                Ok(()) => continue,
                                Err(AuthError::Transport(e)) => {
                                    warn!(error = %e, "token refresh failed; retrying");
                                    REFRESH_RETRY_SECS
                                }
                                // Rejected grant already cleared the bundle.
                                Err(_) => continue,
                            }
                        } else {
                            let now = time::OffsetDateTime::now_utc().unix_timestamp();
                            let until_leeway = bundle.expires_at - backend.refresh_leeway_secs - now;
                            until_leeway.clamp(1, IDLE_POLL_SECS as i64) as u64
                        }
                    }
                    None => IDLE_POLL_SECS,
                };
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
            }
        })
    }
}

fn session_from_response(token: TokenResponse) -> Session {
    let expires_at = token.expires_at.unwrap_or_else(|| {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        now + token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)
    });
    Session {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at,
        identity: token.user.into(),
    }
}

#[async_trait::async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn persisted_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(bundle) = self.store.load() else {
            self.emit(SessionEventKind::InitialSession, None);
            return Ok(None);
        };

        let restored = if bundle.expires_within(self.refresh_leeway_secs) {
            self.refresh_grant(&bundle.refresh_token).await
        } else {
            self.hydrate(&bundle).await
        };

        match restored {
            Ok(session) => {
                self.emit(SessionEventKind::InitialSession, Some(session.clone()));
                Ok(Some(session))
            }
            Err(AuthError::Transport(e)) => Err(AuthError::Transport(e)),
            Err(e) => {
                warn!(error = %e, "persisted session rejected; clearing bundle");
                self.store.clear();
                self.emit(SessionEventKind::InitialSession, None);
                Ok(None)
            }
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let session = self
            .request_token("password", serde_json::json!({ "email": email, "password": password }))
            .await?;
        self.store.save(&session.bundle());
        self.emit(SessionEventKind::SignedIn, Some(session));
        Ok(())
    }

    async fn begin_oauth(&self, provider: OAuthProvider) -> Result<String, AuthError> {
        let state = generate_token();
        let verifier = generate_token();
        let challenge = pkce_challenge(&verifier);

        let url = format!(
            "{}/auth/v1/authorize?provider={}&redirect_to={}&state={}&code_challenge={}&code_challenge_method=s256",
            self.base_url,
            provider.as_str(),
            self.redirect_url,
            state,
            challenge,
        );

        let mut pending = self
            .pending_oauth
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *pending = Some(PendingOAuth { provider, state, verifier });
        Ok(url)
    }

    async fn complete_oauth(&self, code: &str, state: &str) -> Result<(), AuthError> {
        let pending = {
            let mut slot = self
                .pending_oauth
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            slot.take()
        };
        let Some(pending) = pending else {
            return Err(AuthError::OAuthNotStarted);
        };
        if pending.state != state {
            return Err(AuthError::OAuthStateMismatch);
        }

        let session = self
            .request_token("pkce", serde_json::json!({ "auth_code": code, "code_verifier": pending.verifier }))
            .await?;
        info!(provider = pending.provider.as_str(), "oauth sign-in completed");
        self.store.save(&session.bundle());
        self.emit(SessionEventKind::SignedIn, Some(session));
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let bundle = self.store.load();
        let result = match &bundle {
            Some(bundle) => {
                let resp = self
                    .http
                    .post(format!("{}/auth/v1/logout", self.base_url))
                    .header("apikey", &self.api_key)
                    .header("Authorization", format!("Bearer {}", bundle.access_token))
                    .send()
                    .await;
                match resp {
                    Ok(r) if r.status().is_success() => Ok(()),
                    Ok(r) => Err(AuthError::Transport(format!("logout failed: {}", r.status()))),
                    Err(e) => Err(AuthError::Transport(e.to_string())),
                }
            }
            None => Ok(()),
        };

        // The local bundle goes away even when the remote call failed.
        self.store.clear();
        self.emit(SessionEventKind::SignedOut, None);
        result
    }

    async fn update_user(&self, changes: &UserChanges) -> Result<Identity, AuthError> {
        let Some(bundle) = self.store.load() else {
            return Err(AuthError::NotAuthenticated);
        };

        let resp = self
            .http
            .put(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", bundle.access_token))
            .json(changes)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(map_auth_failure(status, &body));
        }

        let user: WireUser =
            serde_json::from_str(&body).map_err(|_| AuthError::Transport(format!("unexpected user response: {body}")))?;
        Ok(user.into())
    }

    fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;

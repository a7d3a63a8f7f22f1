//! Auth state controller — single source of truth for "who is signed in and
//! with what role".
//!
//! ARCHITECTURE
//! ============
//! Three event sources feed the controller: startup restore, explicit user
//! actions, and the backend's push stream. All of them funnel into one
//! reconciliation procedure that resolves the profile for the (possibly
//! absent) session and publishes the whole snapshot atomically.
//!
//! TRADE-OFFS
//! ==========
//! Reconciliations are tagged with a monotonically increasing sequence
//! number and terminal publications are gated on it, so a slow pass can
//! never clobber newer state: last-write-wins by event recency, not by
//! completion order. The startup restore races a bounded timeout; the loser
//! of that race publishes nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::{AuthBackend, OAuthProvider, SessionEvent, UserChanges};
use crate::error::AuthError;
use crate::profile::{Profile, ProfileChanges, ProfileResolver};
use crate::session::Session;
use crate::state::AuthSnapshot;
use crate::table::TableStore;

/// Handle to the auth state machine. Cheap to clone; all clones share one
/// published snapshot.
///
/// Constructed explicitly and injected into the shell; no module-level
/// singletons. [`AuthController::shutdown`] (or dropping every handle)
/// tears down the event pump.
#[derive(Clone)]
pub struct AuthController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    backend: Arc<dyn AuthBackend>,
    profiles: ProfileResolver,
    state: watch::Sender<AuthSnapshot>,
    seq: AtomicU64,
    last_terminal: Mutex<u64>,
    init_timeout: Duration,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl AuthController {
    #[must_use]
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<dyn TableStore>, init_timeout: Duration) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::default());
        Self {
            inner: Arc::new(ControllerInner {
                backend,
                profiles: ProfileResolver::new(store),
                state,
                seq: AtomicU64::new(0),
                last_terminal: Mutex::new(0),
                init_timeout,
                pump: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.state.subscribe()
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Start draining the backend event stream. Every transition — restore,
    /// sign-in, token refresh, sign-out, from this process or another — runs
    /// through the same reconciliation as [`AuthController::initialize`].
    pub fn start(&self) {
        let mut rx = self.inner.backend.events();
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let Some(inner) = weak.upgrade() else { break };
                        let seq = inner.next_seq();
                        inner.apply_event(seq, event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut pump = self
            .inner
            .pump
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(old) = pump.replace(handle) {
            old.abort();
        }
    }

    /// Stop the event pump. Safe to call more than once.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Restore any persisted session, bounded by the configured timeout.
    ///
    /// Always leaves the snapshot initialized: success publishes the
    /// reconciled triple, failure or timeout publishes a logged-out snapshot
    /// with the error recorded. A restore that outlives the timeout keeps
    /// running, but its late result is discarded by the sequence gate.
    pub async fn initialize(&self) {
        let seq = self.inner.next_seq();
        self.inner.publish_loading();

        let weak = Arc::downgrade(&self.inner);
        let backend = Arc::clone(&self.inner.backend);
        let restore = tokio::spawn(async move {
            let result = backend.persisted_session().await;
            if let Some(inner) = weak.upgrade() {
                inner.finish_restore(seq, result).await;
            }
        });

        match tokio::time::timeout(self.inner.init_timeout, restore).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "session restore task failed; starting logged out");
                self.inner.publish_terminal(seq, |_| AuthSnapshot {
                    error: Some(AuthError::Transport("session restore task failed".to_owned())),
                    ..AuthSnapshot::default()
                });
            }
            Err(_) => {
                let secs = self.inner.init_timeout.as_secs();
                warn!(timeout_secs = secs, "session restore timed out; starting logged out");
                self.inner.publish_terminal(seq, move |_| AuthSnapshot {
                    error: Some(AuthError::Timeout(secs)),
                    ..AuthSnapshot::default()
                });
            }
        }
    }

    /// Check credentials with the backend. On success the snapshot is
    /// populated by the resulting `SignedIn` event — never synchronously
    /// here, so the transition is applied exactly once. On failure the error
    /// is returned for inline display and prior state stays untouched.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`], [`AuthError::EmailNotConfirmed`],
    /// or [`AuthError::Transport`].
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.inner.publish_loading();
        match self.inner.backend.sign_in_with_password(email, password).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.inner.clear_loading();
                Err(e)
            }
        }
    }

    /// Begin a redirect-based OAuth sign-in; returns the authorization URL
    /// for the shell to open. Completion flows through
    /// [`AuthController::complete_sign_in_with_provider`] and the event
    /// stream, not through this call's return value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Transport`] if the flow cannot be started.
    pub async fn sign_in_with_provider(&self, provider: OAuthProvider) -> Result<String, AuthError> {
        self.inner.backend.begin_oauth(provider).await
    }

    /// Finish an OAuth flow with the code and state from the redirect.
    ///
    /// # Errors
    ///
    /// [`AuthError::OAuthNotStarted`], [`AuthError::OAuthStateMismatch`], or
    /// the token-exchange failure.
    pub async fn complete_sign_in_with_provider(&self, code: &str, state: &str) -> Result<(), AuthError> {
        self.inner.publish_loading();
        match self.inner.backend.complete_oauth(code, state).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.inner.clear_loading();
                Err(e)
            }
        }
    }

    /// End the session. Local state is cleared unconditionally — a failed
    /// remote sign-out must never leave the console believing it is still
    /// authenticated. The backend error, if any, is returned after the local
    /// clear for diagnostic display.
    ///
    /// # Errors
    ///
    /// Returns the remote invalidation failure, after local state is cleared.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let seq = self.inner.next_seq();
        let result = self.inner.backend.sign_out().await;
        if let Err(e) = &result {
            warn!(error = %e, "remote sign-out failed; clearing local session anyway");
        }
        self.inner.publish_terminal(seq, |_| AuthSnapshot::default());
        result
    }

    /// Persist profile changes for the signed-in identity and republish the
    /// merged record. The display name is mirrored into backend metadata on
    /// a best-effort basis.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] without an identity, or the store
    /// failure.
    pub async fn update_profile(&self, changes: ProfileChanges) -> Result<Profile, AuthError> {
        let current = self.snapshot();
        let Some(identity) = current.identity else {
            return Err(AuthError::NotAuthenticated);
        };

        let profile = self.inner.profiles.update(identity.id, &changes).await?;

        if let Some(name) = &changes.display_name {
            let user_changes = UserChanges {
                metadata: Some(serde_json::json!({ "display_name": name })),
                ..UserChanges::default()
            };
            if let Err(e) = self.inner.backend.update_user(&user_changes).await {
                debug!(error = %e, "backend metadata sync skipped");
            }
        }

        let seq = self.inner.next_seq();
        let merged = profile.clone();
        self.inner
            .publish_terminal(seq, move |prev| AuthSnapshot { profile: Some(merged), ..prev.clone() });
        Ok(profile)
    }
}

// =============================================================================
// RECONCILIATION
// =============================================================================

impl ControllerInner {
    async fn apply_event(&self, seq: u64, event: SessionEvent) {
        debug!(kind = ?event.kind, seq, "session event received");
        self.reconcile(seq, event.session).await;
    }

    async fn finish_restore(&self, seq: u64, result: Result<Option<Session>, AuthError>) {
        match result {
            Ok(session) => self.reconcile(seq, session).await,
            Err(e) => {
                warn!(error = %e, "session restore failed; starting logged out");
                self.publish_terminal(seq, move |_| AuthSnapshot { error: Some(e), ..AuthSnapshot::default() });
            }
        }
    }

    /// Produce and publish the consistent `{identity, session, profile}`
    /// triple for a (possibly absent) session. The single code path behind
    /// every transition.
    async fn reconcile(&self, seq: u64, session: Option<Session>) {
        let Some(session) = session else {
            self.publish_terminal(seq, |_| AuthSnapshot::default());
            return;
        };

        // A duplicate event for the same token needs no second profile pass;
        // startup commonly delivers restore and signed-in back to back.
        let current = self.state.borrow().clone();
        if let Some(profile) = current.profile {
            let same_token = current
                .session
                .as_ref()
                .is_some_and(|s| s.access_token == session.access_token);
            if same_token && profile.user_id == session.identity.id {
                self.publish_terminal(seq, move |_| AuthSnapshot {
                    identity: Some(session.identity.clone()),
                    session: Some(session),
                    profile: Some(profile),
                    ..AuthSnapshot::default()
                });
                return;
            }
        }

        match self.profiles.resolve(&session.identity).await {
            Ok(profile) => {
                debug!(user_id = %session.identity.id, seq, "session reconciled");
                self.publish_terminal(seq, move |_| AuthSnapshot {
                    identity: Some(session.identity.clone()),
                    session: Some(session),
                    profile: Some(profile),
                    ..AuthSnapshot::default()
                });
            }
            Err(e) => {
                warn!(error = %e, user_id = %session.identity.id, "profile resolution failed; starting logged out");
                self.publish_terminal(seq, move |_| AuthSnapshot { error: Some(e), ..AuthSnapshot::default() });
            }
        }
    }

    // =========================================================================
    // PUBLICATION
    // =========================================================================

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Publish a terminal snapshot for reconciliation `seq`. Returns false
    /// and publishes nothing when a newer (or equal) reconciliation already
    /// published — the stale-result discard behind last-write-wins.
    fn publish_terminal(&self, seq: u64, build: impl FnOnce(&AuthSnapshot) -> AuthSnapshot) -> bool {
        let mut last = self
            .last_terminal
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if seq <= *last {
            debug!(seq, last = *last, "discarding stale reconciliation result");
            return false;
        }
        *last = seq;

        // The whole triple is swapped in as one unit; readers never observe
        // a stale+fresh mix.
        self.state.send_modify(|snapshot| {
            let mut next = build(snapshot);
            next.initialized = true;
            next.loading = false;
            *snapshot = next;
        });
        true
    }

    fn publish_loading(&self) {
        self.state.send_modify(|snapshot| snapshot.loading = true);
    }

    fn clear_loading(&self) {
        self.state.send_modify(|snapshot| snapshot.loading = false);
    }

    fn shutdown(&self) {
        let handle = {
            let mut pump = self
                .pump
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            pump.take()
        };
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

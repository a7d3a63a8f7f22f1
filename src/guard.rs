//! Route guard — gate rendering of protected views on the published
//! snapshot.
//!
//! SYSTEM CONTEXT
//! ==============
//! The shell evaluates a guard per protected view on every snapshot change.
//! The guard is a pure decision: it owns no state beyond its requirement, so
//! every view applies identical redirect behavior.

use std::time::Duration;

use crate::roles::Role;
use crate::state::AuthSnapshot;

const DEFAULT_STALL_AFTER: Duration = Duration::from_secs(5);

/// Where a denied view sends the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    /// Not signed in (or auth failed): the unauthenticated entry point.
    Login,
    /// Signed in but under-privileged: the default authenticated landing
    /// page, not the login screen.
    Landing,
}

/// Outcome of evaluating a guard against a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Auth is still resolving; render a loading indicator. Once
    /// `offer_escape` turns true the view must also render a manual
    /// return-to-login action — the guard is never a dead end.
    Checking { offer_escape: bool },
    /// Render the protected view.
    Allowed,
    /// Redirect instead of rendering.
    Denied { redirect: RedirectTarget },
}

/// Per-view requirement: authenticated, optionally at a minimum role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteGuard {
    required_role: Option<Role>,
    stall_after: Duration,
}

impl RouteGuard {
    /// Guard that only requires a signed-in identity.
    #[must_use]
    pub fn authenticated() -> Self {
        Self { required_role: None, stall_after: DEFAULT_STALL_AFTER }
    }

    /// Guard that requires the effective role to satisfy `role`.
    #[must_use]
    pub fn with_role(role: Role) -> Self {
        Self { required_role: Some(role), stall_after: DEFAULT_STALL_AFTER }
    }

    /// Override how long checking may show a bare spinner before the escape
    /// action appears.
    #[must_use]
    pub fn stall_after(mut self, stall_after: Duration) -> Self {
        self.stall_after = stall_after;
        self
    }

    /// Decide what to render given the current snapshot and how long this
    /// view has been waiting in the checking state.
    #[must_use]
    pub fn decide(&self, snapshot: &AuthSnapshot, waited: Duration) -> GuardDecision {
        if !snapshot.initialized || snapshot.loading {
            return GuardDecision::Checking { offer_escape: waited >= self.stall_after };
        }

        if !snapshot.is_authenticated() || snapshot.error.is_some() {
            return GuardDecision::Denied { redirect: RedirectTarget::Login };
        }

        if let Some(required) = self.required_role {
            if !snapshot.satisfies(required) {
                return GuardDecision::Denied { redirect: RedirectTarget::Landing };
            }
        }

        GuardDecision::Allowed
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;

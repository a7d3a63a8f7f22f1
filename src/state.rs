//! Published auth state — the single aggregate pages and guards read.
//!
//! SYSTEM CONTEXT
//! ==============
//! The controller publishes whole snapshots through a watch channel, so a
//! reader always observes one consistent `{identity, session, profile}`
//! triple; stale and fresh fields are never mixed.

use crate::error::AuthError;
use crate::profile::Profile;
use crate::roles::Role;
use crate::session::{Identity, Session};

/// The controller's published aggregate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSnapshot {
    pub identity: Option<Identity>,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    /// Latches true after the first terminal resolution and never reverts
    /// within a console run.
    pub initialized: bool,
    /// True only between an initiation (startup, explicit sign-in) and its
    /// resolution.
    pub loading: bool,
    /// Diagnostic from the most recent failed resolution, if any.
    pub error: Option<AuthError>,
}

impl AuthSnapshot {
    /// The role used for capability gating.
    ///
    /// Profile role wins; the identity metadata bag is only consulted while
    /// the profile is absent (e.g. during first-sign-in creation).
    #[must_use]
    pub fn effective_role(&self) -> Option<Role> {
        if let Some(profile) = &self.profile {
            return profile.role;
        }
        self.identity
            .as_ref()
            .and_then(|identity| Role::from_metadata(&identity.metadata))
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.satisfies(Role::Admin)
    }

    #[must_use]
    pub fn is_editor(&self) -> bool {
        self.satisfies(Role::Editor)
    }

    #[must_use]
    pub fn is_reviewer(&self) -> bool {
        self.satisfies(Role::Reviewer)
    }

    /// Whether the effective role satisfies `required`.
    #[must_use]
    pub fn satisfies(&self, required: Role) -> bool {
        self.effective_role().is_some_and(|role| role.satisfies(required))
    }

    /// Whether a signed-in identity is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

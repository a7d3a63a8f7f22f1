//! Profile records and the fetch-or-create resolver.
//!
//! DESIGN
//! ======
//! Profiles are the console's own per-user layer on top of backend identity:
//! role and display name, keyed 1:1 by identity id. A profile is created
//! lazily the first time an identity signs in. Duplicate startup events can
//! race two creations for the same identity; the store's unique key rejects
//! the loser, which falls back to re-fetching the winner's row.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::AuthError;
use crate::roles::Role;
use crate::session::Identity;
use crate::table::{StoreError, TableStore};

/// Table holding console profiles, keyed by `user_id`.
pub const PROFILE_TABLE: &str = "profiles";
const PROFILE_KEY_COLUMN: &str = "user_id";

/// The console's per-user record layered on top of backend identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub display_name: String,
    /// Assigned role; absent until an administrator grants one beyond the
    /// first-sign-in default.
    pub role: Option<Role>,
    /// Creation time as epoch seconds.
    pub created_at: i64,
    /// Last update time as epoch seconds.
    pub updated_at: i64,
}

/// Partial profile update applied through [`ProfileResolver::update`].
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub role: Option<Role>,
}

impl ProfileChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.role.is_none()
    }
}

/// Fetch-or-create mapping from identity to profile.
#[derive(Clone)]
pub struct ProfileResolver {
    store: Arc<dyn TableStore>,
}

impl ProfileResolver {
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Resolve the profile for an authenticated identity, creating one on
    /// first sign-in.
    ///
    /// Lookup failures propagate — a transport or permission error is never
    /// treated as "profile absent". A uniqueness conflict on create falls
    /// back to re-fetching the concurrently created row.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] when the store fails, or
    /// [`AuthError::ProfileConflict`] if the conflict re-fetch also finds no
    /// row.
    pub async fn resolve(&self, identity: &Identity) -> Result<Profile, AuthError> {
        let key = identity.id.to_string();
        if let Some(row) = self
            .store
            .select_one(PROFILE_TABLE, PROFILE_KEY_COLUMN, &key)
            .await?
        {
            return decode_profile(&row);
        }

        let fresh = default_profile(identity);
        let row = serde_json::to_value(&fresh).unwrap_or(Value::Null);
        match self.store.insert(PROFILE_TABLE, row).await {
            Ok(stored) => {
                info!(user_id = %fresh.user_id, role = ?fresh.role, "profile created on first sign-in");
                decode_profile(&stored)
            }
            Err(StoreError::Conflict { .. }) => {
                // Lost the create race to a concurrent reconciliation.
                let row = self
                    .store
                    .select_one(PROFILE_TABLE, PROFILE_KEY_COLUMN, &key)
                    .await?
                    .ok_or(AuthError::ProfileConflict { user_id: identity.id })?;
                decode_profile(&row)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply a partial update to an existing profile and return the merged
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] when the row is missing or the store
    /// fails.
    pub async fn update(&self, user_id: Uuid, changes: &ProfileChanges) -> Result<Profile, AuthError> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let mut patch = serde_json::Map::new();
        if let Some(name) = &changes.display_name {
            patch.insert("display_name".to_owned(), Value::String(name.clone()));
        }
        if let Some(role) = changes.role {
            patch.insert("role".to_owned(), Value::String(role.as_str().to_owned()));
        }
        patch.insert("updated_at".to_owned(), Value::from(now));

        let row = self
            .store
            .update_where(PROFILE_TABLE, PROFILE_KEY_COLUMN, &user_id.to_string(), Value::Object(patch))
            .await?;
        decode_profile(&row)
    }
}

/// Build the first-sign-in profile for an identity.
///
/// Display name defaults to the local part of the email; role defaults to
/// the lowest privilege unless the metadata bag suggests otherwise.
fn default_profile(identity: &Identity) -> Profile {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    Profile {
        user_id: identity.id,
        display_name: display_name_from_email(identity.email.as_deref()),
        role: Some(Role::from_metadata(&identity.metadata).unwrap_or_else(Role::lowest)),
        created_at: now,
        updated_at: now,
    }
}

fn display_name_from_email(email: Option<&str>) -> String {
    let local = email
        .and_then(|e| e.split('@').next())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("user");
    local.to_owned()
}

fn decode_profile(row: &Value) -> Result<Profile, AuthError> {
    serde_json::from_value(row.clone()).map_err(|e| {
        AuthError::Store(StoreError::Malformed { table: PROFILE_TABLE.to_owned(), detail: e.to_string() })
    })
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;

//! Persisted session storage — the native analog of the browser-storage key.
//!
//! SYSTEM CONTEXT
//! ==============
//! The backend client is the only writer; the rest of the crate observes
//! persisted state through session events. Load/save failures degrade to "no
//! bundle" rather than erroring, matching browser-storage semantics.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::session::TokenBundle;

/// Storage for the single persisted token bundle.
pub trait SessionStore: Send + Sync {
    /// Load the persisted bundle, if one exists and decodes.
    fn load(&self) -> Option<TokenBundle>;
    /// Persist the bundle, replacing any previous one.
    fn save(&self, bundle: &TokenBundle);
    /// Remove the persisted bundle.
    fn clear(&self);
}

/// File-backed store: one JSON document at a fixed path.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<TokenBundle> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    fn save(&self, bundle: &TokenBundle) {
        let Ok(raw) = serde_json::to_string(bundle) else {
            return;
        };
        if let Err(e) = std::fs::write(&self.path, raw) {
            warn!(error = %e, path = %self.path.display(), "failed to persist session bundle");
        }
    }

    fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, path = %self.path.display(), "failed to clear session bundle");
            }
        }
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<TokenBundle>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a store pre-populated with a bundle.
    #[must_use]
    pub fn with_bundle(bundle: TokenBundle) -> Self {
        Self { slot: Mutex::new(Some(bundle)) }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<TokenBundle> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn save(&self, bundle: &TokenBundle) {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(bundle.clone());
    }

    fn clear(&self) {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = None;
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

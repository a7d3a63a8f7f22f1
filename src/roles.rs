//! Role enumeration and capability hierarchy.
//!
//! DESIGN
//! ======
//! The hosted backend stores roles as free-form strings (profile rows and the
//! identity metadata bag). This module closes them into an enum with a single
//! parsing step, so capability checks never touch untyped data. The hierarchy
//! is `admin ⊇ editor ⊇ reviewer`; `advertiser` and `analyst` sit outside the
//! chain and satisfy only their own requirement.

use serde::{Deserialize, Serialize};

/// Application role attached to a profile (or suggested by identity metadata).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Reviewer,
    Advertiser,
    Analyst,
}

impl Role {
    /// Parse a role string as stored in profile rows or metadata bags.
    /// Unknown or empty strings map to `None` rather than a default.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "editor" => Some(Self::Editor),
            "reviewer" => Some(Self::Reviewer),
            "advertiser" => Some(Self::Advertiser),
            "analyst" => Some(Self::Analyst),
            _ => None,
        }
    }

    /// Extract a suggested role from an identity metadata bag.
    ///
    /// The bag is an arbitrary JSON object; only a string-valued `role` key
    /// is honored.
    #[must_use]
    pub fn from_metadata(bag: &serde_json::Value) -> Option<Self> {
        bag.get("role").and_then(|v| v.as_str()).and_then(Self::parse)
    }

    /// Whether this role satisfies a required minimum role.
    ///
    /// `admin` satisfies every requirement. `editor` satisfies `editor` and
    /// `reviewer`. `advertiser`/`analyst` satisfy exactly themselves.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        match self {
            Self::Admin => true,
            Self::Editor => matches!(required, Self::Editor | Self::Reviewer),
            Self::Reviewer => required == Self::Reviewer,
            Self::Advertiser => required == Self::Advertiser,
            Self::Analyst => required == Self::Analyst,
        }
    }

    /// The default role for a freshly created profile: lowest privilege.
    #[must_use]
    pub fn lowest() -> Self {
        Self::Reviewer
    }

    /// Canonical storage string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Reviewer => "reviewer",
            Self::Advertiser => "advertiser",
            Self::Analyst => "analyst",
        }
    }
}

#[cfg(test)]
#[path = "roles_test.rs"]
mod tests;

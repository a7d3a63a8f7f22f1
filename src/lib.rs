//! Headless core of the CLIKA admin console.
//!
//! ARCHITECTURE
//! ============
//! The console shell (pages, charts, forms) renders on top of three seams
//! this crate owns: the [`controller::AuthController`] publishing one
//! consistent auth snapshot, the [`table::TableStore`] row-access trait the
//! CRUD screens consume, and the [`guard::RouteGuard`] decision that gates
//! protected views. The hosted backend is reached through
//! [`backend::AuthBackend`], implemented over its REST auth API.

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod guard;
pub mod profile;
pub mod roles;
pub mod session;
pub mod state;
pub mod table;

pub use backend::http::HttpAuthBackend;
pub use backend::store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use backend::{AuthBackend, OAuthProvider, SessionEvent, SessionEventKind, UserChanges};
pub use config::ConsoleConfig;
pub use controller::AuthController;
pub use error::AuthError;
pub use guard::{GuardDecision, RedirectTarget, RouteGuard};
pub use profile::{Profile, ProfileChanges, ProfileResolver};
pub use roles::Role;
pub use session::{Identity, Session, TokenBundle};
pub use state::AuthSnapshot;
pub use table::{MemoryTableStore, RestTableStore, StoreError, TableStore};

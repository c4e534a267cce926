//! Session and authentication lifecycle for the corps portal.
//!
//! [`SessionManager`] owns the signed-in user for the lifetime of the
//! client. It bootstraps from the backend's persisted session, signs users
//! in and out under fixed time budgets, and follows sign-in/sign-out events
//! pushed by the backend. The rest of the application only reads its state
//! and calls `login`/`logout`.
//!
//! The backend is reached through the [`IdentityBackend`] trait:
//! [`HostedBackend`] talks to the hosted auth and REST services,
//! [`FixtureBackend`] is an in-memory double for tests.

pub mod access;
pub mod backend;
pub mod config;
pub mod error;
mod manager;
pub mod redact;
mod resolve;
pub mod state;
pub mod store;
pub mod user;

pub use access::{AccessDecision, RouteGuard};
pub use backend::{
    AuthEvent, AuthEventKind, AuthEvents, FixtureBackend, HostedBackend, HostedBackendBuilder,
    IdentityBackend, SharedBackend, StoredSession,
};
pub use config::SessionConfig;
pub use error::{AuthError, Result};
pub use manager::SessionManager;
pub use resolve::resolve_user;
pub use state::{SessionPhase, SessionState};
pub use store::{DurableStore, FileStore, MemoryStore, SharedStore};
pub use user::{Account, CadetProfile, Principal, Role, UserRecord, UserRow};

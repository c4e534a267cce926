//! Backend identity and row-store contract.
//!
//! The session manager only talks to the backend through [`IdentityBackend`].
//! [`HostedBackend`] speaks to the hosted auth and REST services;
//! [`FixtureBackend`] is an in-memory stand-in for tests.

mod fixture;
mod hosted;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;
use crate::user::{CadetProfile, Principal, UserRow};

pub use fixture::FixtureBackend;
pub use hosted::{HostedBackend, HostedBackendBuilder, StoredSession};

/// Buffered auth events per subscriber before older ones are dropped.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Kind of auth-state change pushed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthEventKind::InitialSession => "INITIAL_SESSION",
            AuthEventKind::SignedIn => "SIGNED_IN",
            AuthEventKind::SignedOut => "SIGNED_OUT",
            AuthEventKind::TokenRefreshed => "TOKEN_REFRESHED",
            AuthEventKind::UserUpdated => "USER_UPDATED",
        };
        f.write_str(name)
    }
}

/// Auth-state change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    /// Principal of the session after the change, if any.
    pub principal: Option<Principal>,
}

impl AuthEvent {
    pub fn signed_in(principal: Principal) -> Self {
        Self {
            kind: AuthEventKind::SignedIn,
            principal: Some(principal),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            kind: AuthEventKind::SignedOut,
            principal: None,
        }
    }

    pub fn token_refreshed(principal: Principal) -> Self {
        Self {
            kind: AuthEventKind::TokenRefreshed,
            principal: Some(principal),
        }
    }

    /// Whether the event says there is no session any more.
    pub fn ends_session(&self) -> bool {
        self.kind == AuthEventKind::SignedOut || self.principal.is_none()
    }
}

/// Receiving end of an auth-event subscription. Dropping it unsubscribes.
pub type AuthEvents = broadcast::Receiver<AuthEvent>;

/// Minimum backend contract consumed by the session lifecycle.
#[async_trait]
pub trait IdentityBackend: Send + Sync + fmt::Debug {
    /// Principal of the current backend session, or `None` without one.
    async fn current_principal(&self) -> Result<Option<Principal>>;

    /// Verify credentials and open a backend session.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Principal>;

    /// Invalidate the backend session.
    async fn sign_out(&self) -> Result<()>;

    /// Subscribe to auth-state changes for as long as the receiver lives.
    fn subscribe_auth_events(&self) -> AuthEvents;

    /// Look up the application user record for an email address.
    async fn find_user_record_by_email(&self, email: &str) -> Result<Option<UserRow>>;

    /// Look up the cadet profile linked to a principal.
    async fn find_cadet_profile_by_principal_id(
        &self,
        principal_id: &str,
    ) -> Result<Option<CadetProfile>>;
}

/// Backend shared across async contexts.
pub type SharedBackend = Arc<dyn IdentityBackend>;

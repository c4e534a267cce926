//! In-memory backend for tests and offline demos.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};

use super::{AuthEvent, AuthEvents, EVENT_CHANNEL_CAPACITY, IdentityBackend};
use crate::error::{AuthError, Result};
use crate::user::{CadetProfile, Principal, UserRow};

/// Scriptable in-memory [`IdentityBackend`].
///
/// Accounts, user rows, and cadet profiles are seeded directly. Delays are
/// served with `tokio::time::sleep`, so tests on a paused clock run
/// instantly. A delayed sign-in keeps running after its caller gives up
/// and still opens the session, the way a real server finishes a request
/// the client stopped waiting for.
#[derive(Debug, Clone)]
pub struct FixtureBackend {
    inner: Arc<FixtureInner>,
}

#[derive(Debug)]
struct FixtureInner {
    state: Mutex<FixtureState>,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Debug, Default)]
struct FixtureState {
    /// Email → (principal, password).
    accounts: HashMap<String, (Principal, String)>,
    /// Email → user row.
    user_rows: HashMap<String, UserRow>,
    /// Principal id → cadet profile.
    profiles: HashMap<String, CadetProfile>,
    session: Option<Principal>,
    sign_in_delay: Duration,
    session_delay: Duration,
    lookup_delay: Duration,
    unreachable: bool,
    sign_in_calls: usize,
    sign_out_calls: usize,
}

impl Default for FixtureBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(FixtureInner {
                state: Mutex::new(FixtureState::default()),
                events,
            }),
        }
    }

    /// Register credentials. Returns the principal they sign in as.
    pub fn add_account(&self, email: &str, password: &str) -> Principal {
        let principal = Principal::new(uuid::Uuid::new_v4().to_string(), email);
        self.inner.state.lock().accounts.insert(
            email.to_string(),
            (principal.clone(), password.to_string()),
        );
        principal
    }

    /// Insert a row into the `users` table.
    pub fn add_user_record(&self, email: &str, name: &str, role: &str) {
        let row = UserRow {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role: role.to_string(),
        };
        self.inner
            .state
            .lock()
            .user_rows
            .insert(email.to_string(), row);
    }

    /// Link a cadet profile to a principal.
    pub fn add_cadet_profile(&self, principal_id: &str, id: &str, platoon: &str, squad: u32) {
        let profile = CadetProfile {
            id: id.to_string(),
            platoon: platoon.to_string(),
            squad,
        };
        self.inner
            .state
            .lock()
            .profiles
            .insert(principal_id.to_string(), profile);
    }

    /// Replace the current backend session without emitting an event.
    pub fn set_session(&self, principal: Option<Principal>) {
        self.inner.state.lock().session = principal;
    }

    /// Current backend session.
    pub fn session(&self) -> Option<Principal> {
        self.inner.state.lock().session.clone()
    }

    /// Delay before a sign-in completes.
    pub fn set_sign_in_delay(&self, delay: Duration) {
        self.inner.state.lock().sign_in_delay = delay;
    }

    /// Delay before the current session is reported.
    pub fn set_session_delay(&self, delay: Duration) {
        self.inner.state.lock().session_delay = delay;
    }

    /// Delay before each row lookup answers.
    pub fn set_lookup_delay(&self, delay: Duration) {
        self.inner.state.lock().lookup_delay = delay;
    }

    /// Make every call fail as if the network were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.state.lock().unreachable = unreachable;
    }

    /// Push an auth event to subscribers.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.inner.events.send(event);
    }

    pub fn sign_in_calls(&self) -> usize {
        self.inner.state.lock().sign_in_calls
    }

    pub fn sign_out_calls(&self) -> usize {
        self.inner.state.lock().sign_out_calls
    }

    fn check_reachable(&self) -> Result<()> {
        if self.inner.state.lock().unreachable {
            return Err(AuthError::BackendUnreachable(
                "fixture backend offline".to_string(),
            ));
        }
        Ok(())
    }

    async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Validate credentials and open the session.
    fn complete_sign_in(inner: &FixtureInner, email: &str, password: &str) -> Result<Principal> {
        let principal = {
            let mut state = inner.state.lock();
            if state.unreachable {
                return Err(AuthError::BackendUnreachable(
                    "fixture backend offline".to_string(),
                ));
            }
            let principal = match state.accounts.get(email) {
                Some((principal, expected)) if expected == password => principal.clone(),
                _ => return Err(AuthError::InvalidCredentials),
            };
            state.session = Some(principal.clone());
            principal
        };

        let _ = inner.events.send(AuthEvent::signed_in(principal.clone()));
        Ok(principal)
    }
}

#[async_trait]
impl IdentityBackend for FixtureBackend {
    async fn current_principal(&self) -> Result<Option<Principal>> {
        let delay = self.inner.state.lock().session_delay;
        Self::pause(delay).await;
        self.check_reachable()?;
        Ok(self.session())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Principal> {
        let delay = {
            let mut state = self.inner.state.lock();
            state.sign_in_calls += 1;
            state.sign_in_delay
        };

        if delay.is_zero() {
            return Self::complete_sign_in(&self.inner, email, password);
        }

        let (tx, rx) = oneshot::channel();
        let inner = self.inner.clone();
        let email = email.to_string();
        let password = password.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Self::complete_sign_in(&inner, &email, &password));
        });

        rx.await.map_err(|_| {
            AuthError::BackendUnreachable("sign-in task dropped".to_string())
        })?
    }

    async fn sign_out(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            state.sign_out_calls += 1;
            if state.unreachable {
                return Err(AuthError::BackendUnreachable(
                    "fixture backend offline".to_string(),
                ));
            }
            state.session = None;
        }
        self.emit(AuthEvent::signed_out());
        Ok(())
    }

    fn subscribe_auth_events(&self) -> AuthEvents {
        self.inner.events.subscribe()
    }

    async fn find_user_record_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let delay = self.inner.state.lock().lookup_delay;
        Self::pause(delay).await;
        self.check_reachable()?;
        Ok(self.inner.state.lock().user_rows.get(email).cloned())
    }

    async fn find_cadet_profile_by_principal_id(
        &self,
        principal_id: &str,
    ) -> Result<Option<CadetProfile>> {
        let delay = self.inner.state.lock().lookup_delay;
        Self::pause(delay).await;
        self.check_reachable()?;
        Ok(self.inner.state.lock().profiles.get(principal_id).cloned())
    }
}

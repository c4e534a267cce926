//! The session lifecycle: bootstrap, login, logout, and pushed auth events.
//!
//! Every state change goes through one watch channel. Operations that can be
//! superseded capture the state's `epoch` when they start and commit only if
//! it is unchanged, so a result that arrives after its timeout fired, or
//! after a logout, never reaches the session.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::access::{AccessDecision, RouteGuard};
use crate::backend::{AuthEvent, AuthEventKind, AuthEvents, SharedBackend};
use crate::config::SessionConfig;
use crate::error::{AuthError, Result};
use crate::redact::mask_email;
use crate::resolve::resolve_user;
use crate::state::{SessionPhase, SessionState};
use crate::store::{SharedStore, USER_KEY, load_json, save_json};
use crate::user::{Principal, UserRecord};

/// How an operation ended, before it is applied to the session.
#[derive(Debug)]
enum Outcome {
    Authenticated(UserRecord),
    /// The backend has no session.
    NoSession,
    /// Credentials were refused.
    Rejected(AuthError),
    /// The principal could not be resolved into a portal user.
    Failed(AuthError),
    /// The backend timed out or could not be reached.
    Degraded(AuthError),
}

impl Outcome {
    fn from_resolution(result: Result<Option<UserRecord>>) -> Self {
        match result {
            Ok(Some(user)) => Outcome::Authenticated(user),
            Ok(None) => Outcome::NoSession,
            Err(e) if e.is_unreachable() => Outcome::Degraded(e),
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// Owner of the authenticated-user state for the running client.
///
/// Construct one with [`SessionManager::start`] at application start and
/// hand it to whatever needs the session. Dropping it stops the bootstrap
/// and the auth-event listener.
pub struct SessionManager {
    shared: Arc<Shared>,
    tasks: Vec<JoinHandle<()>>,
}

struct Shared {
    backend: SharedBackend,
    store: SharedStore,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    /// Cancelled by logout; replaced with a fresh token each time.
    cancel: Mutex<CancellationToken>,
    /// Serializes writes of the persisted user.
    persist: tokio::sync::Mutex<()>,
    /// Email of a sign-in given up on before the backend answered.
    abandoned_sign_in: Mutex<Option<String>>,
}

/// Marks a bootstrap or login as running for as long as it lives.
struct LoadingGuard {
    shared: Arc<Shared>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.shared.state.send_modify(|s| {
            s.in_flight = s.in_flight.saturating_sub(1);
            if s.in_flight == 0 {
                s.settle_bootstrap();
            }
        });
    }
}

impl SessionManager {
    /// Create the manager, subscribe to auth events, and start bootstrap.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(backend: SharedBackend, store: SharedStore, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::new());
        let shared = Arc::new(Shared {
            backend,
            store,
            config,
            state,
            cancel: Mutex::new(CancellationToken::new()),
            persist: tokio::sync::Mutex::new(()),
            abandoned_sign_in: Mutex::new(None),
        });

        // Subscribe before bootstrap so no event slips between the two.
        let events = shared.backend.subscribe_auth_events();
        let operation = shared.begin();

        let bootstrap = tokio::spawn(shared.clone().bootstrap(operation));
        let listener = tokio::spawn(shared.clone().listen(events));

        Self {
            shared,
            tasks: vec![bootstrap, listener],
        }
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    /// Watch the state. The receiver sees every later transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Wait until no bootstrap or login is running.
    pub async fn ready(&self) -> SessionState {
        let mut rx = self.subscribe();
        if let Ok(state) = rx.wait_for(|s| !s.is_loading()).await {
            return state.clone();
        }
        self.snapshot()
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        self.shared.state.borrow().current_user().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().is_loading()
    }

    pub fn is_admin(&self) -> bool {
        self.shared.state.borrow().is_admin()
    }

    pub fn should_redirect_to_login(&self) -> bool {
        self.shared.state.borrow().should_redirect_to_login()
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.state.borrow().phase()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Check a route's requirements against the current session.
    pub fn authorize(&self, guard: RouteGuard) -> AccessDecision {
        guard.decide(&self.shared.state.borrow())
    }

    /// Sign in with email and password.
    ///
    /// Returns `true` only if the backend accepted the credentials and the
    /// account resolved into a portal user. Credential verification and
    /// account resolution each get the login budget.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        let shared = &self.shared;
        let operation = shared.begin();
        let budget = shared.config.login_budget;
        info!(email = %mask_email(email), "Login attempt");
        shared.abandoned_sign_in.lock().take();

        let signed_in = bounded(
            "login",
            budget,
            &operation.cancel,
            shared.backend.sign_in_with_password(email, password),
        )
        .await;

        let principal = match signed_in {
            None => {
                debug!("Login cancelled");
                shared.abandon_sign_in(email);
                return false;
            }
            Some(Ok(principal)) => principal,
            Some(Err(e)) => {
                if matches!(e, AuthError::OperationTimedOut { .. }) {
                    shared.abandon_sign_in(email);
                }
                let outcome = if e.is_unreachable() {
                    Outcome::Degraded(e)
                } else {
                    Outcome::Rejected(e)
                };
                shared.settle("login", operation.epoch, outcome).await;
                return false;
            }
        };

        let resolved = bounded(
            "account resolution",
            budget,
            &operation.cancel,
            resolve_user(shared.backend.as_ref(), &principal),
        )
        .await;

        let Some(resolved) = resolved else {
            debug!("Login cancelled");
            return false;
        };

        // A session the login gave up on must not outlive it
        let outcome = Outcome::from_resolution(resolved.map(Some));
        let close_backend = matches!(outcome, Outcome::Failed(_) | Outcome::Degraded(_));
        let authenticated = shared.settle("login", operation.epoch, outcome).await;

        if close_backend {
            shared.close_backend_session().await;
        }
        authenticated
    }

    /// Sign out. Never fails; backend errors are only logged.
    pub async fn logout(&self) {
        let shared = &self.shared;
        info!("Logging out user");

        {
            let mut cancel = shared.cancel.lock();
            cancel.cancel();
            *cancel = CancellationToken::new();
        }
        shared.state.send_modify(|s| {
            s.epoch += 1;
            s.invalidate();
        });
        shared.forget_user().await;

        match tokio::time::timeout(shared.config.sign_out_budget, shared.backend.sign_out()).await {
            Ok(Ok(())) => debug!("Backend session closed"),
            Ok(Err(e)) => warn!(error = %e, code = e.code(), "Backend sign-out failed"),
            Err(_) => warn!(
                budget_secs = shared.config.sign_out_budget.as_secs(),
                "Backend sign-out timed out"
            ),
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shared.cancel.lock().cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &*self.shared.state.borrow())
            .field("config", &self.shared.config)
            .finish()
    }
}

/// Epoch and cancellation of one running operation.
struct Operation {
    epoch: u64,
    cancel: CancellationToken,
    _loading: LoadingGuard,
}

/// Race `fut` against its budget and the logout token.
///
/// `None` means the operation was cancelled; the loser of the race is
/// dropped, so nothing it would have done happens.
async fn bounded<T>(
    operation: &'static str,
    budget: Duration,
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Option<Result<T>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = tokio::time::timeout(budget, fut) => Some(
            result.unwrap_or(Err(AuthError::OperationTimedOut { operation, budget }))
        ),
    }
}

impl Shared {
    /// Start a loading operation that supersedes everything before it.
    fn begin(self: &Arc<Self>) -> Operation {
        let mut epoch = 0;
        self.state.send_modify(|s| {
            s.epoch += 1;
            s.in_flight += 1;
            epoch = s.epoch;
        });
        Operation {
            epoch,
            cancel: self.cancel.lock().clone(),
            _loading: LoadingGuard {
                shared: self.clone(),
            },
        }
    }

    async fn bootstrap(self: Arc<Self>, operation: Operation) {
        match load_json::<UserRecord>(self.store.as_ref(), USER_KEY).await {
            Ok(Some(user)) => {
                debug!(user_id = %user.id, "Warm start from persisted user");
                self.state.send_if_modified(|s| {
                    if s.epoch != operation.epoch {
                        return false;
                    }
                    s.set_cached_user(user);
                    true
                });
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable persisted user"),
        }

        let backend = self.backend.clone();
        let checked = bounded(
            "bootstrap",
            self.config.bootstrap_budget,
            &operation.cancel,
            async move {
                match backend.current_principal().await? {
                    Some(principal) => resolve_user(backend.as_ref(), &principal).await.map(Some),
                    None => Ok(None),
                }
            },
        )
        .await;

        match checked {
            Some(result) => {
                self.settle("bootstrap", operation.epoch, Outcome::from_resolution(result))
                    .await;
            }
            None => debug!("Bootstrap cancelled"),
        }
    }

    /// Apply an outcome if `epoch` is still current. Returns whether the
    /// session ended up authenticated by it.
    async fn settle(&self, operation: &'static str, epoch: u64, outcome: Outcome) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|s| {
            if s.epoch != epoch {
                return false;
            }
            applied = true;
            match &outcome {
                Outcome::Authenticated(user) => s.authenticate(user.clone()),
                Outcome::NoSession | Outcome::Rejected(_) => s.end_session(),
                Outcome::Failed(_) => s.invalidate(),
                Outcome::Degraded(_) => s.time_out(),
            }
            true
        });

        if !applied {
            debug!(operation, "Discarding superseded result");
            return false;
        }

        match outcome {
            Outcome::Authenticated(user) => {
                info!(
                    operation,
                    user_id = %user.id,
                    role = %user.role,
                    "Session authenticated"
                );
                self.remember_user(epoch, &user).await;
                true
            }
            Outcome::NoSession => {
                debug!(operation, "No active session");
                self.forget_user().await;
                false
            }
            Outcome::Rejected(e) | Outcome::Failed(e) => {
                warn!(operation, error = %e, code = e.code(), "Authentication failed");
                self.forget_user().await;
                false
            }
            Outcome::Degraded(e) => {
                warn!(operation, error = %e, code = e.code(), "Session forced out");
                self.forget_user().await;
                false
            }
        }
    }

    async fn remember_user(&self, epoch: u64, user: &UserRecord) {
        let _lock = self.persist.lock().await;
        if self.state.borrow().epoch != epoch {
            return;
        }
        if let Err(e) = save_json(self.store.as_ref(), USER_KEY, user).await {
            warn!(error = %e, "Failed to persist user");
        }
    }

    async fn forget_user(&self) {
        let _lock = self.persist.lock().await;
        if let Err(e) = self.store.remove(USER_KEY).await {
            warn!(error = %e, "Failed to remove persisted user");
        }
    }

    fn abandon_sign_in(&self, email: &str) {
        *self.abandoned_sign_in.lock() = Some(email.to_lowercase());
    }

    /// Whether `principal` is the sign-in a login gave up on. Consumes the
    /// record on a match.
    fn take_abandoned(&self, principal: &Principal) -> bool {
        let mut abandoned = self.abandoned_sign_in.lock();
        if abandoned
            .as_deref()
            .is_some_and(|email| email == principal.email.to_lowercase())
        {
            abandoned.take();
            return true;
        }
        false
    }

    /// Best-effort backend sign-out for a session nobody will use.
    async fn close_backend_session(&self) {
        match tokio::time::timeout(self.config.sign_out_budget, self.backend.sign_out()).await {
            Ok(Ok(())) => debug!("Closed stale backend session"),
            Ok(Err(e)) => warn!(error = %e, "Failed to close stale backend session"),
            Err(_) => warn!("Timed out closing stale backend session"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Auth events
    // ─────────────────────────────────────────────────────────────────────────

    async fn listen(self: Arc<Self>, mut events: AuthEvents) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle_event(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Auth event listener fell behind");
                }
                Err(RecvError::Closed) => {
                    debug!("Auth event stream closed");
                    break;
                }
            }
        }
    }

    async fn handle_event(&self, event: AuthEvent) {
        debug!(event = %event.kind, "Auth state changed");

        if event.ends_session() {
            self.on_signed_out().await;
            return;
        }

        match (event.kind, event.principal) {
            (AuthEventKind::SignedIn, Some(principal)) => self.on_signed_in(principal).await,
            (kind, _) => debug!(event = %kind, "Ignoring auth event"),
        }
    }

    async fn on_signed_out(&self) {
        let (epoch, user_id) = {
            let state = self.state.borrow();
            match state.current_user() {
                Some(user) => (state.epoch, user.id.clone()),
                None => return,
            }
        };

        // Events are delivered late; a newer sign-in may already own the session.
        if self
            .backend_principal()
            .await
            .is_some_and(|principal| principal.id == user_id)
        {
            debug!("Ignoring stale sign-out event");
            return;
        }

        let ended = self.state.send_if_modified(|s| {
            if s.epoch != epoch {
                return false;
            }
            s.epoch += 1;
            s.sign_out_passive();
            true
        });

        if ended {
            info!("Backend session ended");
            self.forget_user().await;
        }
    }

    async fn on_signed_in(&self, principal: Principal) {
        // The running bootstrap or login owns this sign-in.
        if self.state.borrow().is_loading() {
            return;
        }

        let live = self.backend_principal().await;
        if live.as_ref().is_none_or(|live| live.id != principal.id) {
            debug!(principal_id = %principal.id, "Ignoring stale sign-in event");
            return;
        }

        if self.take_abandoned(&principal) {
            info!(
                principal_id = %principal.id,
                "Closing backend session from an abandoned sign-in"
            );
            self.close_backend_session().await;
            return;
        }

        let epoch = {
            let state = self.state.borrow();
            if state.is_loading()
                || state
                    .current_user()
                    .is_some_and(|user| user.id == principal.id)
            {
                return;
            }
            state.epoch
        };

        let cancel = self.cancel.lock().clone();
        let resolved = bounded(
            "account resolution",
            self.config.login_budget,
            &cancel,
            resolve_user(self.backend.as_ref(), &principal),
        )
        .await;

        if let Some(result) = resolved {
            let outcome = Outcome::from_resolution(result.map(Some));
            self.settle("sign-in event", epoch, outcome).await;
        }
    }

    /// Principal the backend reports right now; `None` when it has no
    /// session or cannot say.
    async fn backend_principal(&self) -> Option<Principal> {
        let cancel = self.cancel.lock().clone();
        let checked = bounded(
            "session check",
            self.config.login_budget,
            &cancel,
            self.backend.current_principal(),
        )
        .await;

        match checked {
            Some(Ok(principal)) => principal,
            Some(Err(e)) => {
                debug!(error = %e, "Session check failed");
                None
            }
            None => None,
        }
    }
}

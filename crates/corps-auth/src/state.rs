//! Observable session state.

use std::fmt;

use serde::Serialize;

use crate::user::UserRecord;

/// Phase of the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Startup check has not finished yet.
    Bootstrapping,
    Unauthenticated,
    Authenticated,
    /// An operation ran out of time and the session was forced out.
    TimedOut,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Bootstrapping => "bootstrapping",
            SessionPhase::Unauthenticated => "unauthenticated",
            SessionPhase::Authenticated => "authenticated",
            SessionPhase::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Snapshot of the session as the application sees it.
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: SessionPhase,
    current_user: Option<UserRecord>,
    cached_user: Option<UserRecord>,
    redirect_to_login: bool,
    /// Bumped whenever an operation supersedes the ones before it.
    pub(crate) epoch: u64,
    /// Bootstrap and login calls still running.
    pub(crate) in_flight: u32,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            phase: SessionPhase::Bootstrapping,
            current_user: None,
            cached_user: None,
            redirect_to_login: false,
            epoch: 0,
            in_flight: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The signed-in user, or `None` when unauthenticated.
    pub fn current_user(&self) -> Option<&UserRecord> {
        self.current_user.as_ref()
    }

    /// Last user persisted on this machine. For display while loading only;
    /// never an authorization input.
    pub fn cached_user(&self) -> Option<&UserRecord> {
        self.cached_user.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn is_admin(&self) -> bool {
        self.current_user.as_ref().is_some_and(UserRecord::is_admin)
    }

    /// Set when the session was forced out; cleared by the next sign-in.
    pub fn should_redirect_to_login(&self) -> bool {
        self.redirect_to_login
    }

    // Transitions. Each one leaves `current_user` and `cached_user` in step.

    pub(crate) fn authenticate(&mut self, user: UserRecord) {
        self.phase = SessionPhase::Authenticated;
        self.cached_user = Some(user.clone());
        self.current_user = Some(user);
        self.redirect_to_login = false;
    }

    /// No session, or credentials rejected. Leaves the redirect flag alone.
    pub(crate) fn end_session(&mut self) {
        self.clear_user();
        self.phase = SessionPhase::Unauthenticated;
    }

    /// Forced logout.
    pub(crate) fn invalidate(&mut self) {
        self.clear_user();
        self.phase = SessionPhase::Unauthenticated;
        self.redirect_to_login = true;
    }

    pub(crate) fn time_out(&mut self) {
        self.clear_user();
        self.phase = SessionPhase::TimedOut;
        self.redirect_to_login = true;
    }

    /// The backend reported the session gone on its own.
    pub(crate) fn sign_out_passive(&mut self) {
        self.clear_user();
        if self.phase == SessionPhase::Authenticated {
            self.phase = SessionPhase::Unauthenticated;
        }
    }

    pub(crate) fn set_cached_user(&mut self, user: UserRecord) {
        self.cached_user = Some(user);
    }

    /// Bootstrap finished without deciding the phase.
    pub(crate) fn settle_bootstrap(&mut self) {
        if self.phase == SessionPhase::Bootstrapping {
            self.phase = SessionPhase::Unauthenticated;
        }
    }

    fn clear_user(&mut self) {
        self.current_user = None;
        self.cached_user = None;
    }
}

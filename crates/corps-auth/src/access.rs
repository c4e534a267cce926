//! Route access decisions derived from the session.

use serde::Serialize;

use crate::state::SessionState;

/// Requirements a route places on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteGuard {
    pub require_auth: bool,
    pub require_admin: bool,
}

impl RouteGuard {
    /// Open to everyone.
    pub fn public() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self {
            require_auth: true,
            require_admin: false,
        }
    }

    pub fn admin() -> Self {
        Self {
            require_auth: true,
            require_admin: true,
        }
    }

    /// Decide what to do with a visitor in `state`.
    pub fn decide(&self, state: &SessionState) -> AccessDecision {
        if state.is_loading() {
            return AccessDecision::Wait;
        }
        if self.require_auth && state.current_user().is_none() {
            return AccessDecision::RedirectToLogin;
        }
        if self.require_admin && !state.is_admin() {
            return AccessDecision::RedirectHome;
        }
        AccessDecision::Allow
    }
}

/// Outcome of a [`RouteGuard`] check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    /// Session is still loading; show a spinner.
    Wait,
    RedirectToLogin,
    /// Signed in but not allowed here.
    RedirectHome,
}

//! Time budgets for session operations.

use std::time::Duration;

/// Budget for the startup session check.
pub const DEFAULT_BOOTSTRAP_BUDGET: Duration = Duration::from_secs(15);

/// Budget for each stage of a login.
pub const DEFAULT_LOGIN_BUDGET: Duration = Duration::from_secs(10);

/// Budget for the backend sign-out call.
pub const DEFAULT_SIGN_OUT_BUDGET: Duration = Duration::from_secs(10);

/// Configuration for the session manager.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long bootstrap may take before the session is forced out.
    pub bootstrap_budget: Duration,

    /// How long credential verification, and then account resolution, may
    /// each take during login.
    pub login_budget: Duration,

    /// How long to wait for the backend when signing out.
    pub sign_out_budget: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bootstrap_budget: DEFAULT_BOOTSTRAP_BUDGET,
            login_budget: DEFAULT_LOGIN_BUDGET,
            sign_out_budget: DEFAULT_SIGN_OUT_BUDGET,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bootstrap_budget(mut self, budget: Duration) -> Self {
        self.bootstrap_budget = budget;
        self
    }

    pub fn with_login_budget(mut self, budget: Duration) -> Self {
        self.login_budget = budget;
        self
    }

    pub fn with_sign_out_budget(mut self, budget: Duration) -> Self {
        self.sign_out_budget = budget;
        self
    }
}

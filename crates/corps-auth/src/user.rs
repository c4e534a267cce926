//! Account types: backend principals, stored rows, and the resolved user.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Portal role of a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Cadet,
}

impl Role {
    /// Parse a role column value. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Role::Admin),
            "cadet" => Some(Role::Cadet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Cadet => "cadet",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An identity the backend has authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
}

impl Principal {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

/// Row of the application-level `users` table.
///
/// `role` is kept as raw text; [`Role::parse`] decides whether it is usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

/// Cadet profile linked to a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadetProfile {
    pub id: String,
    pub platoon: String,
    pub squad: u32,
}

/// Outcome of role branching for a resolved account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Account {
    Admin,
    /// A cadet account may exist before its profile is provisioned.
    Cadet { profile: Option<CadetProfile> },
}

impl Account {
    pub fn role(&self) -> Role {
        match self {
            Account::Admin => Role::Admin,
            Account::Cadet { .. } => Role::Cadet,
        }
    }

    /// Build the user record the session exposes.
    pub fn into_user_record(self, principal: &Principal, display_name: String) -> UserRecord {
        let role = self.role();
        let profile = match self {
            Account::Admin => None,
            Account::Cadet { profile } => profile,
        };

        UserRecord {
            id: principal.id.clone(),
            display_name,
            role,
            platoon: profile.as_ref().map(|p| p.platoon.clone()),
            squad: profile.as_ref().map(|p| p.squad),
            cadet_profile_id: profile.map(|p| p.id),
        }
    }
}

/// The signed-in user as the rest of the application sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platoon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squad: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadet_profile_id: Option<String>,
}

impl UserRecord {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_cadet_profile(&self) -> bool {
        self.cadet_profile_id.is_some()
    }
}

//! Resolution of an authenticated principal into a portal user.
//!
//! Applied identically during bootstrap, login, and pushed sign-ins:
//! 1. the principal must have a user record (matched by email),
//! 2. the record's role must be known,
//! 3. cadets additionally get their profile, when one exists.

use tracing::{debug, warn};

use crate::backend::IdentityBackend;
use crate::error::{AuthError, Result};
use crate::redact::mask_email;
use crate::user::{Account, CadetProfile, Principal, Role, UserRecord};

/// Resolve `principal` into the [`UserRecord`] the session exposes.
pub async fn resolve_user(
    backend: &dyn IdentityBackend,
    principal: &Principal,
) -> Result<UserRecord> {
    let row = backend
        .find_user_record_by_email(&principal.email)
        .await?
        .ok_or_else(|| AuthError::NoUserRecord {
            email: principal.email.clone(),
        })?;

    let account = match Role::parse(&row.role) {
        Some(Role::Admin) => Account::Admin,
        Some(Role::Cadet) => Account::Cadet {
            profile: cadet_profile(backend, principal).await?,
        },
        None => return Err(AuthError::NoRoleMatch(row.role)),
    };

    debug!(
        principal_id = %principal.id,
        email = %mask_email(&principal.email),
        role = %account.role(),
        "Account resolved"
    );

    Ok(account.into_user_record(principal, row.name))
}

/// Fetch the cadet profile. Lookup failures other than an unreachable
/// backend count as "no profile yet".
async fn cadet_profile(
    backend: &dyn IdentityBackend,
    principal: &Principal,
) -> Result<Option<CadetProfile>> {
    match backend.find_cadet_profile_by_principal_id(&principal.id).await {
        Ok(Some(profile)) => Ok(Some(profile)),
        Ok(None) => {
            warn!(principal_id = %principal.id, "No cadet profile found for user");
            Ok(None)
        }
        Err(e) if e.is_unreachable() => Err(e),
        Err(e) => {
            warn!(
                principal_id = %principal.id,
                error = %e,
                code = e.code(),
                "Cadet profile lookup failed, continuing without profile"
            );
            Ok(None)
        }
    }
}

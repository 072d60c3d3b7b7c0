//! Sign-in by business key
//!
//! Identification only: anyone who knows a member's business key can act as
//! that member. There is no password and no server-side authorization, so
//! this must not be treated as a security boundary.

use tracing::info;

use crate::model::StaffMember;
use crate::org::OrgHierarchy;
use crate::store::{LocalStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no staff member has business key '{0}'")]
    UnknownBusinessKey(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Exact match on the business key, ignoring surrounding whitespace
pub fn identify<'a>(
    org: &'a OrgHierarchy,
    business_key: &str,
) -> Result<&'a StaffMember, SessionError> {
    let key = business_key.trim();
    org.find_by_business_key(key)
        .ok_or_else(|| SessionError::UnknownBusinessKey(key.to_string()))
}

/// Identify and remember the member for later runs
pub fn login(
    store: &LocalStore,
    org: &OrgHierarchy,
    business_key: &str,
) -> Result<StaffMember, SessionError> {
    let member = identify(org, business_key)?;
    store.set_current_user(&member.id)?;
    info!(staff_id = %member.id, role = %member.role, "Signed in");
    Ok(member.clone())
}

/// The remembered member, re-read from the current hierarchy
///
/// A remembered id that no longer resolves is forgotten.
pub fn restore(
    store: &LocalStore,
    org: &OrgHierarchy,
) -> Result<Option<StaffMember>, SessionError> {
    let Some(id) = store.current_user()? else {
        return Ok(None);
    };
    match org.get(&id) {
        Some(member) => Ok(Some(member.clone())),
        None => {
            store.clear_current_user()?;
            Ok(None)
        }
    }
}

pub fn logout(store: &LocalStore) -> Result<(), SessionError> {
    store.clear_current_user()?;
    Ok(())
}

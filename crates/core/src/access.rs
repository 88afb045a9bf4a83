//! Ownership-based authorization rules.
//!
//! Admins manage everything, managers manage the houses assigned to them,
//! tenants only read what they are a party to. Records the caller may not
//! see are reported as missing so their existence does not leak.

use crate::error::CoreError;
use crate::roles::{ActingUser, Role};
use crate::types::DbId;

/// Whether `actor` manages a house whose manager is `house_manager_id`.
pub fn manages_house(actor: &ActingUser, house_manager_id: Option<DbId>) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Manager => house_manager_id == Some(actor.user_id),
        Role::Tenant => false,
    }
}

/// Require write access to a record under a house.
///
/// Tenants get `Forbidden` (the role can never write); managers of other
/// houses get `NotFound`.
pub fn ensure_manages(
    actor: &ActingUser,
    house_manager_id: Option<DbId>,
    entity: &'static str,
    id: DbId,
) -> Result<(), CoreError> {
    if actor.role == Role::Tenant {
        return Err(CoreError::Forbidden(
            "Admin or manager role required".into(),
        ));
    }
    if manages_house(actor, house_manager_id) {
        Ok(())
    } else {
        Err(CoreError::NotFound { entity, id })
    }
}

/// Whether `actor` may read a record under a house that involves the given
/// tenants.
pub fn can_view(actor: &ActingUser, house_manager_id: Option<DbId>, tenant_ids: &[DbId]) -> bool {
    match actor.role {
        Role::Tenant => tenant_ids.contains(&actor.user_id),
        _ => manages_house(actor, house_manager_id),
    }
}

/// Require read access; invisible records are reported as missing.
pub fn ensure_visible(visible: bool, entity: &'static str, id: DbId) -> Result<(), CoreError> {
    if visible {
        Ok(())
    } else {
        Err(CoreError::NotFound { entity, id })
    }
}

//! Canonical account-to-JSON projections. Every endpoint that returns "the
//! user object" composes from these, so no two handlers can drift apart in
//! what they expose.

use pulseid_core::Account;
use serde_json::{Value, json};

/// The public view of an account, safe to return to its owner.
pub fn user_view(account: &Account) -> Value {
    json!({
        "id": account.id,
        "firstName": account.first_name,
        "lastName": account.last_name,
        "name": account.full_name(),
        "email": account.email,
        "phone": account.phone,
        "role": account.role,
        "isVerified": account.is_verified,
        "googleLinked": account.google_id.is_some(),
        "status": account.state().as_str(),
        "lastLogin": account.last_login,
        "createdAt": account.created_at,
    })
}

/// The admin view: the public view plus lifecycle bookkeeping. Never exposes
/// credential material or outstanding one-time tokens.
pub fn admin_user_view(account: &Account) -> Value {
    let mut view = user_view(account);
    let extra = json!({
        "isDeleted": account.is_deleted,
        "deletedAt": account.deleted_at,
        "isAutoDeactivated": account.is_auto_deactivated,
        "autoDeactivatedAt": account.auto_deactivated_at,
        "reactivationAttempts": account.reactivation_attempts,
        "lastReactivationAttempt": account.last_reactivation_attempt,
        "reactivatedAt": account.reactivated_at,
        "originalEmail": account.original_email,
        "originalPhone": account.original_phone,
        "lastActivity": account.last_activity,
    });
    if let (Some(view), Some(extra)) = (view.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            view.insert(k.clone(), v.clone());
        }
    }
    view
}

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use pulseid_core::{AccountStore, AuthError, Role};

use crate::error::ApiError;
use crate::session::AdminUser;
use crate::state::AppState;
use crate::views::admin_user_view;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

pub async fn list_users<A: AccountStore>(
    State(state): State<AppState<A>>,
    _admin: AdminUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Value>, ApiError> {
    let accounts = state
        .account_store
        .list_accounts(query.include_deleted)
        .await?;
    let users: Vec<Value> = accounts.iter().map(admin_user_view).collect();
    Ok(Json(json!({
        "total": users.len(),
        "users": users,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

/// Role changes reach existing sessions at their next refresh, not
/// immediately: access claims are trusted for their one-hour window.
pub async fn update_role<A: AccountStore>(
    State(state): State<AppState<A>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<Value>, ApiError> {
    let role = Role::parse(&body.role)
        .ok_or_else(|| AuthError::Validation(format!("Unknown role: {}", body.role)))?;

    if !state.account_store.update_role(&id, role).await? {
        return Err(AuthError::AccountNotFound.into());
    }
    tracing::info!(user = %id, role = role.as_str(), admin = %admin.id, "role updated");

    let account = state
        .account_store
        .get_account(&id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;
    Ok(Json(json!({
        "message": "Role updated",
        "user": admin_user_view(&account),
    })))
}

pub async fn delete_user<A: AccountStore>(
    State(state): State<AppState<A>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let account = state
        .account_store
        .get_account(&id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;
    if account.is_deleted {
        return Err(AuthError::Validation("Account is already deleted".to_string()).into());
    }

    state.account_store.soft_delete(&id).await?;
    tracing::info!(user = %id, admin = %admin.id, "account soft-deleted by admin");
    Ok(Json(json!({ "message": "Account deleted" })))
}

pub async fn restore_user<A: AccountStore>(
    State(state): State<AppState<A>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .account_store
        .get_account(&id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;

    let account = state
        .account_store
        .restore(&id)
        .await?
        .ok_or_else(|| AuthError::Validation("Account is not deleted".to_string()))?;
    tracing::info!(user = %id, admin = %admin.id, "account restored");

    Ok(Json(json!({
        "message": "Account restored",
        "user": admin_user_view(&account),
    })))
}

pub async fn deactivation_stats<A: AccountStore>(
    State(state): State<AppState<A>>,
    _admin: AdminUser,
) -> Result<Json<Value>, ApiError> {
    let stats = state.account_store.deactivation_stats(Utc::now()).await?;
    Ok(Json(json!({
        "totalAccounts": stats.total_accounts,
        "softDeleted": stats.soft_deleted,
        "autoDeactivated": stats.auto_deactivated,
        "expiredReactivationTokens": stats.expired_reactivation_tokens,
        "pendingReactivations": stats.pending_reactivations,
        "deactivatedLastWeek": stats.deactivated_last_week,
        "reactivatedLastWeek": stats.reactivated_last_week,
    })))
}

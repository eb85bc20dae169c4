use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use pulseid_core::AccountStore;

use crate::email;
use crate::error::ApiError;
use crate::state::AppState;
use crate::views::user_view;
use crate::routes;

const GENERIC_REACTIVATION_MESSAGE: &str =
    "If that address belongs to a deactivated account, a reactivation email has been sent.";

#[derive(Debug, Deserialize)]
pub struct RequestReactivationRequest {
    pub email: String,
}

/// Explicit reactivation path for users who cannot complete a normal login.
/// Generic response regardless of account existence or state.
pub async fn request_reactivation<A: AccountStore>(
    State(state): State<AppState<A>>,
    Json(body): Json<RequestReactivationRequest>,
) -> Result<Json<Value>, ApiError> {
    let email_addr = body.email.trim().to_lowercase();
    let generic = Json(json!({ "message": GENERIC_REACTIVATION_MESSAGE }));

    let Some(account) = state.account_store.find_by_email(&email_addr).await? else {
        return Ok(generic);
    };
    if !account.is_auto_deactivated {
        return Ok(generic);
    }

    let hours = state.config.inactivity.reactivation_token_hours;
    let token = pulseid_crypto::reactivation_token();
    state
        .account_store
        .set_reactivation_token(&account.id, &token, Utc::now() + Duration::hours(hours))
        .await?;

    let (subject, mail_body) =
        email::reactivation_email(&token, &state.config.frontend_url, hours);
    email::send_in_background(state.mailer.clone(), account.email.clone(), subject, mail_body);
    tracing::info!(
        user = %account.id,
        attempts = account.reactivation_attempts + 1,
        "reactivation token issued"
    );

    Ok(generic)
}

#[derive(Debug, Deserialize)]
pub struct ReactivateRequest {
    pub token: String,
}

pub async fn reactivate<A: AccountStore>(
    State(state): State<AppState<A>>,
    jar: CookieJar,
    Json(body): Json<ReactivateRequest>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let account = state
        .account_store
        .reactivate_with_token(&body.token, Utc::now())
        .await?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "InvalidToken",
                "Reactivation token is invalid or has expired",
            )
        })?;
    tracing::info!(user = %account.id, "account reactivated via token");

    let (subject, mail_body) = email::reactivated_email(&account.first_name);
    email::send_in_background(state.mailer.clone(), account.email.clone(), subject, mail_body);

    let (jar, access_token) = routes::issue_session(&state, jar, &account)?;
    Ok((
        jar,
        Json(json!({
            "message": "Welcome back! Your account has been reactivated.",
            "user": user_view(&account),
            "accessToken": access_token,
            "wasReactivated": true,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct AccountStatusQuery {
    pub email: String,
}

/// Public probe used by the login screen to route the user to the right
/// remediation (verify, reactivate, or plain login) before they submit.
pub async fn check_account_status<A: AccountStore>(
    State(state): State<AppState<A>>,
    Query(query): Query<AccountStatusQuery>,
) -> Result<Json<Value>, ApiError> {
    let email_addr = query.email.trim().to_lowercase();
    match state.account_store.find_any_by_email(&email_addr).await? {
        Some(account) => Ok(Json(json!({
            "exists": true,
            "status": account.state().as_str(),
            "googleLinked": account.google_id.is_some(),
        }))),
        None => Ok(Json(json!({ "exists": false }))),
    }
}

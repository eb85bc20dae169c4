use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use pulseid_core::{AccountStore, AuthError};

use crate::email;
use crate::error::ApiError;
use crate::state::AppState;
use crate::routes;

const GENERIC_RESET_MESSAGE: &str =
    "If an account exists for that address, a password reset email has been sent.";

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Always answers with the same generic 200, whether or not the account
/// exists and whether or not the email went out: the response must not be an
/// account-enumeration oracle. A dispatch failure here is operator-visible
/// only, since the email is the sole carrier of the reset token.
pub async fn forgot_password<A: AccountStore>(
    State(state): State<AppState<A>>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let email_addr = body.email.trim().to_lowercase();
    let generic = Json(json!({ "message": GENERIC_RESET_MESSAGE }));

    let Some(account) = state.account_store.find_by_email(&email_addr).await? else {
        return Ok(generic);
    };

    // A reset request from a dormant user is a return: wake the account so
    // the completed reset logs them straight in.
    if account.is_auto_deactivated {
        state
            .account_store
            .reactivate_if_auto_deactivated(&account.id)
            .await?;
        tracing::info!(user = %account.id, "account reactivated via password reset request");
    }

    let token = pulseid_crypto::reset_token();
    state
        .account_store
        .set_reset_token(
            &account.id,
            &token,
            pulseid_crypto::reset_token_expiry(Utc::now()),
        )
        .await?;

    let (subject, mail_body) = email::password_reset_email(&token, &state.config.frontend_url);
    if let Err(e) = state.mailer.send(&account.email, &subject, &mail_body).await {
        tracing::error!(user = %account.id, error = %e, "password reset email failed to send");
    }

    Ok(generic)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

pub async fn reset_password<A: AccountStore>(
    State(state): State<AppState<A>>,
    jar: CookieJar,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    if body.new_password.len() < 6 {
        return Err(
            AuthError::Validation("Password must be at least 6 characters".to_string()).into(),
        );
    }

    let new_hash = routes::hash_password_blocking(body.new_password).await?;

    // One conditional write: new hash in, token out, deactivation cleared.
    // Unknown, expired, and already-consumed tokens are indistinguishable.
    let account = state
        .account_store
        .consume_reset_token(&body.token, &new_hash, Utc::now())
        .await?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "InvalidToken",
                "Password reset token is invalid or has expired",
            )
        })?;
    tracing::info!(user = %account.id, "password reset completed");

    let (jar, access_token) = routes::issue_session(&state, jar, &account)?;
    Ok((
        jar,
        Json(json!({
            "message": "Password has been reset successfully",
            "accessToken": access_token,
        })),
    ))
}

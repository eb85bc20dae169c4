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
use crate::views::user_view;
use crate::routes;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub user_id: String,
    pub code: String,
}

pub async fn verify_email<A: AccountStore>(
    State(state): State<AppState<A>>,
    jar: CookieJar,
    Json(body): Json<VerifyEmailRequest>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let account = state
        .account_store
        .get_account(&body.user_id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;

    if account.is_deleted {
        return Err(AuthError::AccountDeleted.into());
    }

    if account.is_verified {
        // Idempotent: verifying twice (double-click, refresh) still lands
        // the user in a session.
        let (jar, access_token) = routes::issue_session(&state, jar, &account)?;
        return Ok((
            jar,
            Json(json!({
                "message": "Email is already verified.",
                "user": user_view(&account),
                "accessToken": access_token,
            })),
        ));
    }

    // A wrong code is reported as wrong even when the stored one has also
    // expired; the expiry message would confirm a correct guess.
    match &account.verification_code {
        Some(stored) if *stored == body.code => {}
        _ => {
            return Err(AuthError::Validation("Invalid verification code".to_string()).into());
        }
    }

    let expired = account
        .verification_code_expires
        .map_or(true, |expires| expires < Utc::now());
    if expired {
        let code = pulseid_crypto::verification_code();
        state
            .account_store
            .set_verification_code(
                &account.id,
                &code,
                pulseid_crypto::verification_code_expiry(Utc::now()),
            )
            .await?;
        let (subject, mail_body) = email::verification_email(&code);
        email::send_in_background(state.mailer.clone(), account.email.clone(), subject, mail_body);

        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "CodeExpired",
            "Verification code expired. A new code has been sent to your email.",
        ));
    }

    // Conditional on the code still matching; a lost race means a concurrent
    // request already verified, which is the same success.
    state.account_store.mark_verified(&account.id, &body.code).await?;

    let account = state
        .account_store
        .get_account(&account.id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;
    tracing::info!(user = %account.id, "email verified");

    let (jar, access_token) = routes::issue_session(&state, jar, &account)?;
    Ok((
        jar,
        Json(json!({
            "message": "Email verified successfully",
            "user": user_view(&account),
            "accessToken": access_token,
        })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendVerificationRequest {
    pub user_id: String,
}

pub async fn resend_verification<A: AccountStore>(
    State(state): State<AppState<A>>,
    Json(body): Json<ResendVerificationRequest>,
) -> Result<Json<Value>, ApiError> {
    let account = state
        .account_store
        .get_account(&body.user_id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;

    if account.is_deleted {
        return Err(AuthError::AccountDeleted.into());
    }
    if account.is_verified {
        return Ok(Json(json!({ "message": "Email is already verified." })));
    }

    let code = pulseid_crypto::verification_code();
    state
        .account_store
        .set_verification_code(
            &account.id,
            &code,
            pulseid_crypto::verification_code_expiry(Utc::now()),
        )
        .await?;
    let (subject, mail_body) = email::verification_email(&code);
    email::send_in_background(state.mailer.clone(), account.email.clone(), subject, mail_body);

    Ok(Json(json!({
        "message": "A new verification code has been sent to your email."
    })))
}

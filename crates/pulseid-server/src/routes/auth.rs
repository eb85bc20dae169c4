use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use pulseid_core::{Account, AccountState, AccountStore, AuthError, NewAccount};

use crate::email;
use crate::error::ApiError;
use crate::google::GoogleIdentity;
use crate::session::{AuthenticatedUser, VerifiedUser};
use crate::state::AppState;
use crate::views::user_view;
use crate::{cookies, routes};

// ---------------------------------------------------------------------------
// register
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn validate_registration(body: &RegisterRequest) -> Result<(), AuthError> {
    if body.first_name.trim().is_empty() {
        return Err(AuthError::Validation("First name is required".to_string()));
    }
    if body.last_name.trim().is_empty() {
        return Err(AuthError::Validation("Last name is required".to_string()));
    }
    if !valid_email(body.email.trim()) {
        return Err(AuthError::Validation(
            "Please provide a valid email".to_string(),
        ));
    }
    if body.password.len() < 6 {
        return Err(AuthError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    Ok(())
}

fn send_verification_code<A: AccountStore>(state: &AppState<A>, to: &str, code: &str) {
    let (subject, body) = email::verification_email(code);
    email::send_in_background(state.mailer.clone(), to.to_string(), subject, body);
}

pub async fn register<A: AccountStore>(
    State(state): State<AppState<A>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    validate_registration(&body)?;
    let email_addr = body.email.trim().to_lowercase();

    // Duplicate check up front for the "deactivated account" hint; the unique
    // index still backstops a racing concurrent registration.
    if let Some(existing) = state.account_store.find_by_email(&email_addr).await? {
        if existing.is_auto_deactivated {
            return Err(AuthError::DeactivatedAccountExists.into());
        }
        return Err(AuthError::EmailTaken.into());
    }

    let password_hash = routes::hash_password_blocking(body.password).await?;
    let account = state
        .account_store
        .create_account(&NewAccount {
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            email: email_addr,
            password_hash: Some(password_hash),
            google_id: None,
        })
        .await?;

    let code = pulseid_crypto::verification_code();
    state
        .account_store
        .set_verification_code(&account.id, &code, pulseid_crypto::verification_code_expiry(Utc::now()))
        .await?;
    send_verification_code(&state, &account.email, &code);

    tracing::info!(user = %account.id, "account registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful. Please check your email for a verification code.",
            "userId": account.id,
            "requireVerification": true,
        })),
    ))
}

// ---------------------------------------------------------------------------
// login
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The 200-with-flag response for an unverified account: a fresh code is
/// issued (wholesale overwrite of any previous one) and the client routes to
/// the verification screen. No session is established.
async fn require_verification_response<A: AccountStore>(
    state: &AppState<A>,
    account: &Account,
) -> Result<Json<Value>, ApiError> {
    let code = pulseid_crypto::verification_code();
    state
        .account_store
        .set_verification_code(
            &account.id,
            &code,
            pulseid_crypto::verification_code_expiry(Utc::now()),
        )
        .await?;
    send_verification_code(state, &account.email, &code);

    Ok(Json(json!({
        "message": "Please verify your email address. A new verification code has been sent.",
        "requireVerification": true,
        "userId": account.id,
    })))
}

pub async fn login<A: AccountStore>(
    State(state): State<AppState<A>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let email_addr = body.email.trim().to_lowercase();
    let account = state
        .account_store
        .find_any_by_email(&email_addr)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if account.is_deleted {
        return Err(AuthError::AccountDeleted.into());
    }

    let Some(hash) = account.password_hash.clone() else {
        return Err(AuthError::Validation(
            "This account was created with Google sign-in. Please use Google to log in."
                .to_string(),
        )
        .into());
    };
    if !routes::verify_password_blocking(body.password, hash).await? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let mut was_reactivated = false;
    match account.state() {
        AccountState::SoftDeleted => unreachable!("rejected above"),
        AccountState::AutoDeactivated => {
            // Conditional transition: losing the race to another login just
            // means the account is already active again.
            was_reactivated = state
                .account_store
                .reactivate_if_auto_deactivated(&account.id)
                .await?;
            if was_reactivated {
                let (subject, mail_body) = email::reactivated_email(&account.first_name);
                email::send_in_background(
                    state.mailer.clone(),
                    account.email.clone(),
                    subject,
                    mail_body,
                );
                tracing::info!(user = %account.id, "account reactivated via login");
            }
        }
        AccountState::Unverified => {
            return Ok((jar, require_verification_response(&state, &account).await?));
        }
        AccountState::Active => {
            state.account_store.touch_login(&account.id).await?;
        }
    }

    // Re-read so the issued claims and returned view reflect the transition.
    let account = state
        .account_store
        .get_account(&account.id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;

    let (jar, access_token) = routes::issue_session(&state, jar, &account)?;
    let mut response = json!({
        "message": "Login successful",
        "user": user_view(&account),
        "accessToken": access_token,
    });
    if was_reactivated {
        response["wasReactivated"] = json!(true);
        response["message"] = json!("Welcome back! Your account has been reactivated.");
    }
    Ok((jar, Json(response)))
}

// ---------------------------------------------------------------------------
// google sign-in
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSignInRequest {
    pub id_token: String,
    /// Client-supplied display name, used only as a fallback when the token
    /// carries no name claims.
    pub display_name: Option<String>,
}

fn names_from_identity(identity: &GoogleIdentity, display_name: Option<&str>) -> (String, String) {
    match (&identity.given_name, &identity.family_name) {
        (Some(given), Some(family)) => (given.clone(), family.clone()),
        _ => {
            let display = display_name.unwrap_or("Google User");
            match display.split_once(' ') {
                Some((first, rest)) => (first.to_string(), rest.to_string()),
                None => (display.to_string(), String::new()),
            }
        }
    }
}

pub async fn google_signin<A: AccountStore>(
    State(state): State<AppState<A>>,
    jar: CookieJar,
    Json(body): Json<GoogleSignInRequest>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    // Everything trusted about the caller comes from the verified token.
    let identity = state.id_verifier.verify(&body.id_token).await?;
    let email_addr = identity.email.trim().to_lowercase();

    let existing = state.account_store.find_any_by_email(&email_addr).await?;
    let account = match existing {
        Some(account) if account.is_deleted => {
            return Err(AuthError::AccountDeleted.into());
        }
        Some(account) => {
            if account.google_id.is_none() {
                state
                    .account_store
                    .link_google(&account.id, &identity.sub)
                    .await?;
                tracing::info!(user = %account.id, "linked Google identity to existing account");
            }
            account
        }
        None => {
            let (first_name, last_name) =
                names_from_identity(&identity, body.display_name.as_deref());
            let account = state
                .account_store
                .create_account(&NewAccount {
                    first_name,
                    last_name,
                    email: email_addr,
                    password_hash: None,
                    google_id: Some(identity.sub.clone()),
                })
                .await?;
            tracing::info!(user = %account.id, "account created via Google sign-in");
            account
        }
    };

    let mut was_reactivated = false;
    if account.is_auto_deactivated {
        was_reactivated = state
            .account_store
            .reactivate_if_auto_deactivated(&account.id)
            .await?;
        if was_reactivated {
            let (subject, mail_body) = email::reactivated_email(&account.first_name);
            email::send_in_background(
                state.mailer.clone(),
                account.email.clone(),
                subject,
                mail_body,
            );
            tracing::info!(user = %account.id, "account reactivated via Google sign-in");
        }
    }

    if !account.is_verified {
        // A verified Google token is not taken as proof of control over the
        // mailbox on file; the code round-trip still applies.
        return Ok((jar, require_verification_response(&state, &account).await?));
    }

    if !was_reactivated {
        state.account_store.touch_login(&account.id).await?;
    }
    let account = state
        .account_store
        .get_account(&account.id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;

    let (jar, access_token) = routes::issue_session(&state, jar, &account)?;
    let mut response = json!({
        "message": "Login successful",
        "user": user_view(&account),
        "accessToken": access_token,
    });
    if was_reactivated {
        response["wasReactivated"] = json!(true);
        response["message"] = json!("Welcome back! Your account has been reactivated.");
    }
    Ok((jar, Json(response)))
}

// ---------------------------------------------------------------------------
// session endpoints
// ---------------------------------------------------------------------------

pub async fn current_session<A: AccountStore>(
    State(state): State<AppState<A>>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError> {
    let account = state
        .account_store
        .get_account(&user.id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;
    Ok(Json(json!({ "user": user_view(&account) })))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    (
        cookies::clear_session(jar),
        Json(json!({ "message": "Logged out" })),
    )
}

/// Self-service soft delete. The session cookies are cleared alongside; any
/// other outstanding tokens die at the session gate's deletion check.
pub async fn deactivate_account<A: AccountStore>(
    State(state): State<AppState<A>>,
    jar: CookieJar,
    VerifiedUser(user): VerifiedUser,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    if !state.account_store.soft_delete(&user.id).await? {
        return Err(AuthError::AccountDeleted.into());
    }
    tracing::info!(user = %user.id, "account soft-deleted by owner");
    Ok((
        cookies::clear_session(jar),
        Json(json!({ "message": "Your account has been deleted." })),
    ))
}

pub mod admin;
pub mod auth;
pub mod health;
pub mod password;
pub mod reactivation;
pub mod verification;

use axum_extra::extract::CookieJar;
use pulseid_core::{Account, AccountStore, AuthError, AuthResult};
use pulseid_crypto::jwt;

use crate::cookies;
use crate::error::ApiError;
use crate::session;
use crate::state::AppState;

/// Issue a full session for an account: access + refresh tokens as cookies,
/// with the access token also returned for clients that keep it in memory.
pub(crate) fn issue_session<A: AccountStore>(
    state: &AppState<A>,
    jar: CookieJar,
    account: &Account,
) -> Result<(CookieJar, String), ApiError> {
    let access = jwt::create_access_token(account, &state.config.jwt.access_secret)?;
    let refresh = jwt::create_refresh_token(&account.id, &state.config.jwt.refresh_secret)?;
    let jar = cookies::set_session(jar, access.clone(), refresh, &state.config.cookies);
    Ok((jar, access))
}

// Argon2 is CPU-bound; run it off the async worker threads.

pub(crate) async fn hash_password_blocking(password: String) -> AuthResult<String> {
    tokio::task::spawn_blocking(move || pulseid_crypto::hash_password(&password))
        .await
        .map_err(|e| AuthError::Internal(format!("hash task failed: {e}")))?
}

pub(crate) async fn verify_password_blocking(password: String, hash: String) -> AuthResult<bool> {
    tokio::task::spawn_blocking(move || pulseid_crypto::verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Internal(format!("verify task failed: {e}")))?
}

pub fn build_router<A>(state: AppState<A>) -> axum::Router
where
    A: AccountStore,
{
    use axum::routing::{delete, get, patch, post};

    // Routes behind the session gate. Role and verification requirements are
    // enforced by the handler extractors on top of the gate.
    let protected = axum::Router::new()
        .route("/api/auth/verify", get(auth::current_session::<A>))
        .route("/api/auth/deactivate", post(auth::deactivate_account::<A>))
        .route("/api/admin/users", get(admin::list_users::<A>))
        .route("/api/admin/users/{id}/role", patch(admin::update_role::<A>))
        .route("/api/admin/users/{id}", delete(admin::delete_user::<A>))
        .route("/api/admin/users/{id}/restore", post(admin::restore_user::<A>))
        .route(
            "/api/admin/stats/deactivation",
            get(admin::deactivation_stats::<A>),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session::session_gate::<A>,
        ));

    axum::Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/register", post(auth::register::<A>))
        .route("/api/auth/login", post(auth::login::<A>))
        .route("/api/auth/google-signin", post(auth::google_signin::<A>))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/verify-email", post(verification::verify_email::<A>))
        .route(
            "/api/auth/resend-verification",
            post(verification::resend_verification::<A>),
        )
        .route("/api/auth/forgot-password", post(password::forgot_password::<A>))
        .route("/api/auth/reset-password", post(password::reset_password::<A>))
        .route(
            "/api/auth/request-reactivation",
            post(reactivation::request_reactivation::<A>),
        )
        .route("/api/auth/reactivate", post(reactivation::reactivate::<A>))
        .route(
            "/api/auth/account-status",
            get(reactivation::check_account_status::<A>),
        )
        .merge(protected)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
                .expose_headers(tower_http::cors::Any),
        )
        // Request body size limit: 1 MiB, these are small JSON bodies.
        .layer(tower_http::limit::RequestBodyLimitLayer::new(1024 * 1024))
        .with_state(state)
}

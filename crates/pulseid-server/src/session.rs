use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use pulseid_core::{Account, AccountStore, AuthError, Role};
use pulseid_crypto::jwt::{self, AccessClaims};
use serde_json::json;

use crate::cookies;
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying a replacement access token after a transparent refresh,
/// so clients holding the token in memory (rather than the cookie) can
/// pick it up.
pub const NEW_TOKEN_HEADER: &str = "x-new-token";

/// The authenticated caller, inserted into request extensions by
/// [`session_gate`]. Carries the claims snapshot: profile fields here are as
/// fresh as the last token issue, while deletion is re-checked per request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub role: Role,
    pub email: String,
    pub name: String,
    pub verified: bool,
}

impl From<AccessClaims> for AuthenticatedUser {
    fn from(claims: AccessClaims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
            email: claims.email,
            name: claims.name,
            verified: claims.verified,
        }
    }
}

fn snapshot(account: &Account) -> AuthenticatedUser {
    AuthenticatedUser {
        id: account.id.clone(),
        role: account.role,
        email: account.email.clone(),
        name: account.full_name(),
        verified: account.is_verified,
    }
}

fn unauthorized(error_name: &str, message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, error_name, message)
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Session middleware for every authenticated route.
///
/// Credential precedence: Authorization bearer header, else the `token`
/// cookie. An expired access token is transparently refreshed from the
/// `refreshToken` cookie; the replacement is set as a cookie and echoed in
/// the `x-new-token` header. A missing or bad refresh token is rejected
/// with the distinct `RefreshRequired` error so clients redirect to login
/// instead of retrying forever.
///
/// After validation the account is re-read from the store: claims minted
/// before a soft deletion must not keep working. Profile/role staleness
/// inside the access window is accepted; deletion is not.
pub async fn session_gate<A: AccountStore>(
    State(state): State<AppState<A>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .or_else(|| jar.get(cookies::ACCESS_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| unauthorized("AuthenticationRequired", "Not authenticated"))?;

    let mut refreshed_token: Option<String> = None;

    let user = match jwt::validate_access_token(&token, &state.config.jwt.access_secret) {
        Ok(claims) => {
            let user: AuthenticatedUser = claims.into();
            let account = state
                .account_store
                .get_account(&user.id)
                .await?
                .ok_or_else(|| unauthorized("InvalidToken", "Invalid token"))?;
            if account.is_deleted {
                return Err(ApiError::new(
                    StatusCode::FORBIDDEN,
                    "AccountDeleted",
                    AuthError::AccountDeleted.to_string(),
                ));
            }
            user
        }
        Err(AuthError::TokenExpired) => {
            let refresh = jar
                .get(cookies::REFRESH_COOKIE)
                .map(|c| c.value().to_string())
                .ok_or_else(|| {
                    unauthorized("RefreshRequired", "Session expired, please log in again")
                })?;
            let claims = jwt::validate_refresh_token(&refresh, &state.config.jwt.refresh_secret)
                .map_err(|_| {
                    unauthorized("RefreshRequired", "Session expired, please log in again")
                })?;

            // Refresh re-reads the account so role changes and deletions
            // take effect here rather than surviving via stale claims.
            let account = state
                .account_store
                .get_account(&claims.sub)
                .await?
                .ok_or_else(|| unauthorized("InvalidToken", "Invalid token"))?;
            if account.is_deleted {
                return Err(ApiError::new(
                    StatusCode::FORBIDDEN,
                    "AccountDeleted",
                    AuthError::AccountDeleted.to_string(),
                ));
            }

            let new_access =
                jwt::create_access_token(&account, &state.config.jwt.access_secret)?;
            refreshed_token = Some(new_access);
            snapshot(&account)
        }
        Err(_) => return Err(unauthorized("InvalidToken", "Invalid token")),
    };

    // Authenticated traffic counts as activity for the inactivity sweeper.
    if let Err(e) = state.account_store.touch_activity(&user.id).await {
        tracing::warn!(user = %user.id, error = %e, "failed to record activity");
    }

    req.extensions_mut().insert(user);
    let mut response = next.run(req).await;

    if let Some(new_token) = refreshed_token {
        if let Ok(value) = HeaderValue::from_str(&new_token) {
            response.headers_mut().insert(NEW_TOKEN_HEADER, value);
        }
        let jar = cookies::set_access(jar, new_token, &state.config.cookies);
        return Ok((jar, response).into_response());
    }

    Ok(response)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| unauthorized("AuthenticationRequired", "Not authenticated"))
    }
}

/// Extractor for admin-only routes.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ApiError::new(
                StatusCode::FORBIDDEN,
                "AuthorizationError",
                "Admin access required",
            ));
        }
        Ok(AdminUser(user))
    }
}

/// Extractor for routes that additionally require a verified email. The
/// rejection is structured so the client can route to the verification
/// screen instead of a generic auth error.
#[derive(Debug, Clone)]
pub struct VerifiedUser(pub AuthenticatedUser);

pub struct VerificationRequired {
    user_id: String,
}

impl IntoResponse for VerificationRequired {
    fn into_response(self) -> Response {
        let body = json!({
            "error": "VerificationRequired",
            "message": "Please verify your email address to continue",
            "requireVerification": true,
            "userId": self.user_id,
        });
        (StatusCode::FORBIDDEN, axum::Json(body)).into_response()
    }
}

impl<S> FromRequestParts<S> for VerifiedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        if !user.verified {
            return Err(VerificationRequired { user_id: user.id }.into_response());
        }
        Ok(VerifiedUser(user))
    }
}

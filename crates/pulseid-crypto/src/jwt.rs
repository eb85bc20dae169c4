use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use pulseid_core::{Account, AuthError, AuthResult, Role};
use serde::{Deserialize, Serialize};

pub const ACCESS_TTL_SECS: i64 = 60 * 60; // 1 hour
pub const REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60; // 7 days

/// Claims for an access token (short-lived).
///
/// Carries a denormalized profile snapshot so per-request auth does not need
/// a store round-trip. The snapshot is only as fresh as the last issue or
/// refresh; anything security-critical that must reflect later mutations
/// (soft deletion) is re-checked against the store by the session gate.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub role: Role,
    pub email: String,
    pub name: String,
    pub verified: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Claims for a refresh token (long-lived). Deliberately carries only the
/// account id: role and profile are re-read from the store at refresh time,
/// which is how role changes and deletions take effect without waiting for
/// the access token's natural expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid,
    }
}

/// Create an access token from an account snapshot.
///
/// This is the single canonical account-to-claims projection; every endpoint
/// that issues a session goes through it. HS256 symmetric signing.
pub fn create_access_token(account: &Account, secret: &str) -> AuthResult<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = AccessClaims {
        sub: account.id.clone(),
        role: account.role,
        email: account.email.clone(),
        name: account.full_name(),
        verified: account.is_verified,
        iat: now,
        exp: now + ACCESS_TTL_SECS,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| AuthError::Crypto(e.to_string()))
}

/// Create a refresh token for an account id.
pub fn create_refresh_token(account_id: &str, secret: &str) -> AuthResult<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = RefreshClaims {
        sub: account_id.to_string(),
        iat: now,
        exp: now + REFRESH_TTL_SECS,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| AuthError::Crypto(e.to_string()))
}

/// Validate an access token and return its claims.
///
/// Expiry is reported distinctly (`TokenExpired`) so the session gate can
/// attempt a transparent refresh instead of rejecting outright.
pub fn validate_access_token(token: &str, secret: &str) -> AuthResult<AccessClaims> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();
    let token_data =
        decode::<AccessClaims>(token, &key, &validation).map_err(map_jwt_error)?;
    Ok(token_data.claims)
}

/// Validate a refresh token and return its claims.
pub fn validate_refresh_token(token: &str, secret: &str) -> AuthResult<RefreshClaims> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();
    let token_data =
        decode::<RefreshClaims>(token, &key, &validation).map_err(map_jwt_error)?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SECRET: &str = "test-secret-key-for-jwt-tests";
    const OTHER_SECRET: &str = "different-secret-key-for-jwt";

    fn test_account() -> Account {
        Account {
            id: "user-123".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: "grace@example.com".to_string(),
            phone: None,
            password_hash: Some("$argon2id$fake".to_string()),
            google_id: None,
            role: Role::Admin,
            is_verified: true,
            verification_code: None,
            verification_code_expires: None,
            reset_token: None,
            reset_token_expires: None,
            is_deleted: false,
            deleted_at: None,
            is_auto_deactivated: false,
            auto_deactivated_at: None,
            reactivation_token: None,
            reactivation_token_expires: None,
            reactivation_attempts: 0,
            last_reactivation_attempt: None,
            reactivated_at: None,
            original_email: None,
            original_phone: None,
            last_login: None,
            last_activity: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn access_token_carries_profile_snapshot() {
        let account = test_account();
        let token = create_access_token(&account, SECRET).unwrap();
        let claims = validate_access_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.email, "grace@example.com");
        assert_eq!(claims.name, "Grace Hopper");
        assert!(claims.verified);
    }

    #[test]
    fn access_token_wrong_secret_fails() {
        let token = create_access_token(&test_account(), SECRET).unwrap();
        assert!(validate_access_token(&token, OTHER_SECRET).is_err());
    }

    #[test]
    fn refresh_token_embeds_only_account_id() {
        let token = create_refresh_token("user-123", SECRET).unwrap();
        let claims = validate_refresh_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "user-123");
    }

    #[test]
    fn access_token_has_one_hour_expiry() {
        let token = create_access_token(&test_account(), SECRET).unwrap();
        let claims = validate_access_token(&token, SECRET).unwrap();
        assert_eq!(claims.exp - claims.iat, ACCESS_TTL_SECS);
    }

    #[test]
    fn refresh_token_has_seven_day_expiry() {
        let token = create_refresh_token("user-123", SECRET).unwrap();
        let claims = validate_refresh_token(&token, SECRET).unwrap();
        assert_eq!(claims.exp - claims.iat, REFRESH_TTL_SECS);
    }

    #[test]
    fn expired_token_reports_expired_distinctly() {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: "user-123".to_string(),
            role: Role::User,
            email: "grace@example.com".to_string(),
            name: "Grace Hopper".to_string(),
            verified: true,
            iat: now - 7200,
            exp: now - 3600,
        };
        let key = EncodingKey::from_secret(SECRET.as_bytes());
        let token = encode(&Header::default(), &claims, &key).unwrap();

        match validate_access_token(&token, SECRET) {
            Err(AuthError::TokenExpired) => {}
            other => panic!("expected TokenExpired, got {other:?}"),
        }
    }

    #[test]
    fn garbage_token_reports_invalid() {
        match validate_access_token("not-a-jwt", SECRET) {
            Err(AuthError::TokenInvalid) => {}
            other => panic!("expected TokenInvalid, got {other:?}"),
        }
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    AccountNotFound,

    #[error("This account has been deleted and cannot be used.")]
    AccountDeleted,

    #[error("User with this email already exists")]
    EmailTaken,

    #[error("This email is associated with a deactivated account. Please login to reactivate.")]
    DeactivatedAccountExists,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("external service error: {0}")]
    External(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

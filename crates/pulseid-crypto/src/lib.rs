pub mod code;
pub mod jwt;
pub mod password;

pub use code::{
    reactivation_token, reset_token, reset_token_expiry, verification_code,
    verification_code_expiry,
};
pub use jwt::{
    AccessClaims, RefreshClaims, create_access_token, create_refresh_token,
    validate_access_token, validate_refresh_token,
};
pub use password::{hash_password, verify_password};

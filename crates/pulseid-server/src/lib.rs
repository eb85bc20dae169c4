pub mod cookies;
pub mod email;
pub mod error;
pub mod google;
pub mod routes;
pub mod session;
pub mod state;
pub mod sweeper;
pub mod views;

pub use email::{Mailer, NoopMailer, SmtpMailer};
pub use error::ApiError;
pub use google::{DisabledVerifier, GoogleIdentity, GoogleTokenVerifier, IdTokenVerifier};
pub use routes::build_router;
pub use session::{AdminUser, AuthenticatedUser, VerifiedUser, NEW_TOKEN_HEADER};
pub use state::AppState;

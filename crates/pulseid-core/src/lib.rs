pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use store::{AccountStore, DeactivationStats};
pub use types::{Account, AccountState, NewAccount, Role};

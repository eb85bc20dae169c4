use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL this service is reachable at.
    pub public_url: String,
    /// Base URL of the frontend, used when building emailed links.
    pub frontend_url: String,
    pub jwt: JwtConfig,
    pub database: DatabaseConfig,
    /// SMTP transport for outbound mail. Mail is skipped when absent.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    /// Google sign-in verification. The endpoint rejects when absent.
    #[serde(default)]
    pub google: Option<GoogleConfig>,
    #[serde(default)]
    pub cookies: CookieConfig,
    #[serde(default)]
    pub inactivity: InactivityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    /// Set the Secure attribute on session cookies (on in production).
    #[serde(default)]
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self { secure: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InactivityConfig {
    /// Active accounts idle longer than this are auto-deactivated.
    #[serde(default = "default_threshold_days")]
    pub threshold_days: i64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Lifetime of an emailed reactivation token.
    #[serde(default = "default_reactivation_token_hours")]
    pub reactivation_token_hours: i64,
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            threshold_days: default_threshold_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
            reactivation_token_hours: default_reactivation_token_hours(),
        }
    }
}

fn default_threshold_days() -> i64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_reactivation_token_hours() -> i64 {
    24
}

impl AuthConfig {
    pub fn load(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PULSEID_").split("__"))
            .extract()
    }
}

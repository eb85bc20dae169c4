use std::sync::Arc;

use pulseid_core::AuthConfig;
use pulseid_server::email::{Mailer, NoopMailer, SmtpMailer};
use pulseid_server::google::{DisabledVerifier, GoogleTokenVerifier, IdTokenVerifier};
use pulseid_server::{AppState, build_router, sweeper};
use pulseid_storage_sqlite::SqliteAccountStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulseid=info,tower_http=info".into()),
        )
        .init();

    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/pulseid.toml".to_string());
    let config = AuthConfig::load(&config_path)?;

    std::fs::create_dir_all("data")?;
    let account_store = SqliteAccountStore::connect(&config.database.url).await?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("no SMTP configured, outbound email is disabled");
            Arc::new(NoopMailer)
        }
    };

    let id_verifier: Arc<dyn IdTokenVerifier> = match &config.google {
        Some(google) => Arc::new(GoogleTokenVerifier::new(google.client_id.clone())),
        None => Arc::new(DisabledVerifier),
    };

    let addr = format!("{}:{}", config.hostname, config.port);
    let state = AppState {
        account_store: Arc::new(account_store),
        config: Arc::new(config),
        mailer,
        id_verifier,
    };

    tokio::spawn(sweeper::run(state.clone()));

    let router = build_router(state);
    tracing::info!("pulseid listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

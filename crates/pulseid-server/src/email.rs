use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
};
use pulseid_core::config::SmtpConfig;
use pulseid_core::{AuthError, AuthResult};

/// Outbound mail seam. The SMTP implementation is used in production;
/// tests install a recording fake, and a no-op stands in when SMTP is
/// unconfigured.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AuthResult<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> AuthResult<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| AuthError::External(format!("SMTP relay error: {e}")))?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AuthResult<()> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| AuthError::Internal(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| AuthError::Internal(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AuthError::Internal(format!("Failed to build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AuthError::External(format!("Failed to send email: {e}")))?;
        Ok(())
    }
}

/// Used when no SMTP transport is configured: logs and drops.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> AuthResult<()> {
        tracing::info!(%to, %subject, "SMTP not configured, dropping email");
        Ok(())
    }
}

/// Dispatch mail off the request path. A failure is logged and never fails
/// the calling operation.
pub fn send_in_background(mailer: Arc<dyn Mailer>, to: String, subject: String, body: String) {
    tokio::spawn(async move {
        if let Err(e) = mailer.send(&to, &subject, &body).await {
            tracing::warn!(%to, %subject, error = %e, "email dispatch failed");
        }
    });
}

// Message templates. Plain text, matching the transactional tone of the
// rest of the service.

pub fn verification_email(code: &str) -> (String, String) {
    (
        "Verify your email address".to_string(),
        format!(
            "Your verification code is: {code}\n\n\
             The code expires in 2 hours. If you did not create an account, \
             you can ignore this email."
        ),
    )
}

pub fn password_reset_email(token: &str, frontend_url: &str) -> (String, String) {
    (
        "Password reset request".to_string(),
        format!(
            "We received a request to reset your password.\n\n\
             Reset it here: {frontend_url}/reset-password?token={token}\n\n\
             The link expires in 1 hour. If you did not request a reset, \
             you can ignore this email."
        ),
    )
}

pub fn reactivation_email(token: &str, frontend_url: &str, hours: i64) -> (String, String) {
    (
        "Reactivate your account".to_string(),
        format!(
            "Your account was deactivated after a period of inactivity.\n\n\
             Reactivate it here: {frontend_url}/reactivate?token={token}\n\n\
             The link expires in {hours} hours. You can also simply log in \
             with your password to reactivate."
        ),
    )
}

pub fn reactivated_email(first_name: &str) -> (String, String) {
    (
        "Welcome back".to_string(),
        format!(
            "Hi {first_name},\n\n\
             Your account has been reactivated and is fully available again."
        ),
    )
}

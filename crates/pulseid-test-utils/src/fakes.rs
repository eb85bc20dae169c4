use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use pulseid_core::{AuthError, AuthResult};
use pulseid_server::email::Mailer;
use pulseid_server::google::{GoogleIdentity, IdTokenVerifier};

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl SentEmail {
    /// Pull the six-digit verification code out of the body: the first run
    /// of exactly six consecutive digits.
    pub fn code(&self) -> Option<String> {
        let mut run = String::new();
        for c in self.body.chars().chain(std::iter::once(' ')) {
            if c.is_ascii_digit() {
                run.push(c);
            } else {
                if run.len() == 6 {
                    return Some(run);
                }
                run.clear();
            }
        }
        None
    }

    /// Pull a `token=` query value out of an emailed link.
    pub fn token(&self) -> Option<String> {
        let idx = self.body.find("token=")?;
        let rest = &self.body[idx + "token=".len()..];
        let token: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        (!token.is_empty()).then_some(token)
    }
}

/// Captures outbound mail instead of sending it, so tests can read the
/// codes and tokens the service generated.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    fail: Mutex<bool>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_to(&self, to: &str) -> Option<SentEmail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|e| e.to == to)
            .cloned()
    }

    /// Make subsequent sends fail, for exercising degraded-mail paths.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AuthResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(AuthError::External("simulated SMTP failure".to_string()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Resolves pre-registered opaque test tokens to Google identities; anything
/// else is rejected the way a bad real token would be.
#[derive(Default)]
pub struct StaticTokenVerifier {
    identities: Mutex<HashMap<String, GoogleIdentity>>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id_token: &str, identity: GoogleIdentity) {
        self.identities
            .lock()
            .unwrap()
            .insert(id_token.to_string(), identity);
    }
}

#[async_trait]
impl IdTokenVerifier for StaticTokenVerifier {
    async fn verify(&self, id_token: &str) -> AuthResult<GoogleIdentity> {
        self.identities
            .lock()
            .unwrap()
            .get(id_token)
            .cloned()
            .ok_or(AuthError::TokenInvalid)
    }
}

pub fn google_identity(email: &str) -> GoogleIdentity {
    GoogleIdentity {
        sub: format!("google-sub-{email}"),
        email: email.to_string(),
        given_name: Some("Greta".to_string()),
        family_name: Some("Googleuser".to_string()),
    }
}

use async_trait::async_trait;
use pulseid_core::{AuthError, AuthResult};
use serde::Deserialize;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Identity asserted by a verified Google ID token. Only fields the service
/// actually consumes; everything comes from the verified token, never from
/// the client request body.
#[derive(Debug, Clone)]
pub struct GoogleIdentity {
    /// Google's stable subject identifier for the user.
    pub sub: String,
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

/// Federated-identity seam. Tests install a static fake.
#[async_trait]
pub trait IdTokenVerifier: Send + Sync + 'static {
    async fn verify(&self, id_token: &str) -> AuthResult<GoogleIdentity>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: String,
    given_name: Option<String>,
    family_name: Option<String>,
}

/// Verifies ID tokens against Google's tokeninfo endpoint. The endpoint
/// checks the signature and expiry; we additionally check the audience
/// matches our client id so tokens minted for other apps are rejected.
pub struct GoogleTokenVerifier {
    client: reqwest::Client,
    client_id: String,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id,
        }
    }
}

#[async_trait]
impl IdTokenVerifier for GoogleTokenVerifier {
    async fn verify(&self, id_token: &str) -> AuthResult<GoogleIdentity> {
        let response = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| AuthError::External(format!("tokeninfo request failed: {e}")))?;

        if !response.status().is_success() {
            // Google answers 4xx for bad/expired tokens.
            return Err(AuthError::TokenInvalid);
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| AuthError::External(format!("tokeninfo response malformed: {e}")))?;

        if info.aud != self.client_id {
            tracing::warn!(aud = %info.aud, "Google token audience mismatch");
            return Err(AuthError::TokenInvalid);
        }

        Ok(GoogleIdentity {
            sub: info.sub,
            email: info.email,
            given_name: info.given_name,
            family_name: info.family_name,
        })
    }
}

/// Installed when no Google client id is configured.
pub struct DisabledVerifier;

#[async_trait]
impl IdTokenVerifier for DisabledVerifier {
    async fn verify(&self, _id_token: &str) -> AuthResult<GoogleIdentity> {
        Err(AuthError::External(
            "Google sign-in is not configured on this server".to_string(),
        ))
    }
}

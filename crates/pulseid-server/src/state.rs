use std::sync::Arc;

use pulseid_core::{AccountStore, AuthConfig};

use crate::email::Mailer;
use crate::google::IdTokenVerifier;

pub struct AppState<A>
where
    A: AccountStore,
{
    pub account_store: Arc<A>,
    pub config: Arc<AuthConfig>,
    /// Outbound mail. A no-op implementation is substituted when SMTP is
    /// unconfigured, and tests install a recording fake.
    pub mailer: Arc<dyn Mailer>,
    /// Server-side verification of federated sign-in tokens.
    pub id_verifier: Arc<dyn IdTokenVerifier>,
}

// Manual impl: the store itself does not need to be Clone, only the Arcs.
impl<A: AccountStore> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            account_store: self.account_store.clone(),
            config: self.config.clone(),
            mailer: self.mailer.clone(),
            id_verifier: self.id_verifier.clone(),
        }
    }
}

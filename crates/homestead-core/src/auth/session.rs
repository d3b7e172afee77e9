use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::info;

use super::store::{AuthEvent, CredentialStore, SessionSnapshot};
use super::token::Identity;
use crate::api::{ApiClient, ApiError};

/// Login, logout and registration over a shared [`CredentialStore`].
///
/// This is what views and commands hold: it answers "who is signed in" and
/// performs the account actions that change that answer.
#[derive(Clone)]
pub struct Session {
    api: ApiClient,
}

impl Session {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    fn store(&self) -> &Arc<CredentialStore> {
        self.api.store()
    }

    /// Current `{loading, identity}` without any I/O.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.store().current()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.store().subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.store().events()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.store().identity()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ApiError> {
        let identity = self.api.login(email, password).await?;
        info!(user_id = identity.id, "Login successful");
        Ok(identity)
    }

    /// Sign out locally. Idempotent and never fails.
    pub fn logout(&self) {
        self.store().clear();
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        password_confirmation: &str,
    ) -> Result<(), ApiError> {
        self.api
            .register(username, email, password, password_confirmation)
            .await?;
        info!(email, "Registration successful");
        Ok(())
    }
}

//! Process-wide holder of the access/refresh token pair.
//!
//! The store is the single source of truth for whether the user is signed in.
//! Every mutation is written through to a [`TokenStorage`] backend so the
//! session survives a restart, and is published to observers through a
//! `watch` channel (current snapshot) and a `broadcast` channel (events).

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::credentials::{StorageError, TokenStorage, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use super::token::{decode_identity, Identity, TokenError};

/// Capacity of the auth event channel.
/// Slow receivers only miss intermediate events, never the snapshot.
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error(transparent)]
    MalformedToken(#[from] TokenError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What observers see of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// True until `initialize()` has completed
    pub loading: bool,
    pub identity: Option<Identity>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Identity),
    TokenRefreshed(Identity),
    SignedOut,
    /// The session ended because the refresh token was rejected; the user
    /// has to sign in again.
    SessionExpired,
}

#[derive(Debug, Default)]
struct Credentials {
    access_token: Option<String>,
    refresh_token: Option<String>,
    identity: Option<Identity>,
    generation: u64,
}

impl Credentials {
    fn reset(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.identity = None;
        self.generation += 1;
    }

    fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

pub struct CredentialStore {
    storage: Arc<dyn TokenStorage>,
    state: RwLock<Credentials>,
    snapshot: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<AuthEvent>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("snapshot", &*self.snapshot.borrow())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot {
            loading: true,
            identity: None,
        });
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            storage,
            state: RwLock::new(Credentials::default()),
            snapshot,
            events,
        }
    }

    /// Load any persisted token pair.
    ///
    /// A stored access token that cannot be decoded ends the session: both
    /// tokens are removed and the store reports unauthenticated. Never fails.
    pub fn initialize(&self) -> SessionSnapshot {
        let access = self.read_key(ACCESS_TOKEN_KEY);
        let refresh = self.read_key(REFRESH_TOKEN_KEY);

        let mut state = self.state.write();
        state.reset();

        match access {
            Some(access) => match decode_identity(&access) {
                Ok(identity) => {
                    debug!(user_id = identity.id, "Restored persisted session");
                    state.access_token = Some(access);
                    state.refresh_token = refresh;
                    state.identity = Some(identity);
                }
                Err(e) => {
                    warn!(error = %e, "Discarding persisted session with undecodable access token");
                    self.remove_persisted();
                }
            },
            None => {
                if refresh.is_some() {
                    warn!("Discarding persisted refresh token without an access token");
                    self.remove_persisted();
                }
            }
        }

        let snapshot = SessionSnapshot {
            loading: false,
            identity: state.identity.clone(),
        };
        drop(state);

        self.snapshot.send_replace(snapshot.clone());
        snapshot
    }

    /// Install a freshly issued token pair, e.g. after login.
    ///
    /// On failure nothing is retained: memory and storage are both rolled
    /// back to unauthenticated.
    pub fn set_credential(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Identity, CredentialError> {
        let decoded = if refresh_token.trim().is_empty() {
            Err(TokenError::Empty)
        } else {
            decode_identity(access_token)
        };
        let identity = match decoded {
            Ok(identity) => identity,
            Err(e) => {
                self.reset_quietly();
                return Err(e.into());
            }
        };

        let persisted = self
            .storage
            .set(ACCESS_TOKEN_KEY, access_token)
            .and_then(|_| self.storage.set(REFRESH_TOKEN_KEY, refresh_token));
        if let Err(e) = persisted {
            self.reset_quietly();
            return Err(e.into());
        }

        {
            let mut state = self.state.write();
            state.access_token = Some(access_token.to_string());
            state.refresh_token = Some(refresh_token.to_string());
            state.identity = Some(identity.clone());
            state.generation += 1;
        }

        info!(user_id = identity.id, "Signed in");
        self.publish(Some(identity.clone()), AuthEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    /// Replace only the access token, keeping the refresh token.
    ///
    /// Same failure behavior as [`set_credential`](Self::set_credential).
    pub fn set_access_token(&self, access_token: &str) -> Result<Identity, CredentialError> {
        let identity = match decode_identity(access_token) {
            Ok(identity) => identity,
            Err(e) => {
                self.reset_quietly();
                return Err(e.into());
            }
        };

        if let Err(e) = self.storage.set(ACCESS_TOKEN_KEY, access_token) {
            self.reset_quietly();
            return Err(e.into());
        }

        {
            let mut state = self.state.write();
            state.access_token = Some(access_token.to_string());
            state.identity = Some(identity.clone());
            state.generation += 1;
        }

        debug!(user_id = identity.id, "Access token replaced");
        self.publish(
            Some(identity.clone()),
            AuthEvent::TokenRefreshed(identity.clone()),
        );
        Ok(identity)
    }

    /// Remove both tokens and the identity. Idempotent, never fails.
    pub fn clear(&self) {
        if self.reset_quietly() {
            info!("Signed out");
            let _ = self.events.send(AuthEvent::SignedOut);
        }
    }

    /// Clear the store because the session can no longer be renewed.
    pub(crate) fn expire(&self) {
        self.reset_quietly();
        let _ = self.events.send(AuthEvent::SessionExpired);
    }

    pub fn current(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().identity.is_some()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.read().identity.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.read().refresh_token.clone()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.state.read().refresh_token.is_some()
    }

    /// Access token together with the generation it belongs to.
    /// The generation changes on every token mutation.
    pub(crate) fn access_token_with_generation(&self) -> (Option<String>, u64) {
        let state = self.state.read();
        (state.access_token.clone(), state.generation)
    }

    fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Failed to read persisted token");
                None
            }
        }
    }

    fn remove_persisted(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to remove persisted token");
            }
        }
    }

    /// Reset memory and storage. Returns whether any token was held.
    fn reset_quietly(&self) -> bool {
        let had_tokens = {
            let mut state = self.state.write();
            let had_tokens = !state.is_empty();
            state.reset();
            had_tokens
        };
        self.remove_persisted();
        self.snapshot.send_replace(SessionSnapshot {
            loading: false,
            identity: None,
        });
        had_tokens
    }

    fn publish(&self, identity: Option<Identity>, event: AuthEvent) {
        self.snapshot.send_replace(SessionSnapshot {
            loading: false,
            identity,
        });
        let _ = self.events.send(event);
    }
}

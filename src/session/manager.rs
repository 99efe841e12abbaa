//! Session manager: the signed-in identity and its credential lifecycle.
//!
//! Owns the single in-memory session, mediates the credential exchange with
//! the identity provider, persists the snapshot through a `KeyValueStore` and
//! publishes identity changes to subscribers.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::observers::{Observers, Subscription};
use super::snapshot;
use super::store::KeyValueStore;
use super::types::{Identity, Session, SessionState, MAX_LIFETIME_SECS};
use crate::error::{SignInError, SnapshotError};
use crate::provider::{decode_id_token, Credential, CredentialProvider, ProfileSource};

/// Default bound on the profile-info exchange.
pub const DEFAULT_PROFILE_TIMEOUT: Duration = Duration::from_secs(10);

struct Inner {
    state: SessionState,
    session: Option<Session>,
    /// Bumped whenever an in-flight sign-in must no longer be applied.
    generation: u64,
}

/// What a completed credential exchange produced.
struct Exchanged {
    identity: Identity,
    access_token: Option<String>,
    lifetime_secs: u64,
}

impl Exchanged {
    fn into_session(self) -> Result<(Session, Option<String>), SignInError> {
        let lifetime_secs = self.lifetime_secs;
        let session = Session::new(self.identity, lifetime_secs).ok_or_else(|| {
            SignInError::Decoding(format!("credential lifetime {}s out of range", lifetime_secs))
        })?;
        Ok((session, self.access_token))
    }
}

/// Manages the one identity/session pair of the running client.
pub struct SessionManager {
    config: SessionConfig,
    store: Arc<dyn KeyValueStore>,
    provider: Arc<dyn CredentialProvider>,
    profiles: Arc<dyn ProfileSource>,
    profile_timeout: Duration,
    inner: Mutex<Inner>,
    observers: Observers,
}

impl SessionManager {
    /// Create a manager in `Initializing`. Nothing is read from `store`
    /// until `restore()` runs.
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn CredentialProvider>,
        profiles: Arc<dyn ProfileSource>,
    ) -> Self {
        Self {
            config,
            store,
            provider,
            profiles,
            profile_timeout: DEFAULT_PROFILE_TIMEOUT,
            inner: Mutex::new(Inner {
                state: SessionState::Initializing,
                session: None,
                generation: 0,
            }),
            observers: Observers::default(),
        }
    }

    /// Override the bound on the profile-info exchange.
    pub fn with_profile_timeout(mut self, timeout: Duration) -> Self {
        self.profile_timeout = timeout;
        self
    }

    /// Settings the manager was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// The signed-in identity, if any. Never touches storage or network.
    pub fn current_identity(&self) -> Option<Identity> {
        self.lock().session.as_ref().map(|s| s.identity.clone())
    }

    /// Expiry of the active credential.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.lock().session.as_ref().map(|s| s.expires_at)
    }

    /// Register a callback invoked with the new identity on every change.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&Identity>) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    /// Restore the persisted session. Runs once; later calls return the
    /// current identity unchanged.
    ///
    /// Never fails: an expired, incomplete or corrupt snapshot is cleared and
    /// the manager ends up signed out. A store that cannot be read also leaves
    /// the manager signed out, but its contents are kept for the next launch.
    /// Subscribers always hear the outcome of the first call.
    pub fn restore(&self) -> Option<Identity> {
        {
            let mut inner = self.lock();
            if inner.state != SessionState::Initializing {
                debug!(state = %inner.state, "Restore already ran, ignoring");
                return inner.session.as_ref().map(|s| s.identity.clone());
            }
            inner.state = SessionState::Restoring;
        }

        let restored = match snapshot::load(self.store.as_ref()) {
            Ok(None) => {
                debug!("No stored session");
                None
            }
            Ok(Some(session)) if !session.is_expired(self.config.expiry_skew_secs) => {
                Some(session)
            }
            Ok(Some(session)) => {
                info!(
                    user_id = %session.identity.id,
                    expires_at = %session.expires_at,
                    "Stored credential expired, clearing storage"
                );
                snapshot::clear(self.store.as_ref());
                None
            }
            Err(e @ SnapshotError::Read { .. }) => {
                warn!(error = %e, "Failed to read stored session, starting signed out");
                None
            }
            Err(e @ SnapshotError::Parse(_)) => {
                warn!(error = %e, "Failed to restore session, clearing storage");
                snapshot::clear(self.store.as_ref());
                None
            }
        };

        let identity = {
            let mut inner = self.lock();
            if inner.state != SessionState::Restoring {
                // Signed out while reading storage
                return None;
            }
            match restored {
                Some(session) => {
                    let identity = session.identity.clone();
                    info!(
                        user_id = %identity.id,
                        expires_at = %session.expires_at,
                        "Session restored from storage"
                    );
                    inner.state = SessionState::Authenticated;
                    inner.session = Some(session);
                    Some(identity)
                }
                None => {
                    inner.state = SessionState::Unauthenticated;
                    None
                }
            }
        };

        self.observers.notify(identity.as_ref());
        identity
    }

    /// Run the credential exchange and sign in.
    ///
    /// Accepted only when signed out. A second call while one is in flight is
    /// rejected with `InProgress` before the provider is contacted. If the
    /// flow is abandoned (sign-out, cancel) before the provider answers, the
    /// late result is discarded with `Superseded`.
    pub async fn sign_in(&self) -> Result<Identity, SignInError> {
        let mut guard = self.begin_sign_in()?;
        let outcome = self.exchange().await;
        guard.armed = false;
        self.finish_sign_in(guard.generation, outcome)
    }

    fn begin_sign_in(&self) -> Result<AuthenticatingGuard<'_>, SignInError> {
        // A session past its expiry no longer blocks a fresh sign-in
        self.expire_if_due();

        let mut inner = self.lock();
        match inner.state {
            SessionState::Unauthenticated => {}
            SessionState::Authenticating => {
                debug!("Sign-in already in progress, rejecting");
                return Err(SignInError::InProgress);
            }
            state => {
                debug!(state = %state, "Sign-in rejected");
                return Err(SignInError::InvalidState(state));
            }
        }

        inner.generation += 1;
        inner.state = SessionState::Authenticating;
        debug!(generation = inner.generation, "Sign-in started");

        Ok(AuthenticatingGuard {
            manager: self,
            generation: inner.generation,
            armed: true,
        })
    }

    async fn exchange(&self) -> Result<Exchanged, SignInError> {
        let credential = self.provider.request_credential().await?;
        let lifetime_secs = credential
            .expires_in()
            .unwrap_or(self.config.default_lifetime_secs);
        if lifetime_secs > MAX_LIFETIME_SECS {
            return Err(SignInError::Decoding(format!(
                "credential lifetime {}s exceeds {}s",
                lifetime_secs, MAX_LIFETIME_SECS
            )));
        }

        match credential {
            Credential::IdToken { token, .. } => Ok(Exchanged {
                identity: decode_id_token(&token)?,
                access_token: None,
                lifetime_secs,
            }),
            Credential::AccessToken { token, .. } => {
                let identity =
                    tokio::time::timeout(self.profile_timeout, self.profiles.fetch_profile(&token))
                        .await
                        .map_err(|_| {
                            SignInError::Fetch(format!(
                                "profile fetch timed out after {}ms",
                                self.profile_timeout.as_millis()
                            ))
                        })??;

                if !identity.is_complete() {
                    return Err(SignInError::Decoding(
                        "profile is missing id or email".to_string(),
                    ));
                }

                Ok(Exchanged {
                    identity,
                    access_token: Some(token),
                    lifetime_secs,
                })
            }
        }
    }

    fn finish_sign_in(
        &self,
        generation: u64,
        outcome: Result<Exchanged, SignInError>,
    ) -> Result<Identity, SignInError> {
        let session = {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state != SessionState::Authenticating {
                warn!(
                    generation = generation,
                    current_generation = inner.generation,
                    state = %inner.state,
                    "Discarding stale sign-in result"
                );
                return Err(SignInError::Superseded);
            }

            let (session, access_token) = match outcome.and_then(Exchanged::into_session) {
                Ok(built) => built,
                Err(e) => {
                    inner.state = SessionState::Unauthenticated;
                    warn!(kind = %e.kind(), error = %e, "Sign-in failed");
                    return Err(e);
                }
            };

            if let Err(e) = snapshot::save(self.store.as_ref(), &session, access_token.as_deref()) {
                // Stay signed in for this run; the next launch starts signed out
                warn!(error = %e, "Failed to persist session");
                snapshot::clear(self.store.as_ref());
            }

            inner.state = SessionState::Authenticated;
            inner.session = Some(session.clone());
            session
        };

        info!(
            user_id = %session.identity.id,
            expires_at = %session.expires_at,
            "Signed in"
        );
        self.observers.notify(Some(&session.identity));
        Ok(session.identity)
    }

    /// Abandon an in-flight sign-in. Returns true if one was pending.
    pub fn cancel_sign_in(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != SessionState::Authenticating {
            return false;
        }
        inner.generation += 1;
        inner.state = SessionState::Unauthenticated;
        info!("Sign-in cancelled");
        true
    }

    /// Clear the session and persisted storage. Idempotent.
    pub fn sign_out(&self) {
        let previous = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.state = SessionState::Unauthenticated;
            inner.session.take()
        };

        snapshot::clear(self.store.as_ref());

        match previous {
            Some(session) => {
                info!(user_id = %session.identity.id, "Signed out");
                self.observers.notify(None);
            }
            None => debug!("Sign-out with no active session"),
        }
    }

    /// Sign out an authenticated session whose credential is within the skew
    /// buffer of its expiry. Returns true if the session was expired.
    pub fn expire_if_due(&self) -> bool {
        let expired = {
            let mut inner = self.lock();
            let due = inner.state == SessionState::Authenticated
                && inner
                    .session
                    .as_ref()
                    .is_some_and(|s| s.is_expired(self.config.expiry_skew_secs));
            if !due {
                return false;
            }
            inner.generation += 1;
            inner.state = SessionState::Unauthenticated;
            inner.session.take()
        };

        snapshot::clear(self.store.as_ref());

        if let Some(session) = expired {
            info!(
                user_id = %session.identity.id,
                expires_at = %session.expires_at,
                "Session expired"
            );
        }
        self.observers.notify(None);
        true
    }
}

/// Returns the manager to `Unauthenticated` if a sign-in future is dropped
/// before the exchange completes.
struct AuthenticatingGuard<'a> {
    manager: &'a SessionManager,
    generation: u64,
    armed: bool,
}

impl Drop for AuthenticatingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.manager.lock();
        if inner.generation == self.generation && inner.state == SessionState::Authenticating {
            inner.generation += 1;
            inner.state = SessionState::Unauthenticated;
            debug!("Sign-in abandoned before completion");
        }
    }
}

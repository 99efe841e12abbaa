//! Background expiry watch.
//!
//! Periodically signs out a session whose credential has reached its expiry
//! buffer, so gated screens lock without waiting for the next user action.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info};

use super::manager::SessionManager;

/// Default check interval in seconds.
pub const DEFAULT_EXPIRY_CHECK_INTERVAL_SECS: u64 = 60;

/// Spawn a background task that periodically expires a stale session.
///
/// Returns a `JoinHandle` that can be used to abort the task.
pub fn spawn_expiry_watch(
    manager: Arc<SessionManager>,
    check_interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(check_interval_secs));

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            if manager.expire_if_due() {
                info!("Expiry watch signed out stale session");
            } else {
                debug!(state = %manager.state(), "Expiry watch: nothing to expire");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SignInError;
    use crate::provider::{Credential, CredentialProvider, ProfileSource};
    use crate::session::config::SessionConfig;
    use crate::session::store::MemoryStore;
    use crate::session::types::{Identity, SessionState};
    use async_trait::async_trait;

    struct ShortLivedToken;

    #[async_trait]
    impl CredentialProvider for ShortLivedToken {
        async fn request_credential(&self) -> Result<Credential, SignInError> {
            Ok(Credential::IdToken {
                token: crate::provider::id_token::tests::mint(
                    serde_json::json!({"sub": "42", "email": "x@y.com"}),
                ),
                expires_in: Some(2),
            })
        }
    }

    struct NoProfiles;

    #[async_trait]
    impl ProfileSource for NoProfiles {
        async fn fetch_profile(&self, _access_token: &str) -> Result<Identity, SignInError> {
            Err(SignInError::Network("not used".to_string()))
        }
    }

    #[tokio::test]
    async fn test_expiry_watch_signs_out() {
        let store = Arc::new(MemoryStore::new());
        let config = SessionConfig {
            expiry_skew_secs: 0,
            ..Default::default()
        };
        let manager = Arc::new(SessionManager::new(
            config,
            store.clone(),
            Arc::new(ShortLivedToken),
            Arc::new(NoProfiles),
        ));
        manager.restore();
        manager.sign_in().await.unwrap();
        assert_eq!(manager.state(), SessionState::Authenticated);

        let handle = spawn_expiry_watch(Arc::clone(&manager), 1);

        // Credential lives two seconds; give the watch time to notice
        tokio::time::sleep(Duration::from_millis(3500)).await;
        handle.abort();

        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert_eq!(manager.current_identity(), None);
        assert!(store.is_empty());
    }
}

//! Profile-info exchange for opaque access tokens.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::config::ProviderConfig;
use super::ProfileSource;
use crate::error::SignInError;
use crate::session::Identity;

/// Fetches the signed-in user's profile from the provider's userinfo endpoint.
pub struct UserInfoClient {
    /// Profile-info endpoint URL
    userinfo_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl UserInfoClient {
    /// Create a client using the configured endpoint and timeout.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.userinfo_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            userinfo_url: config.userinfo_url.clone(),
            http_client,
        })
    }
}

#[async_trait]
impl ProfileSource for UserInfoClient {
    async fn fetch_profile(&self, access_token: &str) -> Result<Identity, SignInError> {
        debug!(url = %self.userinfo_url, "Fetching user info");

        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SignInError::Fetch(format!("user info request timed out: {}", e))
                } else {
                    SignInError::Network(format!("user info request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "User info endpoint returned error status");
            return Err(SignInError::Fetch(format!(
                "user info endpoint returned status {}",
                status
            )));
        }

        let identity: Identity = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SignInError::Fetch(format!("user info body timed out: {}", e))
            } else {
                SignInError::Decoding(format!("user info body is not a profile: {}", e))
            }
        })?;

        if !identity.is_complete() {
            return Err(SignInError::Decoding(
                "user info is missing 'id' or 'email'".to_string(),
            ));
        }

        debug!(user_id = %identity.id, "User info received");
        Ok(identity)
    }
}

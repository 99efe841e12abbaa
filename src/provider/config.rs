//! Identity provider configuration.

use serde::{Deserialize, Serialize};

/// Google identity provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// OAuth client ID registered for the app.
    #[serde(default)]
    pub client_id: String,

    /// Scopes requested by the token flow.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Authorization endpoint the implicit-grant redirect flow starts at.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Profile-info endpoint used to exchange an access token for an identity.
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,

    /// Timeout for the profile-info fetch in seconds.
    #[serde(default = "default_userinfo_timeout")]
    pub userinfo_timeout_secs: u64,
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/userinfo.profile".to_string(),
        "https://www.googleapis.com/auth/userinfo.email".to_string(),
    ]
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v2/userinfo".to_string()
}

fn default_userinfo_timeout() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            scopes: default_scopes(),
            auth_url: default_auth_url(),
            userinfo_url: default_userinfo_url(),
            userinfo_timeout_secs: default_userinfo_timeout(),
        }
    }
}

impl ProviderConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.userinfo_url.starts_with("https://") && !self.userinfo_url.starts_with("http://") {
            return Err("userinfo_url must be a valid HTTP(S) URL".to_string());
        }

        if self.userinfo_timeout_secs == 0 {
            return Err("userinfo_timeout_secs must be positive".to_string());
        }

        Ok(())
    }

    /// Space-separated scope string as sent to the provider.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }

    /// URL that starts the redirect token flow; the provider answers on
    /// `redirect_uri` with the token in the fragment.
    pub fn authorization_url(&self, redirect_uri: &str) -> Result<String, String> {
        if self.client_id.is_empty() {
            return Err("client_id is required to build an authorization URL".to_string());
        }

        Ok(format!(
            "{}?client_id={}&redirect_uri={}&response_type=token&scope={}&include_granted_scopes=true",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.scope_param()),
        ))
    }
}

/// JSON overlay for partial overrides from a config file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ProviderConfigJson {
    pub client_id: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub auth_url: Option<String>,
    pub userinfo_url: Option<String>,
    pub userinfo_timeout_secs: Option<u64>,
}

impl ProviderConfigJson {
    /// Apply JSON config to existing config.
    pub fn apply_to(&self, config: &mut ProviderConfig) {
        if let Some(ref client_id) = self.client_id {
            config.client_id = client_id.clone();
        }
        if !self.scopes.is_empty() {
            config.scopes = self.scopes.clone();
        }
        if let Some(ref url) = self.auth_url {
            config.auth_url = url.clone();
        }
        if let Some(ref url) = self.userinfo_url {
            config.userinfo_url = url.clone();
        }
        if let Some(timeout) = self.userinfo_timeout_secs {
            config.userinfo_timeout_secs = timeout;
        }
    }
}

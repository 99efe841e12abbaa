//! Session configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::MAX_LIFETIME_SECS;

/// Session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Safety margin subtracted from the expiry before a credential is trusted.
    #[serde(default = "default_expiry_skew")]
    pub expiry_skew_secs: u64,

    /// Credential lifetime when the provider does not declare one.
    #[serde(default = "default_lifetime")]
    pub default_lifetime_secs: u64,

    /// Location of the durable local storage file.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// How often the expiry watch checks an active session.
    #[serde(default = "default_expiry_check_interval")]
    pub expiry_check_interval_secs: u64,
}

fn default_expiry_skew() -> u64 {
    300 // 5 minutes
}

fn default_lifetime() -> u64 {
    3600 // 1 hour
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".parcel-session/local.redb")
}

fn default_expiry_check_interval() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_skew_secs: default_expiry_skew(),
            default_lifetime_secs: default_lifetime(),
            store_path: default_store_path(),
            expiry_check_interval_secs: default_expiry_check_interval(),
        }
    }
}

impl SessionConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_lifetime_secs == 0 {
            return Err("default_lifetime_secs must be positive".to_string());
        }

        if self.default_lifetime_secs > MAX_LIFETIME_SECS {
            return Err(format!("default_lifetime_secs must not exceed {}", MAX_LIFETIME_SECS));
        }

        if self.expiry_skew_secs > MAX_LIFETIME_SECS {
            return Err(format!("expiry_skew_secs must not exceed {}", MAX_LIFETIME_SECS));
        }

        if self.expiry_check_interval_secs == 0 {
            return Err("expiry_check_interval_secs must be positive".to_string());
        }

        if self.store_path.as_os_str().is_empty() {
            return Err("store_path is required".to_string());
        }

        Ok(())
    }
}

/// JSON overlay for partial overrides from a config file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct SessionConfigJson {
    pub expiry_skew_secs: Option<u64>,
    pub default_lifetime_secs: Option<u64>,
    pub store_path: Option<PathBuf>,
    pub expiry_check_interval_secs: Option<u64>,
}

impl SessionConfigJson {
    /// Apply JSON config to existing config.
    pub fn apply_to(&self, config: &mut SessionConfig) {
        if let Some(skew) = self.expiry_skew_secs {
            config.expiry_skew_secs = skew;
        }
        if let Some(lifetime) = self.default_lifetime_secs {
            config.default_lifetime_secs = lifetime;
        }
        if let Some(ref path) = self.store_path {
            config.store_path = path.clone();
        }
        if let Some(interval) = self.expiry_check_interval_secs {
            config.expiry_check_interval_secs = interval;
        }
    }
}

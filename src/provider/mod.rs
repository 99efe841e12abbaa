//! Identity provider seam.
//!
//! The session manager talks to the provider through two traits: one that
//! runs the credential flow and one that exchanges an access token for a
//! profile. Concrete adapters live in the submodules.

pub mod callback;
pub mod config;
pub mod id_token;
pub mod userinfo;

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::SignInError;
use crate::session::Identity;

pub use callback::parse_callback;
pub use config::{ProviderConfig, ProviderConfigJson};
pub use id_token::decode_id_token;
pub use userinfo::UserInfoClient;

/// Result of a successful credential exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Signed identity token; identity is decoded from its payload.
    IdToken {
        token: String,
        expires_in: Option<u64>,
    },
    /// Opaque access token; identity comes from the profile-info endpoint.
    AccessToken {
        token: String,
        expires_in: Option<u64>,
    },
}

impl Credential {
    /// Lifetime declared by the provider, if any.
    pub fn expires_in(&self) -> Option<u64> {
        match self {
            Credential::IdToken { expires_in, .. } | Credential::AccessToken { expires_in, .. } => {
                *expires_in
            }
        }
    }
}

/// Runs the provider's interactive credential flow (popup, redirect, ...).
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn request_credential(&self) -> Result<Credential, SignInError>;
}

/// Exchanges an access token for the user's profile.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, access_token: &str) -> Result<Identity, SignInError>;
}

/// A credential that was obtained out of band, e.g. a callback URL pasted
/// into the CLI. It is handed out once; later requests report cancellation.
pub struct PresentedCredential {
    credential: Mutex<Option<Result<Credential, SignInError>>>,
}

impl PresentedCredential {
    /// A provider that hands out `credential` once.
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(Ok(credential))),
        }
    }

    /// A provider with nothing to hand out; every request reports cancellation.
    pub fn empty() -> Self {
        Self {
            credential: Mutex::new(None),
        }
    }

    /// Build from a redirect callback URL or fragment.
    pub fn from_callback(url_or_fragment: &str) -> Self {
        Self {
            credential: Mutex::new(Some(parse_callback(url_or_fragment))),
        }
    }
}

#[async_trait]
impl CredentialProvider for PresentedCredential {
    async fn request_credential(&self) -> Result<Credential, SignInError> {
        let taken = self
            .credential
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        taken.unwrap_or(Err(SignInError::Cancelled))
    }
}

//! Identity and session types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The signed-in principal, as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable subject identifier (`sub` claim or profile `id`).
    pub id: String,

    /// Provider-verified email address.
    pub email: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Avatar URL.
    #[serde(default)]
    pub picture: Option<String>,
}

impl Identity {
    /// An identity is usable only with a non-empty subject and email.
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.email.is_empty()
    }

    /// Greeting shown on the home and booking screens.
    pub fn greeting(&self) -> String {
        let name = if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        };
        format!("Welcome back, {}!", name)
    }
}

/// Lifecycle state of the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Restoring,
    Unauthenticated,
    Authenticating,
    Authenticated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Initializing => write!(f, "initializing"),
            SessionState::Restoring => write!(f, "restoring"),
            SessionState::Unauthenticated => write!(f, "unauthenticated"),
            SessionState::Authenticating => write!(f, "authenticating"),
            SessionState::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// An authenticated identity together with its credential expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

/// Longest credential lifetime accepted from a provider (366 days).
pub const MAX_LIFETIME_SECS: u64 = 366 * 24 * 60 * 60;

/// `secs` as a chrono duration, `None` if it does not fit.
pub(crate) fn seconds(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}

impl Session {
    /// Create a session whose credential lives for `lifetime_secs` from now.
    ///
    /// Returns `None` when the expiry is not representable.
    pub fn new(identity: Identity, lifetime_secs: u64) -> Option<Self> {
        let expires_at = seconds(lifetime_secs).and_then(|d| Utc::now().checked_add_signed(d))?;
        Some(Self {
            identity,
            expires_at,
        })
    }

    /// True once `now` is within `skew_secs` of the expiry. An expiry too
    /// close to the start of time to subtract the skew from is expired.
    pub fn is_expired(&self, skew_secs: u64) -> bool {
        match seconds(skew_secs).and_then(|skew| self.expires_at.checked_sub_signed(skew)) {
            Some(trusted_until) => Utc::now() >= trusted_until,
            None => true,
        }
    }
}

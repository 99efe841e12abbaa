//! Sign-in failures and their caller-visible kinds.

use std::fmt;

use thiserror::Error;

use crate::session::SessionState;

/// Coarse classification of a sign-in failure, as reported to the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or incomplete identity payload.
    Decoding,
    /// Non-success status (or timeout) from the profile-info endpoint.
    Fetch,
    /// Transport failure or provider-side error.
    Network,
    /// The user abandoned the provider flow, or the flow was superseded.
    Cancelled,
    /// The state machine refused the call.
    Rejected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Decoding => write!(f, "decode"),
            ErrorKind::Fetch => write!(f, "fetch"),
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::Rejected => write!(f, "rejected"),
        }
    }
}

/// Why a `sign_in()` call did not produce an identity.
#[derive(Debug, Error)]
pub enum SignInError {
    #[error("identity payload rejected: {0}")]
    Decoding(String),

    #[error("profile fetch failed: {0}")]
    Fetch(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("sign-in cancelled by user")]
    Cancelled,

    /// The identity provider answered with an OAuth error code.
    #[error("identity provider returned error '{code}'")]
    Provider { code: String },

    /// The result arrived after the flow was abandoned and was discarded.
    #[error("sign-in result discarded: flow was superseded")]
    Superseded,

    #[error("sign-in already in progress")]
    InProgress,

    #[error("sign-in not accepted while {0}")]
    InvalidState(SessionState),
}

impl SignInError {
    /// Provider error codes that mean the user walked away from the flow.
    const CANCEL_CODES: &'static [&'static str] =
        &["access_denied", "popup_closed", "popup_closed_by_user", "user_cancelled"];

    pub fn kind(&self) -> ErrorKind {
        match self {
            SignInError::Decoding(_) => ErrorKind::Decoding,
            SignInError::Fetch(_) => ErrorKind::Fetch,
            SignInError::Network(_) => ErrorKind::Network,
            SignInError::Cancelled | SignInError::Superseded => ErrorKind::Cancelled,
            SignInError::Provider { code } => {
                if Self::CANCEL_CODES.contains(&code.as_str()) {
                    ErrorKind::Cancelled
                } else {
                    ErrorKind::Network
                }
            }
            SignInError::InProgress | SignInError::InvalidState(_) => ErrorKind::Rejected,
        }
    }
}

/// Corrupt persisted snapshot. Only ever seen inside `restore()`.
#[derive(Debug, Error)]
#[error("stored session unreadable: {0}")]
pub(crate) struct StorageParseError(pub(crate) String);

/// Why the persisted snapshot could not be loaded.
#[derive(Debug, Error)]
pub(crate) enum SnapshotError {
    /// The store itself failed; whatever it holds may still be valid.
    #[error("failed to read {key}: {message}")]
    Read { key: &'static str, message: String },

    #[error(transparent)]
    Parse(#[from] StorageParseError),
}

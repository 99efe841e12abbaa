//! Persisted session snapshot layout.
//!
//! Three local storage keys hold the snapshot: the identity as JSON, the
//! expiry as epoch milliseconds, and optionally the raw access token. They are
//! written and cleared together.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::store::KeyValueStore;
use super::types::{seconds, Identity, Session, MAX_LIFETIME_SECS};
use crate::error::{SnapshotError, StorageParseError};

pub const USER_KEY: &str = "google_user";
pub const EXPIRY_KEY: &str = "google_token_expiry";
pub const ACCESS_TOKEN_KEY: &str = "google_access_token";

/// Read the stored snapshot.
///
/// `Ok(None)` when nothing is stored. `SnapshotError::Read` when the store
/// fails, `SnapshotError::Parse` when something is stored but is incomplete,
/// unparseable or carries an expiry no sign-in could have written.
pub(crate) fn load(store: &dyn KeyValueStore) -> std::result::Result<Option<Session>, SnapshotError> {
    let user = read(store, USER_KEY)?;
    let expiry = read(store, EXPIRY_KEY)?;

    let (user, expiry) = match (user, expiry) {
        (None, None) => return Ok(None),
        (Some(user), Some(expiry)) => (user, expiry),
        (Some(_), None) => {
            return Err(StorageParseError("identity stored without expiry".into()).into())
        }
        (None, Some(_)) => {
            return Err(StorageParseError("expiry stored without identity".into()).into())
        }
    };

    let millis: i64 = expiry
        .trim()
        .parse()
        .map_err(|e| StorageParseError(format!("expiry '{}': {}", expiry, e)))?;
    let expires_at = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| StorageParseError(format!("expiry {} out of range", millis)))?;
    let latest = seconds(MAX_LIFETIME_SECS).and_then(|d| Utc::now().checked_add_signed(d));
    if latest.map_or(true, |latest| expires_at > latest) {
        return Err(StorageParseError(format!("expiry {} too far in the future", expires_at)).into());
    }

    let identity: Identity = serde_json::from_str(&user)
        .map_err(|e| StorageParseError(format!("identity: {}", e)))?;
    if !identity.is_complete() {
        return Err(StorageParseError("identity missing id or email".into()).into());
    }

    Ok(Some(Session {
        identity,
        expires_at,
    }))
}

fn read(store: &dyn KeyValueStore, key: &'static str) -> std::result::Result<Option<String>, SnapshotError> {
    store.get(key).map_err(|e| SnapshotError::Read {
        key,
        message: e.to_string(),
    })
}

/// Persist identity and expiry, plus the access token when one was used.
pub(crate) fn save(
    store: &dyn KeyValueStore,
    session: &Session,
    access_token: Option<&str>,
) -> Result<()> {
    let user = serde_json::to_string(&session.identity).context("Failed to serialize identity")?;
    store.set(USER_KEY, &user)?;
    store.set(EXPIRY_KEY, &session.expires_at.timestamp_millis().to_string())?;
    match access_token {
        Some(token) => store.set(ACCESS_TOKEN_KEY, token)?,
        None => store.remove(ACCESS_TOKEN_KEY)?,
    }

    debug!(
        user_id = %session.identity.id,
        expires_at = %session.expires_at,
        "Session snapshot stored"
    );
    Ok(())
}

/// Remove all snapshot keys. Failures are logged, never raised.
pub(crate) fn clear(store: &dyn KeyValueStore) {
    for key in [USER_KEY, EXPIRY_KEY, ACCESS_TOKEN_KEY] {
        if let Err(e) = store.remove(key) {
            warn!(key = key, error = %e, "Failed to clear storage key");
        }
    }
}

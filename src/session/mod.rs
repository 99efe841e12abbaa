//! Client-side authentication session.
//!
//! This module owns the signed-in identity: restoring it from durable local
//! storage at startup, signing in through the identity provider, expiring it
//! and publishing every change to subscribers.

pub mod config;
pub mod expiry;
pub mod manager;
mod observers;
pub mod snapshot;
pub mod store;
pub mod types;

pub use config::{SessionConfig, SessionConfigJson};
pub use expiry::{spawn_expiry_watch, DEFAULT_EXPIRY_CHECK_INTERVAL_SECS};
pub use manager::SessionManager;
pub use observers::Subscription;
pub use store::{KeyValueStore, MemoryStore, RedbStore};
pub use types::{Identity, Session, SessionState};

//! Parcel booking sign-in session.
//!
//! Client-side Google sign-in session for the parcel delivery booking app:
//! restores a stored session at launch, signs in with an identity token or an
//! access token exchanged at the profile-info endpoint, expires and clears the
//! session, and notifies the view layer of every identity change.

pub mod error;
pub mod provider;
pub mod session;

pub use error::{ErrorKind, SignInError};
pub use provider::{
    Credential, CredentialProvider, PresentedCredential, ProfileSource, ProviderConfig,
    UserInfoClient,
};
pub use session::{
    Identity, KeyValueStore, MemoryStore, RedbStore, SessionConfig, SessionManager, SessionState,
    Subscription,
};

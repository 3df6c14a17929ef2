//! Credential lifecycle: storage, attachment and single-flight refresh
//!
//! - [`Credential`] - the bearer token pair and its expiry
//! - [`CredentialStore`] - durable client-side key/value storage
//! - [`TokenRefresher`] - exchanges a refresh token for a new credential
//! - [`TokenManager`] - the only component that reads or writes the live
//!   credential

mod credential;
mod manager;
mod refresher;
mod store;

pub use credential::Credential;
pub use manager::{AuthGeneration, TokenManager};
pub use refresher::{DEFAULT_REFRESH_PATH, HttpTokenRefresher, RefreshError, TokenRefresher};
pub use store::{ACCESS_TOKEN_KEY, CredentialStore, FileStore, MemoryStore, REFRESH_TOKEN_KEY};

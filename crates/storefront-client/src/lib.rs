//! # Storefront API client
//!
//! The shared transport layer every storefront screen routes its API calls
//! through:
//! - Deterministic retry with linear or exponential backoff and escalating
//!   timeouts
//! - Bearer-token attach, expiry detection and single-flight refresh
//! - Uniform failure classification with human-readable messages
//! - Durable credential storage that survives restarts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use storefront_client::{Client, auth::{Credential, FileStore}};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .base_url("https://shop.example.com/api")
//!         .credential_store(Arc::new(FileStore::new("credentials.json")))
//!         .build()
//!         .await?;
//!
//!     if !client.is_authenticated() {
//!         client
//!             .login(Credential::new("access").with_refresh_token("refresh"))
//!             .await?;
//!     }
//!
//!     let cart = client.get("/cart").await?;
//!     println!("{}", cart.body());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export commonly used types
pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use crate::http::{ApiResponse, CancelHandle, RequestOptions};
pub use storefront_core::FailureKind;

// Module declarations
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod observability;

// Re-export key dependencies for convenience
pub use async_trait::async_trait;
pub use serde_json::Value as JsonValue;

/// Prelude module for common imports
///
/// # Examples
///
/// ```rust
/// use storefront_client::prelude::*;
/// ```
pub mod prelude {

    pub use crate::{
        ApiResponse, CancelHandle, Client, ClientConfig, Error, FailureKind, RequestOptions,
        Result,
        auth::{Credential, CredentialStore, FileStore, MemoryStore},
        http::Method,
    };
}

/// Crate version, automatically updated from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default `user-agent` header value
pub const DEFAULT_USER_AGENT: &str = concat!("storefront-client/", env!("CARGO_PKG_VERSION"));

/// Header carrying the per-call request id, identical across retries
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_constants() {
        assert!(DEFAULT_USER_AGENT.starts_with("storefront-client/"));
        assert_eq!(REQUEST_ID_HEADER, "x-request-id");
    }
}

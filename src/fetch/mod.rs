//! Guarded retrieval of spec documents over HTTP(S).
//!
//! # Features
//!
//! - Only `http`/`https` URLs, checked before any network activity
//! - Loopback, private and link-local host patterns rejected (also on redirects)
//! - 15 second wall-clock timeout covering headers and body
//! - 3 MiB cap, checked against `Content-Length` and while streaming the body
//!
//! The pipeline depends on the [`SpecSource`] trait rather than on
//! [`SecureFetcher`] directly, so alternative sources can be plugged in.

mod client;
pub mod constants;
mod error;
mod guard;

pub use client::{FetchPolicy, FetchResult, SecureFetcher};
pub use error::FetchError;
pub use guard::{check_target, is_private_host, parse_target};

use async_trait::async_trait;

/// Something that can turn a URL into a document body.
#[async_trait]
pub trait SpecSource: Send + Sync {
    /// Retrieves the document at `url`.
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError>;
}

#[async_trait]
impl SpecSource for SecureFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        SecureFetcher::fetch(self, url).await
    }
}

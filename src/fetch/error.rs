//! Error types for the fetch module.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while retrieving a spec document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL did not parse as an absolute URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL string.
        url: String,
    },

    /// The URL scheme is not `http` or `https`.
    #[error("unsupported scheme '{scheme}' in {url}")]
    InvalidProtocol {
        /// The rejected URL.
        url: String,
        /// The offending scheme.
        scheme: String,
    },

    /// The host looks like a loopback, link-local or private address.
    #[error("private or local host '{host}' is not allowed")]
    PrivateHost {
        /// The rejected host, without IPv6 brackets.
        host: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Canonical reason phrase, empty when unknown.
        reason: String,
    },

    /// The body is (or declares to be) larger than the configured limit.
    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge {
        /// The URL being fetched.
        url: String,
        /// The byte limit that was exceeded.
        limit: u64,
    },

    /// The request did not finish within the fetch timeout.
    #[error("timeout after {}s fetching {url}", .after.as_secs())]
    Timeout {
        /// The URL that timed out.
        url: String,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// Any other transport failure (DNS, connect, TLS, reset, body read).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// The builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an unsupported scheme error.
    pub fn invalid_protocol(url: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self::InvalidProtocol {
            url: url.into(),
            scheme: scheme.into(),
        }
    }

    /// Creates a private host error.
    pub fn private_host(host: impl Into<String>) -> Self {
        Self::PrivateHost { host: host.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: reqwest::StatusCode) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }

    /// Creates a body size error.
    pub fn too_large(url: impl Into<String>, limit: u64) -> Self {
        Self::TooLarge {
            url: url.into(),
            limit,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            url: url.into(),
            after,
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }
}

// No `From<reqwest::Error>`: every variant needs the URL for context, and
// reqwest errors raised by the redirect policy need unwrapping first.

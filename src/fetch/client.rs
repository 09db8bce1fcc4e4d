//! Bounded HTTP retrieval of spec documents.
//!
//! This module provides the [`SecureFetcher`] struct which enforces the URL
//! guard, a hard wall-clock timeout and a byte cap on every request.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{ACCEPT_SPEC, CONNECT_TIMEOUT, FETCH_TIMEOUT, MAX_REDIRECTS, MAX_SOURCE_BYTES};
use super::error::FetchError;
use super::guard::{check_target, parse_target};
use crate::user_agent;

/// Limits applied to every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Wall-clock budget for the whole request, body included.
    pub timeout: Duration,
    /// Largest body accepted, in bytes.
    pub max_bytes: u64,
    /// Skip the private host check. Intended for local development only.
    pub allow_private_hosts: bool,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: FETCH_TIMEOUT,
            max_bytes: MAX_SOURCE_BYTES,
            allow_private_hosts: false,
        }
    }
}

/// A retrieved document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Final URL after redirects.
    pub url: String,
    /// Body decoded as UTF-8 (invalid sequences replaced).
    pub text: String,
    /// `Content-Type` response header, empty when absent.
    pub content_type: String,
    /// Number of body bytes received.
    pub byte_length: u64,
}

/// HTTP client that only fetches public HTTP(S) URLs within size and time limits.
///
/// Create once and reuse; the inner client pools connections.
///
/// # Example
///
/// ```no_run
/// use spec_fetch_core::fetch::{FetchPolicy, SecureFetcher};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = SecureFetcher::new(FetchPolicy::default())?;
/// let result = fetcher.fetch("https://petstore3.swagger.io/api/v3/openapi.json").await?;
/// println!("{} bytes of {}", result.byte_length, result.content_type);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SecureFetcher {
    client: Client,
    policy: FetchPolicy,
}

impl SecureFetcher {
    /// Creates a fetcher enforcing `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    #[instrument(level = "debug")]
    pub fn new(policy: FetchPolicy) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(policy.timeout))
            .gzip(true)
            .user_agent(user_agent::default_fetch_user_agent())
            .redirect(redirect_policy(policy.allow_private_hosts))
            .build()
            .map_err(|source| FetchError::Client { source })?;
        Ok(Self { client, policy })
    }

    /// Returns the limits this fetcher enforces.
    #[must_use]
    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Fetches `url` and returns its body.
    ///
    /// The scheme and host are checked before any network activity. The
    /// request (headers and body) is cancelled when the policy timeout
    /// elapses.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`], [`FetchError::InvalidProtocol`],
    ///   [`FetchError::PrivateHost`] from the pre-flight checks
    /// - [`FetchError::HttpStatus`] for non-2xx responses
    /// - [`FetchError::TooLarge`] when `Content-Length` or the received body
    ///   exceeds the byte cap
    /// - [`FetchError::Timeout`] when the timeout elapses
    /// - [`FetchError::Network`] for any other transport failure
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let target = parse_target(url, self.policy.allow_private_hosts)?;

        // Dropping the inner future on expiry aborts the in-flight request and
        // the timer is released with it on every path.
        if let Ok(result) = tokio::time::timeout(self.policy.timeout, self.fetch_checked(target)).await {
            result
        } else {
            warn!(timeout_secs = self.policy.timeout.as_secs(), "fetch timed out");
            Err(FetchError::timeout(url, self.policy.timeout))
        }
    }

    async fn fetch_checked(&self, target: Url) -> Result<FetchResult, FetchError> {
        let url = target.to_string();
        debug!("sending request");

        let response = self
            .client
            .get(target)
            .header(ACCEPT, ACCEPT_SPEC)
            .send()
            .await
            .map_err(|e| self.classify(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "upstream returned error status");
            return Err(FetchError::http_status(&url, status));
        }

        let max_bytes = self.policy.max_bytes;
        if let Some(declared) = declared_content_length(&response)
            && declared > max_bytes
        {
            warn!(declared, max_bytes, "declared content length over limit");
            return Err(FetchError::too_large(&url, max_bytes));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = self.read_body_capped(response, &url).await?;
        let byte_length = body.len() as u64;

        info!(
            bytes = byte_length,
            content_type = %content_type,
            final_url = %final_url,
            "fetch complete"
        );

        Ok(FetchResult {
            url: final_url,
            text: String::from_utf8_lossy(&body).into_owned(),
            content_type,
            byte_length,
        })
    }

    /// Reads the body, stopping as soon as it grows past the byte cap.
    async fn read_body_capped(
        &self,
        response: reqwest::Response,
        url: &str,
    ) -> Result<Vec<u8>, FetchError> {
        let max_bytes = self.policy.max_bytes;
        let mut stream = response.bytes_stream();
        let mut body = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| self.classify(url, e))?;
            if body.len() as u64 + chunk.len() as u64 > max_bytes {
                warn!(max_bytes, "response body over limit");
                return Err(FetchError::too_large(url, max_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }

    fn classify(&self, url: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            return FetchError::timeout(url, self.policy.timeout);
        }
        if error.is_redirect()
            && let Some(blocked) = blocked_redirect(&error)
        {
            return blocked;
        }
        FetchError::network(url, error)
    }
}

/// Follows redirects only to targets that pass the same checks as the
/// original URL.
fn redirect_policy(allow_private_hosts: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("more than {MAX_REDIRECTS} redirects"));
        }
        match check_target(attempt.url(), allow_private_hosts) {
            Ok(()) => attempt.follow(),
            Err(blocked) => attempt.error(blocked),
        }
    })
}

/// Recovers the guard error raised inside the redirect policy.
fn blocked_redirect(error: &reqwest::Error) -> Option<FetchError> {
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        if let Some(fetch_error) = cause.downcast_ref::<FetchError>() {
            return match fetch_error {
                FetchError::PrivateHost { host } => Some(FetchError::private_host(host.clone())),
                FetchError::InvalidProtocol { url, scheme } => {
                    Some(FetchError::invalid_protocol(url.clone(), scheme.clone()))
                }
                _ => None,
            };
        }
        source = cause.source();
    }
    None
}

fn declared_content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_documented_limits() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.timeout, Duration::from_secs(15));
        assert_eq!(policy.max_bytes, 3_145_728);
        assert!(!policy.allow_private_hosts);
    }

    #[tokio::test]
    async fn test_fetch_rejects_ftp_before_network() {
        let fetcher = SecureFetcher::new(FetchPolicy::default()).unwrap();
        let err = fetcher.fetch("ftp://example.com/openapi.json").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidProtocol { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_fetch_rejects_private_host_before_network() {
        let fetcher = SecureFetcher::new(FetchPolicy::default()).unwrap();
        let err = fetcher
            .fetch("http://192.168.1.1/openapi.json")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::PrivateHost { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_fetch_rejects_unparseable_url() {
        let fetcher = SecureFetcher::new(FetchPolicy::default()).unwrap();
        let err = fetcher.fetch("::::").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }), "got {err:?}");
    }
}

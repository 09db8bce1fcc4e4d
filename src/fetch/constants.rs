//! Constants for the fetch module (limits, timeouts, headers).

use std::time::Duration;

/// Largest raw response body accepted (3 MiB).
pub const MAX_SOURCE_BYTES: u64 = 3 * 1024 * 1024;

/// Wall-clock budget for one fetch, covering connect, headers and body.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// TCP/TLS connect timeout; always within [`FETCH_TIMEOUT`].
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 5;

/// Accept header sent with spec requests.
pub const ACCEPT_SPEC: &str = "application/json, application/yaml;q=0.9, */*;q=0.8";

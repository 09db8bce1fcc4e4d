//! Pre-flight checks applied to every URL before a request is sent.
//!
//! The host check is a literal pattern match on the URL's host. It does not
//! resolve DNS, so a public name that resolves to a private address (DNS
//! rebinding) is not caught here.

use std::sync::LazyLock;

use regex::RegexSet;
use tracing::warn;
use url::{Host, Url};

use super::error::FetchError;

/// Host patterns treated as loopback, private or link-local.
#[allow(clippy::expect_used)]
static PRIVATE_HOST_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^localhost$",
        r"^127\.",
        r"^10\.",
        r"^172\.(1[6-9]|2[0-9]|3[0-1])\.",
        r"^192\.168\.",
        r"^::1$",
        r"(?i)^fc00:",
        r"(?i)^fe80:",
    ])
    .expect("private host patterns are valid") // Static patterns, safe to panic
});

/// Returns true if `host` matches one of the private/local host patterns.
///
/// IPv6 hosts are expected without brackets.
///
/// # Examples
///
/// ```
/// use spec_fetch_core::fetch::is_private_host;
///
/// assert!(is_private_host("localhost"));
/// assert!(is_private_host("192.168.1.20"));
/// assert!(is_private_host("fe80::1"));
/// assert!(!is_private_host("172.32.0.1"));
/// assert!(!is_private_host("api.example.com"));
/// ```
#[must_use]
pub fn is_private_host(host: &str) -> bool {
    PRIVATE_HOST_PATTERNS.is_match(host)
}

/// Parses `raw` and checks it with [`check_target`].
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] for unparseable input, otherwise the
/// errors of [`check_target`].
pub fn parse_target(raw: &str, allow_private_hosts: bool) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|_| FetchError::invalid_url(raw))?;
    check_target(&url, allow_private_hosts)?;
    Ok(url)
}

/// Checks that `url` may be fetched.
///
/// # Errors
///
/// - [`FetchError::InvalidProtocol`] when the scheme is not `http`/`https`
/// - [`FetchError::PrivateHost`] when the host matches a private pattern and
///   `allow_private_hosts` is false
pub fn check_target(url: &Url, allow_private_hosts: bool) -> Result<(), FetchError> {
    let scheme = url.scheme();
    if !matches!(scheme, "http" | "https") {
        warn!(url = %url, scheme, "rejected non-HTTP scheme");
        return Err(FetchError::invalid_protocol(url.as_str(), scheme));
    }

    if allow_private_hosts {
        return Ok(());
    }

    let host = host_label(url).unwrap_or_default();
    if is_private_host(&host) {
        warn!(url = %url, host = %host, "rejected private host");
        return Err(FetchError::private_host(host));
    }

    Ok(())
}

/// Host as matched by the private patterns: lowercase domain, dotted IPv4 or
/// unbracketed IPv6.
fn host_label(url: &Url) -> Option<String> {
    Some(match url.host()? {
        Host::Domain(domain) => domain.to_ascii_lowercase(),
        Host::Ipv4(addr) => addr.to_string(),
        Host::Ipv6(addr) => addr.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== is_private_host Tests ====================

    #[test]
    fn test_private_hosts_match() {
        let hosts = [
            "localhost",
            "LOCALHOST",
            "127.0.0.1",
            "127.10.20.30",
            "10.0.0.5",
            "172.16.0.1",
            "172.24.9.9",
            "172.31.255.255",
            "192.168.0.10",
            "::1",
            "fc00::abcd",
            "fe80::1",
        ];
        for host in hosts {
            assert!(is_private_host(host), "expected private: {host}");
        }
    }

    #[test]
    fn test_public_hosts_do_not_match() {
        let hosts = [
            "example.com",
            "8.8.8.8",
            "172.15.0.1",
            "172.32.0.1",
            "192.169.0.1",
            "11.0.0.1",
            "2001:db8::1",
            "my-localhost.dev",
        ];
        for host in hosts {
            assert!(!is_private_host(host), "expected public: {host}");
        }
    }

    // ==================== check_target Tests ====================

    #[test]
    fn test_check_target_accepts_public_https() {
        assert!(parse_target("https://api.example.com/openapi.json", false).is_ok());
        assert!(parse_target("http://api.example.com:8080/openapi.json", false).is_ok());
    }

    #[test]
    fn test_check_target_rejects_non_http_schemes() {
        for raw in [
            "ftp://example.com/openapi.json",
            "file:///etc/passwd",
            "gopher://example.com/",
        ] {
            let err = parse_target(raw, false).unwrap_err();
            assert!(
                matches!(err, FetchError::InvalidProtocol { .. }),
                "expected InvalidProtocol for {raw}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_check_target_protocol_checked_even_when_private_allowed() {
        let err = parse_target("ftp://localhost/spec", true).unwrap_err();
        assert!(matches!(err, FetchError::InvalidProtocol { .. }));
    }

    #[test]
    fn test_check_target_rejects_private_hosts() {
        for raw in [
            "http://localhost:3000/openapi.json",
            "http://127.0.0.1/openapi.json",
            "https://10.1.2.3/spec",
            "http://[::1]:8080/openapi.json",
            "http://[fe80::1]/openapi.json",
            "http://Localhost/openapi.json",
        ] {
            let err = parse_target(raw, false).unwrap_err();
            assert!(
                matches!(err, FetchError::PrivateHost { .. }),
                "expected PrivateHost for {raw}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_check_target_ipv6_host_has_no_brackets() {
        let err = parse_target("http://[::1]/x", false).unwrap_err();
        match err {
            FetchError::PrivateHost { host } => assert_eq!(host, "::1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_target_allows_private_when_configured() {
        assert!(parse_target("http://127.0.0.1:9999/openapi.json", true).is_ok());
    }

    #[test]
    fn test_parse_target_rejects_garbage() {
        let err = parse_target("not a url", false).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}

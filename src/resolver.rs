//! Docs URL to spec URL rewriting.
//!
//! People usually paste the address of a rendered documentation page
//! (`/docs`, `/redoc`, `/swagger-ui`) rather than the machine-readable
//! document behind it. [`resolve_spec_url`] guesses the `openapi.json`
//! address next to such a page. The guess is not guaranteed to exist; a 404
//! surfaces later as a fetch failure.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};
use url::Url;

/// File name appended to every rewritten path.
pub const SPEC_FILE_NAME: &str = "openapi.json";

#[allow(clippy::expect_used)]
static SPEC_SUFFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/openapi\.json$").expect("spec suffix regex is valid") // Static pattern, safe to panic
});

/// Trailing UI segment of well-known documentation renderers.
#[allow(clippy::expect_used)]
static DOCS_SUFFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:docs|redoc|swagger(?:-ui)?)/?$").expect("docs suffix regex is valid") // Static pattern, safe to panic
});

/// Rewrites a documentation URL into the most likely spec document URL.
///
/// Rules, first match wins:
/// 1. a path already ending in `/openapi.json` is returned unchanged;
/// 2. a trailing `/docs`, `/redoc`, `/swagger` or `/swagger-ui` segment
///    (with or without a trailing slash) is replaced by `openapi.json`;
/// 3. otherwise the fragment and any trailing slash are dropped, the last
///    path segment is removed and `openapi.json` is appended to its parent.
///
/// Never fails: input that is not an absolute hierarchical URL is returned
/// unchanged.
///
/// # Examples
///
/// ```
/// use spec_fetch_core::resolver::resolve_spec_url;
///
/// assert_eq!(
///     resolve_spec_url("https://petstore3.swagger.io/api/v3/docs"),
///     "https://petstore3.swagger.io/api/v3/openapi.json"
/// );
/// assert_eq!(
///     resolve_spec_url("https://example.com/api/v1/index.html#/pets"),
///     "https://example.com/api/v1/openapi.json"
/// );
/// assert_eq!(resolve_spec_url("not a url"), "not a url");
/// ```
#[must_use]
#[instrument]
pub fn resolve_spec_url(input: &str) -> String {
    let mut url = match Url::parse(input) {
        Ok(url) if !url.cannot_be_a_base() => url,
        Ok(_) => {
            debug!("URL has no hierarchical path, leaving unchanged");
            return input.to_string();
        }
        Err(error) => {
            debug!(%error, "URL did not parse, leaving unchanged");
            return input.to_string();
        }
    };

    let path = url.path().to_string();

    if SPEC_SUFFIX_PATTERN.is_match(&path) {
        return input.to_string();
    }

    if let Some(docs_segment) = DOCS_SUFFIX_PATTERN.find(&path) {
        let prefix = &path[..docs_segment.start()];
        url.set_path(&format!("{prefix}/{SPEC_FILE_NAME}"));
    } else {
        url.set_fragment(None);
        let trimmed = path.strip_suffix('/').unwrap_or(&path);
        let parent = trimmed.rsplit_once('/').map_or("", |(parent, _)| parent);
        url.set_path(&format!("{parent}/{SPEC_FILE_NAME}"));
    }

    let resolved = url.to_string();
    debug!(resolved = %resolved, "rewrote docs URL");
    resolved
}

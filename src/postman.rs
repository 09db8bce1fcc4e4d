//! Rewriting a validated spec document for Postman import.
//!
//! Postman reads the first server entry as the collection base URL. Specs
//! often declare a relative server (`/api/v3`), which Postman cannot resolve,
//! so the server is rebuilt from the origin the document was fetched from.
//! Optionally a bearer scheme is declared and required globally so that the
//! imported collection carries an `Authorization` header.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::spec::SpecDocument;

/// Security scheme name injected when an authorization token is supplied.
pub const BEARER_SCHEME_NAME: &str = "BearerAuth";

/// Variable holding the supplied authorization token.
pub const AUTHORIZATION_VARIABLE: &str = "AUTHORIZATION";

#[allow(clippy::expect_used)]
static ORIGIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://[^/]+)").expect("origin regex is valid") // Static pattern, safe to panic
});

/// Returns `scheme://host[:port]` of `source_url`, or `source_url` itself when
/// it does not start with an HTTP(S) origin.
///
/// # Examples
///
/// ```
/// use spec_fetch_core::postman::source_origin;
///
/// assert_eq!(source_origin("https://api.example.com/v1/docs"), "https://api.example.com");
/// assert_eq!(source_origin("http://h:8080"), "http://h:8080");
/// assert_eq!(source_origin("relative/path"), "relative/path");
/// ```
#[must_use]
pub fn source_origin(source_url: &str) -> &str {
    ORIGIN_PATTERN
        .captures(source_url)
        .and_then(|captures| captures.get(1))
        .map_or(source_url, |origin| origin.as_str())
}

/// Rewrites `doc` for Postman import and returns it.
///
/// - `servers` becomes a single entry whose URL is the origin of `source_url`
///   followed by the first declared server URL (empty when none). Additional
///   servers are discarded.
/// - With a non-empty `authorization`, `components.securitySchemes.BearerAuth`
///   is declared (creating parents as needed), `security` is set to require it,
///   and `variables.AUTHORIZATION` holds the token.
///
/// Documents that are not mappings are returned unchanged.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use spec_fetch_core::postman::to_postman_collection;
///
/// let doc = json!({"openapi": "3.0.0", "servers": [{"url": "/v1"}]});
/// let out = to_postman_collection(doc, "https://api.example.com/v1/docs", None);
/// assert_eq!(out["servers"], json!([{"url": "https://api.example.com/v1"}]));
/// ```
#[must_use]
#[instrument(skip(doc, authorization), fields(with_auth = authorization.is_some()))]
pub fn to_postman_collection(
    mut doc: SpecDocument,
    source_url: &str,
    authorization: Option<&str>,
) -> SpecDocument {
    let Some(root) = doc.as_object_mut() else {
        debug!("document is not a mapping; leaving unchanged");
        return doc;
    };

    let declared_server = root
        .get("servers")
        .and_then(|servers| servers.get(0))
        .and_then(|server| server.get("url"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let base_url = format!("{}{declared_server}", source_origin(source_url));
    debug!(base_url = %base_url, "rewriting servers");
    root.insert("servers".to_string(), json!([{ "url": base_url }]));

    if let Some(token) = authorization.filter(|token| !token.is_empty()) {
        update_object(root, "components", |components| {
            update_object(components, "securitySchemes", |schemes| {
                schemes.insert(
                    BEARER_SCHEME_NAME.to_string(),
                    json!({
                        "type": "http",
                        "scheme": "bearer",
                        "bearerFormat": "JWT",
                    }),
                );
            });
        });

        root.insert(
            "security".to_string(),
            json!([{ BEARER_SCHEME_NAME: [] }]),
        );

        update_object(root, "variables", |variables| {
            variables.insert(
                AUTHORIZATION_VARIABLE.to_string(),
                json!({
                    "default": token,
                    "description": "Authorization token for API requests",
                }),
            );
        });
    }

    doc
}

/// Applies `update` to the mapping stored under `key`, replacing any
/// non-mapping value. The key keeps its position in `parent`.
fn update_object(
    parent: &mut Map<String, Value>,
    key: &str,
    update: impl FnOnce(&mut Map<String, Value>),
) {
    let slot = parent.entry(key.to_string()).or_insert(Value::Null);
    let mut map = match slot.take() {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    update(&mut map);
    *slot = Value::Object(map);
}

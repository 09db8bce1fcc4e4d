//! Orchestration of the resolve, fetch, parse, validate and rewrite stages.
//!
//! # Overview
//!
//! [`Pipeline`] is the single entry point used by the HTTP server and the CLI.
//! Every operation first takes a permit from the shared [`RateLimiter`] for the
//! caller's identifier, then runs its stages in order. The first failing stage
//! ends the run; its error is mapped to a [`PipelineError`] with a stable code.
//!
//! - [`Pipeline::fetch_by_url`] - resolve, fetch, parse, validate, rewrite
//! - [`Pipeline::fetch_by_text`] - parse, validate
//! - [`Pipeline::generate_postman`] - the URL path with optional bearer auth,
//!   packaged as a named collection file
//!
//! # Example
//!
//! ```no_run
//! use spec_fetch_core::pipeline::{Pipeline, PipelineSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::from_settings(&PipelineSettings::default())?;
//! let fetched = pipeline
//!     .fetch_by_url("cli", "https://petstore3.swagger.io/api/v3/docs")
//!     .await?;
//! println!("{}", fetched.document["servers"][0]["url"]);
//! # Ok(())
//! # }
//! ```

mod error;
mod response;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use error::{ErrorCode, PipelineError};
pub use response::{Envelope, ErrorBody, FailureEnvelope};

use crate::fetch::{FetchError, FetchPolicy, SecureFetcher, SpecSource};
use crate::postman::to_postman_collection;
use crate::rate_limiter::{
    DEFAULT_CAPACITY, DEFAULT_MAX_BUCKETS, DEFAULT_REFILL_INTERVAL, RateLimiter,
    UNKNOWN_IDENTIFIER,
};
use crate::resolver::resolve_spec_url;
use crate::spec::{MAX_DOCUMENT_BYTES, SpecDocument, SpecParser, SpecValidator, serialized_len};

/// Collection file stem used when the caller gives none.
pub const DEFAULT_COLLECTION_NAME: &str = "postman_collection";

/// Content type reported for generated collections.
pub const COLLECTION_CONTENT_TYPE: &str = "application/json";

/// Permits taken per pipeline invocation.
const REQUEST_COST: u32 = 1;

/// Tunables for building a [`Pipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Permits per caller bucket.
    pub rate_limit_capacity: u32,
    /// Time to regain one permit.
    pub rate_limit_refill: Duration,
    /// Upper bound on tracked callers.
    pub rate_limit_max_buckets: usize,
    /// Turn rate limiting off entirely.
    pub rate_limit_disabled: bool,
    /// Fetch limits; `max_bytes` also bounds text submitted directly.
    pub fetch: FetchPolicy,
    /// Largest accepted compact JSON size after parsing.
    pub max_document_bytes: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            rate_limit_capacity: DEFAULT_CAPACITY,
            rate_limit_refill: DEFAULT_REFILL_INTERVAL,
            rate_limit_max_buckets: DEFAULT_MAX_BUCKETS,
            rate_limit_disabled: false,
            fetch: FetchPolicy::default(),
            max_document_bytes: MAX_DOCUMENT_BYTES,
        }
    }
}

/// Metadata of a spec fetched by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchMeta {
    /// `Content-Type` of the upstream response, empty when absent.
    pub source_content_type: String,
    /// Raw body size in bytes.
    pub bytes: u64,
    /// URL actually fetched, after resolution and redirects.
    pub resolved_url: String,
    /// Declared `openapi`/`swagger` version.
    pub spec_version: String,
}

/// A spec fetched by URL and rewritten for Postman.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedSpec {
    /// The rewritten document.
    pub document: SpecDocument,
    /// Fetch metadata.
    pub meta: FetchMeta,
}

/// Metadata of a spec submitted as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseMeta {
    /// Submitted text size in bytes.
    pub bytes: u64,
    /// Declared `openapi`/`swagger` version.
    pub spec_version: String,
}

/// A spec submitted as text, decoded and validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSpec {
    /// The decoded document, unmodified.
    pub document: SpecDocument,
    /// Parse metadata.
    pub meta: ParseMeta,
}

/// Input of [`Pipeline::generate_postman`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Docs or spec URL.
    pub url: String,
    /// Collection file stem; sanitized, defaults to [`DEFAULT_COLLECTION_NAME`].
    pub filename: Option<String>,
    /// Bearer token to embed.
    pub authorization: Option<String>,
}

/// Metadata of a generated collection file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMeta {
    /// File name including the `.json` extension.
    pub filename: String,
    /// Always [`COLLECTION_CONTENT_TYPE`].
    pub content_type: String,
    /// Compact JSON size of the document in bytes.
    pub size: u64,
}

/// A collection document ready to be saved or downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedCollection {
    /// The rewritten document.
    pub document: SpecDocument,
    /// File metadata.
    pub meta: CollectionMeta,
}

/// Runs spec retrieval requests under a shared rate limit.
///
/// Cheap to clone; clones share the limiter and the source.
#[derive(Clone)]
pub struct Pipeline {
    limiter: Arc<RateLimiter>,
    source: Arc<dyn SpecSource>,
    parser: SpecParser,
    validator: SpecValidator,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("limiter", &self.limiter)
            .field("parser", &self.parser)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Assembles a pipeline from its parts.
    #[must_use]
    pub fn new(
        limiter: Arc<RateLimiter>,
        source: Arc<dyn SpecSource>,
        parser: SpecParser,
        validator: SpecValidator,
    ) -> Self {
        Self {
            limiter,
            source,
            parser,
            validator,
        }
    }

    /// Builds a pipeline backed by a [`SecureFetcher`].
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn from_settings(settings: &PipelineSettings) -> Result<Self, FetchError> {
        let limiter = if settings.rate_limit_disabled {
            RateLimiter::disabled()
        } else {
            RateLimiter::new(settings.rate_limit_capacity, settings.rate_limit_refill)
                .with_max_buckets(settings.rate_limit_max_buckets)
        };
        let fetcher = SecureFetcher::new(settings.fetch.clone())?;
        Ok(Self::new(
            Arc::new(limiter),
            Arc::new(fetcher),
            SpecParser::new(settings.fetch.max_bytes),
            SpecValidator::new(settings.max_document_bytes),
        ))
    }

    /// Returns the shared rate limiter.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Takes one permit for `identifier`.
    ///
    /// An empty identifier shares the [`UNKNOWN_IDENTIFIER`] bucket.
    ///
    /// # Errors
    ///
    /// Returns `RATE_LIMITED` when the bucket is empty.
    pub fn admit(&self, identifier: &str) -> Result<(), PipelineError> {
        let identifier = if identifier.is_empty() {
            UNKNOWN_IDENTIFIER
        } else {
            identifier
        };
        if self.limiter.allow(identifier, REQUEST_COST) {
            Ok(())
        } else {
            warn!(identifier, "rate limit exceeded");
            Err(PipelineError::rate_limited())
        }
    }

    /// Fetches the spec behind a docs or spec URL and rewrites it for Postman.
    ///
    /// # Errors
    ///
    /// `RATE_LIMITED`, `INVALID_URL`, any fetch error (`INVALID_PROTOCOL`,
    /// `PRIVATE_IP`, `FETCH_ERROR`, `TOO_LARGE`, `TIMEOUT`, `NETWORK_ERROR`),
    /// `PARSE_ERROR` or `INVALID_OPENAPI`.
    pub async fn fetch_by_url(
        &self,
        identifier: &str,
        url: &str,
    ) -> Result<FetchedSpec, PipelineError> {
        self.admit(identifier)?;
        self.run_url(url, None).await
    }

    /// Like [`Pipeline::fetch_by_url`], also embedding a bearer token.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::fetch_by_url`].
    pub async fn fetch_by_url_with_authorization(
        &self,
        identifier: &str,
        url: &str,
        authorization: Option<&str>,
    ) -> Result<FetchedSpec, PipelineError> {
        self.admit(identifier)?;
        self.run_url(url, authorization).await
    }

    /// Decodes and validates spec text submitted directly.
    ///
    /// The document is returned as decoded; no server rewrite happens because
    /// there is no source origin.
    ///
    /// # Errors
    ///
    /// `RATE_LIMITED`, `TOO_LARGE`, `PARSE_ERROR` or `INVALID_OPENAPI`.
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub fn fetch_by_text(
        &self,
        identifier: &str,
        content: &str,
    ) -> Result<ParsedSpec, PipelineError> {
        self.admit(identifier)?;

        let document = self.parser.parse(content, "")?;
        let validated = self.validator.validate(&document)?;
        info!(kind = %validated.kind, "text spec accepted");

        Ok(ParsedSpec {
            document,
            meta: ParseMeta {
                bytes: content.len() as u64,
                spec_version: validated.kind.version().to_string(),
            },
        })
    }

    /// Produces a named Postman collection from a docs or spec URL.
    ///
    /// # Errors
    ///
    /// `RATE_LIMITED`, `INVALID_REQUEST` for an unusable URL, `INTERNAL_ERROR`,
    /// and `GENERATION_ERROR` (carrying the stage message) for every other
    /// stage failure.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn generate_postman(
        &self,
        identifier: &str,
        request: &GenerateRequest,
    ) -> Result<GeneratedCollection, PipelineError> {
        self.admit(identifier)?;

        let filename = format!(
            "{}.json",
            sanitize_collection_name(request.filename.as_deref())
        );

        let fetched = self
            .run_url(&request.url, request.authorization.as_deref())
            .await
            .map_err(|error| match error.code {
                ErrorCode::InvalidUrl => PipelineError::invalid_request(),
                ErrorCode::InternalError => error,
                _ => PipelineError::new(ErrorCode::GenerationError, error.message),
            })?;

        let size = serialized_len(&fetched.document)?;
        info!(filename = %filename, size, "collection generated");

        Ok(GeneratedCollection {
            document: fetched.document,
            meta: CollectionMeta {
                filename,
                content_type: COLLECTION_CONTENT_TYPE.to_string(),
                size,
            },
        })
    }

    #[instrument(skip(self, authorization), fields(with_auth = authorization.is_some()))]
    async fn run_url(
        &self,
        url: &str,
        authorization: Option<&str>,
    ) -> Result<FetchedSpec, PipelineError> {
        if Url::parse(url).is_err() {
            debug!("input is not an absolute URL");
            return Err(PipelineError::invalid_url());
        }

        let spec_url = resolve_spec_url(url);
        debug!(spec_url = %spec_url, "resolved spec URL");

        let fetched = self.source.fetch(&spec_url).await?;
        let document = self.parser.parse(&fetched.text, &fetched.content_type)?;
        let validated = self.validator.validate(&document)?;

        let document = to_postman_collection(document, url, authorization);
        info!(kind = %validated.kind, bytes = fetched.byte_length, "spec fetched");

        Ok(FetchedSpec {
            document,
            meta: FetchMeta {
                source_content_type: fetched.content_type,
                bytes: fetched.byte_length,
                resolved_url: fetched.url,
                spec_version: validated.kind.version().to_string(),
            },
        })
    }
}

/// Reduces a caller-supplied collection name to `[A-Za-z0-9._-]`.
///
/// Runs of other characters collapse to one `_`, a trailing `.json` is
/// dropped, and leading/trailing `_`/`.` are trimmed. Empty results fall back
/// to [`DEFAULT_COLLECTION_NAME`].
#[must_use]
pub fn sanitize_collection_name(raw: Option<&str>) -> String {
    let raw = raw.unwrap_or_default().trim();
    let stem = raw
        .strip_suffix(".json")
        .or_else(|| raw.strip_suffix(".JSON"))
        .unwrap_or(raw);

    let mut out = String::with_capacity(stem.len());
    let mut prev_sep = false;
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.') {
            out.push(ch);
            prev_sep = false;
        } else if !prev_sep {
            out.push('_');
            prev_sep = true;
        }
    }

    let trimmed = out.trim_matches(['_', '.']);
    if trimmed.is_empty() {
        DEFAULT_COLLECTION_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

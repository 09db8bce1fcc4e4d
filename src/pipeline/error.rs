//! Caller-facing error taxonomy.
//!
//! Stage errors ([`FetchError`], [`SpecError`]) are mapped here to a stable
//! `{code, message}` pair. Messages never carry internal detail; that detail
//! is logged instead.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::fetch::FetchError;
use crate::spec::SpecError;

/// Stable error codes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The caller's token bucket is empty.
    RateLimited,
    /// The supplied URL is not an absolute URL.
    InvalidUrl,
    /// The request body is malformed.
    InvalidRequest,
    /// The URL scheme is not HTTP(S).
    InvalidProtocol,
    /// The URL host is loopback/private/link-local.
    PrivateIp,
    /// The upstream answered with a non-2xx status.
    FetchError,
    /// A size limit was exceeded.
    TooLarge,
    /// The fetch did not finish in time.
    Timeout,
    /// Any other transport failure.
    NetworkError,
    /// The content is neither JSON nor YAML.
    ParseError,
    /// The document lacks an `openapi`/`swagger` discriminator.
    InvalidOpenapi,
    /// Collection generation failed.
    GenerationError,
    /// Unexpected failure; details are logged only.
    InternalError,
}

impl ErrorCode {
    /// Returns the wire name, e.g. `"RATE_LIMITED"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "RATE_LIMITED",
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidProtocol => "INVALID_PROTOCOL",
            Self::PrivateIp => "PRIVATE_IP",
            Self::FetchError => "FETCH_ERROR",
            Self::TooLarge => "TOO_LARGE",
            Self::Timeout => "TIMEOUT",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::InvalidOpenapi => "INVALID_OPENAPI",
            Self::GenerationError => "GENERATION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status used when reporting this code.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::RateLimited => 429,
            Self::InvalidUrl
            | Self::InvalidRequest
            | Self::InvalidProtocol
            | Self::PrivateIp
            | Self::ParseError
            | Self::InvalidOpenapi => 400,
            Self::TooLarge => 413,
            Self::Timeout => 408,
            Self::FetchError | Self::NetworkError => 502,
            Self::GenerationError | Self::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal error of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct PipelineError {
    /// Stable code.
    pub code: ErrorCode,
    /// Caller-facing message.
    pub message: String,
}

impl PipelineError {
    /// Creates an error with an explicit message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The caller exhausted their rate limit.
    #[must_use]
    pub fn rate_limited() -> Self {
        Self::new(ErrorCode::RateLimited, "Too many requests")
    }

    /// The supplied URL is not usable.
    #[must_use]
    pub fn invalid_url() -> Self {
        Self::new(ErrorCode::InvalidUrl, "Invalid URL provided")
    }

    /// The request body is malformed.
    #[must_use]
    pub fn invalid_request() -> Self {
        Self::new(ErrorCode::InvalidRequest, "Invalid request data")
    }

    /// Unexpected failure; `detail` is logged and not returned.
    pub fn internal(detail: impl fmt::Display) -> Self {
        error!(detail = %detail, "internal pipeline failure");
        Self::new(ErrorCode::InternalError, "Internal server error")
    }

    /// Returns the HTTP status for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl From<FetchError> for PipelineError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::InvalidUrl { .. } => Self::invalid_url(),
            FetchError::InvalidProtocol { .. } => Self::new(
                ErrorCode::InvalidProtocol,
                "Only HTTP and HTTPS URLs are allowed",
            ),
            FetchError::PrivateHost { .. } => Self::new(
                ErrorCode::PrivateIp,
                "Private IP addresses are not allowed",
            ),
            FetchError::HttpStatus { status, reason, .. } => {
                Self::new(ErrorCode::FetchError, format!("HTTP {status}: {reason}"))
            }
            FetchError::TooLarge { limit, .. } => Self::new(
                ErrorCode::TooLarge,
                format!("Content exceeds {}MB limit", megabytes(limit)),
            ),
            FetchError::Timeout { after, .. } => Self::new(
                ErrorCode::Timeout,
                format!("Request timed out after {} seconds", after.as_secs()),
            ),
            FetchError::Network { .. } => {
                Self::new(ErrorCode::NetworkError, "Failed to fetch the URL")
            }
            error @ FetchError::Client { .. } => Self::internal(error),
        }
    }
}

impl From<SpecError> for PipelineError {
    fn from(error: SpecError) -> Self {
        match error {
            SpecError::Unparseable { .. } => Self::new(
                ErrorCode::ParseError,
                "Content is neither valid JSON nor YAML",
            ),
            SpecError::SourceTooLarge { limit, .. } => Self::new(
                ErrorCode::TooLarge,
                format!("Content exceeds {}MB limit", megabytes(limit)),
            ),
            SpecError::InvalidOpenApi { .. } => Self::new(
                ErrorCode::InvalidOpenapi,
                "Invalid OpenAPI specification",
            ),
            SpecError::DocumentTooLarge { limit, .. } => Self::new(
                ErrorCode::TooLarge,
                format!("Processed content exceeds {}MB limit", megabytes(limit)),
            ),
            error @ SpecError::Serialize { .. } => Self::internal(error),
        }
    }
}

/// Formats a byte count as MiB with at most two decimals (`3`, `2.5`).
fn megabytes(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let mib = bytes as f64 / (1024.0 * 1024.0);
    let rounded = (mib * 100.0).round() / 100.0;
    format!("{rounded}")
}

//! Minimal structural validation of decoded spec documents.
//!
//! Only the version discriminator is checked: a top-level `openapi` or
//! `swagger` string. Paths, schemas and components are not inspected.

use std::fmt;
use std::io;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::error::SpecError;

/// Largest accepted compact JSON size of a validated document (2.5 MiB).
pub const MAX_DOCUMENT_BYTES: u64 = 5 * 1024 * 1024 / 2;

/// Which discriminator a document carries, with its version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecKind {
    /// OpenAPI 3.x (`openapi` field).
    OpenApi(String),
    /// Swagger 2.0 (`swagger` field).
    Swagger(String),
}

impl SpecKind {
    /// Returns the declared version string.
    #[must_use]
    pub fn version(&self) -> &str {
        match self {
            Self::OpenApi(version) | Self::Swagger(version) => version,
        }
    }
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenApi(version) => write!(f, "OpenAPI {version}"),
            Self::Swagger(version) => write!(f, "Swagger {version}"),
        }
    }
}

/// Checks that `doc` is a mapping with a non-empty string `openapi` or
/// `swagger` field.
///
/// `openapi` is preferred when both are present.
///
/// # Errors
///
/// Returns [`SpecError::InvalidOpenApi`] when `doc` is not a mapping or has
/// neither field.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use spec_fetch_core::spec::{validate_structure, SpecKind};
///
/// assert_eq!(
///     validate_structure(&json!({"swagger": "2.0"})).unwrap(),
///     SpecKind::Swagger("2.0".to_string())
/// );
/// assert!(validate_structure(&json!({"title": "x"})).is_err());
/// ```
pub fn validate_structure(doc: &Value) -> Result<SpecKind, SpecError> {
    let Some(object) = doc.as_object() else {
        return Err(SpecError::invalid("document is not a mapping"));
    };

    let discriminator = |field: &str| {
        object
            .get(field)
            .and_then(Value::as_str)
            .filter(|version| !version.is_empty())
            .map(str::to_string)
    };

    if let Some(version) = discriminator("openapi") {
        Ok(SpecKind::OpenApi(version))
    } else if let Some(version) = discriminator("swagger") {
        Ok(SpecKind::Swagger(version))
    } else {
        Err(SpecError::invalid(
            "must contain either an 'openapi' or a 'swagger' string field",
        ))
    }
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSpec {
    /// Discriminator found in the document.
    pub kind: SpecKind,
    /// Compact JSON size of the document in bytes.
    pub serialized_bytes: u64,
}

/// Structural check plus a post-parse size gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecValidator {
    max_document_bytes: u64,
}

impl Default for SpecValidator {
    fn default() -> Self {
        Self::new(MAX_DOCUMENT_BYTES)
    }
}

impl SpecValidator {
    /// Creates a validator rejecting documents whose compact JSON form is
    /// longer than `max_document_bytes`.
    #[must_use]
    pub fn new(max_document_bytes: u64) -> Self {
        Self { max_document_bytes }
    }

    /// Returns the document size limit.
    #[must_use]
    pub fn max_document_bytes(&self) -> u64 {
        self.max_document_bytes
    }

    /// Validates structure first, then size.
    ///
    /// # Errors
    ///
    /// - [`SpecError::InvalidOpenApi`] from [`validate_structure`]
    /// - [`SpecError::DocumentTooLarge`] when the compact JSON exceeds the limit
    #[instrument(skip_all)]
    pub fn validate(&self, doc: &Value) -> Result<ValidatedSpec, SpecError> {
        let kind = validate_structure(doc).inspect_err(|error| {
            warn!(%error, "document failed structural validation");
        })?;

        let serialized_bytes = serialized_len(doc)?;
        if serialized_bytes > self.max_document_bytes {
            warn!(
                serialized_bytes,
                limit = self.max_document_bytes,
                "processed document over limit"
            );
            return Err(SpecError::DocumentTooLarge {
                actual: serialized_bytes,
                limit: self.max_document_bytes,
            });
        }

        debug!(kind = %kind, serialized_bytes, "document validated");
        Ok(ValidatedSpec {
            kind,
            serialized_bytes,
        })
    }
}

/// Returns the length of `doc` serialized as compact JSON, without buffering it.
///
/// # Errors
///
/// Returns [`SpecError::Serialize`] if serialization fails.
pub fn serialized_len(doc: &Value) -> Result<u64, SpecError> {
    let mut counter = ByteCounter::default();
    serde_json::to_writer(&mut counter, doc).map_err(|source| SpecError::Serialize { source })?;
    Ok(counter.0)
}

#[derive(Debug, Default)]
struct ByteCounter(u64);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

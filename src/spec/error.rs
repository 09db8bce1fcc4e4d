//! Error types for spec decoding and validation.

use thiserror::Error;

/// Errors that can occur while decoding or validating a spec document.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Neither decoder accepted the text.
    #[error("Content is neither valid JSON nor YAML")]
    Unparseable {
        /// Error reported by the JSON decoder.
        json: String,
        /// Error reported by the YAML decoder.
        yaml: String,
    },

    /// The raw text is larger than the source limit.
    #[error("source text is {actual} bytes, limit is {limit}")]
    SourceTooLarge {
        /// Size of the text in bytes.
        actual: u64,
        /// The configured limit.
        limit: u64,
    },

    /// The decoded document is not an OpenAPI/Swagger document.
    #[error("invalid OpenAPI document: {reason}")]
    InvalidOpenApi {
        /// What is missing or malformed.
        reason: String,
    },

    /// The re-serialized document is larger than the document limit.
    #[error("processed document is {actual} bytes, limit is {limit}")]
    DocumentTooLarge {
        /// Compact JSON size in bytes.
        actual: u64,
        /// The configured limit.
        limit: u64,
    },

    /// The document could not be re-serialized for measuring.
    #[error("failed to serialize document: {source}")]
    Serialize {
        /// The serializer error.
        #[source]
        source: serde_json::Error,
    },
}

impl SpecError {
    /// Creates an invalid document error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOpenApi {
            reason: reason.into(),
        }
    }
}

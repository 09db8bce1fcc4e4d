//! Decoding and validation of OpenAPI/Swagger documents.
//!
//! - [`SpecParser`] - JSON/YAML decoding with ordered fallback
//! - [`SpecValidator`] - discriminator check and post-parse size gate
//!
//! Decoded documents use the JSON value model ([`SpecDocument`]) regardless of
//! the source format.

mod error;
mod parser;
mod validator;

pub use error::SpecError;
pub use parser::{SpecFormat, SpecParser, decoder_order};
pub use validator::{
    MAX_DOCUMENT_BYTES, SpecKind, SpecValidator, ValidatedSpec, serialized_len, validate_structure,
};

/// A decoded spec document: a mapping/sequence/scalar tree.
pub type SpecDocument = serde_json::Value;

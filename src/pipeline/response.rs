//! Result envelope shared by every pipeline entry point.
//!
//! Successes serialize as `{"ok": true, "data": ..., "meta": ...}` and failures
//! as `{"ok": false, "error": {"code": ..., "message": ...}}`.

use serde::Serialize;

use super::error::{ErrorCode, PipelineError};
use super::{FetchedSpec, GeneratedCollection, ParsedSpec};
use crate::spec::SpecDocument;

/// `{code, message}` body of a failed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable error code.
    pub code: ErrorCode,
    /// Caller-facing message.
    pub message: String,
}

/// Tagged success/failure result.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<D, M = ()> {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<D>,
    /// Payload metadata on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<M>,
    /// Error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Envelope used for failures, which carry neither data nor meta.
pub type FailureEnvelope = Envelope<(), ()>;

impl<D, M> Envelope<D, M> {
    /// Builds a success envelope.
    pub fn success(data: D, meta: Option<M>) -> Self {
        Self {
            ok: true,
            data: Some(data),
            meta,
            error: None,
        }
    }

    /// Builds a failure envelope from `error`.
    #[must_use]
    pub fn failure(error: &PipelineError) -> Self {
        Self {
            ok: false,
            data: None,
            meta: None,
            error: Some(ErrorBody {
                code: error.code,
                message: error.message.clone(),
            }),
        }
    }
}

impl From<FetchedSpec> for Envelope<SpecDocument, super::FetchMeta> {
    fn from(fetched: FetchedSpec) -> Self {
        Self::success(fetched.document, Some(fetched.meta))
    }
}

impl From<ParsedSpec> for Envelope<SpecDocument, super::ParseMeta> {
    fn from(parsed: ParsedSpec) -> Self {
        Self::success(parsed.document, Some(parsed.meta))
    }
}

impl From<GeneratedCollection> for Envelope<SpecDocument, super::CollectionMeta> {
    fn from(generated: GeneratedCollection) -> Self {
        Self::success(generated.document, Some(generated.meta))
    }
}

//! Spec Fetch Core Library
//!
//! This library turns an API documentation URL (or raw spec text) into an
//! OpenAPI/Swagger document ready for import into Postman.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`resolver`] - Docs page URL to spec URL resolution
//! - [`fetch`] - Guarded, bounded HTTP retrieval
//! - [`spec`] - JSON/YAML decoding and structural validation
//! - [`postman`] - Server and bearer auth rewriting for Postman
//! - [`rate_limiter`] - Per-caller token buckets
//! - [`pipeline`] - Stage orchestration and the caller-facing error taxonomy
//! - [`server`] - HTTP endpoints over the pipeline

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod fetch;
pub mod pipeline;
pub mod postman;
pub mod rate_limiter;
pub mod resolver;
pub mod server;
pub mod spec;
mod user_agent;

// Re-export commonly used types
pub use fetch::{FetchError, FetchPolicy, FetchResult, SecureFetcher, SpecSource};
pub use pipeline::{
    Envelope, ErrorCode, FetchedSpec, GenerateRequest, GeneratedCollection, ParsedSpec, Pipeline,
    PipelineError, PipelineSettings,
};
pub use postman::to_postman_collection;
pub use rate_limiter::RateLimiter;
pub use resolver::resolve_spec_url;
pub use spec::{SpecDocument, SpecError, SpecKind, SpecParser, SpecValidator};

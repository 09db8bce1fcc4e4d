//! HTTP surface over [`Pipeline`].
//!
//! # Routes
//!
//! | Method | Path                    | Body                                  |
//! |--------|-------------------------|---------------------------------------|
//! | POST   | `/api/fetch-openapi`    | `{"url": ...}`                        |
//! | POST   | `/api/parse-openapi`    | `{"content": ...}`                    |
//! | POST   | `/api/generate-postman` | `{"url", "filename"?, "authorization"?}` |
//!
//! Every response body is an [`Envelope`]. Failures use the HTTP status of
//! their [`ErrorCode`]. Each request takes exactly one rate limit permit
//! before its body is validated.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::header::{CONTENT_DISPOSITION, HeaderValue};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::fetch::constants::MAX_SOURCE_BYTES;
use crate::pipeline::{
    Envelope, ErrorCode, FailureEnvelope, GenerateRequest, Pipeline, PipelineError,
};
use crate::rate_limiter::UNKNOWN_IDENTIFIER;
use crate::spec::SpecError;

/// Header carrying the original client address behind a proxy.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Extra request body allowance on top of the spec size limit, for JSON
/// escaping and the surrounding object.
pub const BODY_LIMIT_OVERHEAD: usize = 1024 * 1024;

/// Server options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Identify callers by the first `X-Forwarded-For` entry when present.
    pub trust_forwarded_header: bool,
    /// Largest accepted request body in bytes.
    pub body_limit: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            trust_forwarded_header: true,
            body_limit: body_limit_for(MAX_SOURCE_BYTES),
        }
    }
}

/// Returns the request body limit for a given spec size limit.
#[must_use]
pub fn body_limit_for(max_source_bytes: u64) -> usize {
    usize::try_from(max_source_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_OVERHEAD)
}

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pipeline: Pipeline,
    trust_forwarded_header: bool,
    body_limit: usize,
}

impl AppState {
    /// Creates handler state around `pipeline`.
    #[must_use]
    pub fn new(pipeline: Pipeline, settings: &ServerSettings) -> Self {
        Self {
            pipeline,
            trust_forwarded_header: settings.trust_forwarded_header,
            body_limit: settings.body_limit,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FetchBody {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ParseBody {
    content: String,
}

#[derive(Debug, Deserialize)]
struct GenerateBody {
    url: String,
    filename: Option<String>,
    authorization: Option<String>,
}

/// Builds the router with tracing, panic recovery and the body limit applied.
pub fn router(pipeline: Pipeline, settings: &ServerSettings) -> Router {
    let state = Arc::new(AppState::new(pipeline, settings));
    Router::new()
        .route("/api/fetch-openapi", post(fetch_openapi))
        .route("/api/parse-openapi", post(parse_openapi))
        .route("/api/generate-postman", post(generate_postman))
        .layer(DefaultBodyLimit::max(settings.body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `router` on `listener` until Ctrl-C.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

/// Picks the rate limit identifier for a request.
///
/// The first non-empty `X-Forwarded-For` entry wins when trusted, then the
/// peer address, then [`UNKNOWN_IDENTIFIER`].
#[must_use]
pub fn client_identifier(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_header: bool,
) -> String {
    if trust_forwarded_header
        && let Some(first) = headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|first| !first.is_empty())
    {
        return first.to_string();
    }
    peer.map_or_else(|| UNKNOWN_IDENTIFIER.to_string(), |addr| addr.ip().to_string())
}

fn identify(state: &AppState, headers: &HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> String {
    client_identifier(
        headers,
        peer.map(|ConnectInfo(addr)| addr),
        state.trust_forwarded_header,
    )
}

/// Takes the permit for a request whose body was rejected, then reports
/// `fallback` unless the caller is already rate limited.
fn reject_body(state: &AppState, identifier: &str, rejection: &JsonRejection, fallback: PipelineError) -> Response {
    debug!(%rejection, "request body rejected");
    if let Err(limited) = state.pipeline.admit(identifier) {
        return limited.into_response();
    }
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let limit = state.body_limit.saturating_sub(BODY_LIMIT_OVERHEAD) as u64;
        return PipelineError::from(SpecError::SourceTooLarge { actual: 0, limit }).into_response();
    }
    fallback.into_response()
}

async fn fetch_openapi(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<FetchBody>, JsonRejection>,
) -> Response {
    let identifier = identify(&state, &headers, peer);
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return reject_body(&state, &identifier, &rejection, PipelineError::invalid_url());
        }
    };

    match state.pipeline.fetch_by_url(&identifier, &body.url).await {
        Ok(fetched) => Json(Envelope::from(fetched)).into_response(),
        Err(error) => error.into_response(),
    }
}

async fn parse_openapi(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<ParseBody>, JsonRejection>,
) -> Response {
    let identifier = identify(&state, &headers, peer);
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return reject_body(&state, &identifier, &rejection, PipelineError::invalid_request());
        }
    };

    match state.pipeline.fetch_by_text(&identifier, &body.content) {
        Ok(parsed) => Json(Envelope::from(parsed)).into_response(),
        Err(error) => error.into_response(),
    }
}

async fn generate_postman(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Response {
    let identifier = identify(&state, &headers, peer);
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return reject_body(&state, &identifier, &rejection, PipelineError::invalid_request());
        }
    };

    let request = GenerateRequest {
        url: body.url,
        filename: body.filename,
        authorization: body.authorization,
    };
    match state.pipeline.generate_postman(&identifier, &request).await {
        Ok(generated) => {
            let disposition = format!("attachment; filename=\"{}\"", generated.meta.filename);
            let mut response = Json(Envelope::from(generated)).into_response();
            if let Ok(value) = HeaderValue::from_str(&disposition) {
                response.headers_mut().insert(CONTENT_DISPOSITION, value);
            }
            response
        }
        Err(error) => error.into_response(),
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(FailureEnvelope::failure(&self))).into_response()
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "handler panicked");
    PipelineError::new(ErrorCode::InternalError, "Internal server error").into_response()
}

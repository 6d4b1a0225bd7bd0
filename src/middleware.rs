//! HTTP middleware stack
//!
//! The order is fixed here and nowhere else. From the outside in:
//!
//! 1. CORS: stamps the four cross-origin headers on every response and
//!    answers every `OPTIONS` preflight with `204 No Content` before anything
//!    below runs.
//! 2. Timeout: attaches a [`RequestContext`] carrying the request deadline.
//! 3. Access log: one event per request with the final status and size.

use std::time::Duration;

use axum::{
    body::HttpBody,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::{MakeSpan, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::{lifecycle::RequestContext, AppState};

/// Wrap the router in the CORS, timeout and logging layers
pub fn apply(router: Router, state: AppState) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(preflight_no_content))
            // CorsLayer only emits these two on preflights
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            ))
            .layer(cors_layer())
            .layer(middleware::from_fn_with_state(state, attach_request_context))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(RequestSpan)
                    .on_request(())
                    .on_response(AccessLog),
            ),
    )
}

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";

/// Permissive cross-origin policy
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([header::LOCATION])
}

/// `CorsLayer` answers preflights itself; report them as 204 with no body.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    }
    response
}

/// Derive the per-request deadline and cancellation token
async fn attach_request_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = RequestContext::new(state.config.server.request_timeout(), &state.shutdown);
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

#[derive(Debug, Clone, Copy)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

/// Logs the response as produced by the inner handlers
#[derive(Debug, Clone, Copy)]
pub struct AccessLog;

impl<B: HttpBody> OnResponse<B> for AccessLog {
    fn on_response(self, response: &axum::http::Response<B>, latency: Duration, _span: &Span) {
        tracing::info!(
            status = response.status().as_u16(),
            bytes = response_size(response.body()),
            elapsed = ?latency,
            "request completed"
        );
    }
}

/// Body length in bytes, or the known lower bound for streamed bodies
pub fn response_size<B: HttpBody>(body: &B) -> u64 {
    let hint = body.size_hint();
    hint.exact().unwrap_or_else(|| hint.lower())
}

//! Axum glue between the listener and the route tree.
//!
//! # Responsibilities
//! - One fallback service receives every request; axum does no routing
//! - Wire up middleware (request ID, tracing, write timeout)
//! - Collect the body under the read timeout and size limit
//! - Run the synchronous dispatch on the blocking pool
//!
//! # Design Decisions
//! - The configuration snapshot is taken once per request, before dispatch
//! - The write timeout is read when the router is built (at `Kernel::run*`)

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::KernelConfig;
use crate::routing::RouteTree;

/// State shared by every request of a server.
#[derive(Clone)]
pub struct AppState {
    routes: Arc<RouteTree>,
    config: Arc<RwLock<Arc<KernelConfig>>>,
}

impl AppState {
    pub fn new(routes: Arc<RouteTree>, config: Arc<RwLock<Arc<KernelConfig>>>) -> Self {
        Self { routes, config }
    }

    fn snapshot(&self) -> Arc<KernelConfig> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, write_timeout: Duration) -> Router {
    Router::new()
        .fallback(dispatch_request)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(write_timeout)),
        )
}

async fn dispatch_request(State(state): State<AppState>, request: Request<Body>) -> Response {
    let config = state.snapshot();
    let (parts, body) = request.into_parts();

    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > config.max_body_bytes) {
        tracing::debug!(path = %parts.uri.path(), "request body too large");
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let collect = axum::body::to_bytes(body, config.max_body_bytes);
    let bytes: Bytes = match tokio::time::timeout(config.read_timeout(), collect).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            tracing::debug!(path = %parts.uri.path(), error = %e, "failed to read request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
        Err(_) => {
            tracing::warn!(path = %parts.uri.path(), "request body read timed out");
            return StatusCode::REQUEST_TIMEOUT.into_response();
        }
    };

    let request = Request::from_parts(parts, bytes);
    let routes = state.routes.clone();
    match tokio::task::spawn_blocking(move || routes.dispatch(&config, request)).await {
        Ok(response) => response.map(Body::from),
        Err(e) => {
            tracing::error!(error = %e, "handler panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::routing::Routes;
    use tower::ServiceExt;

    fn state(routes: RouteTree, config: KernelConfig) -> AppState {
        AppState::new(Arc::new(routes), Arc::new(RwLock::new(Arc::new(config))))
    }

    fn echo_routes() -> RouteTree {
        let mut routes = RouteTree::new();
        routes
            .post(
                "/echo",
                Handler::new()
                    .endpoint(|ctx| {
                        let body = ctx.request().body().clone();
                        ctx.bytes(StatusCode::OK, &body);
                    })
                    .unwrap(),
            )
            .unwrap();
        routes
    }

    #[tokio::test]
    async fn forwards_body_and_sets_request_id() {
        let app = build_router(state(echo_routes(), KernelConfig::default()), Duration::from_secs(5));

        let response = app
            .oneshot(
                Request::post("/echo")
                    .body(Body::from("ping"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body.as_ref(), b"ping");
    }

    #[tokio::test]
    async fn rejects_oversized_body() {
        let config = KernelConfig {
            max_body_bytes: 4,
            ..KernelConfig::default()
        };
        let app = build_router(state(echo_routes(), config), Duration::from_secs(5));

        let response = app
            .oneshot(
                Request::post("/echo")
                    .header(header::CONTENT_LENGTH, "10")
                    .body(Body::from("0123456789"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn panicking_handler_is_answered_with_500() {
        let mut routes = RouteTree::new();
        routes
            .get(
                "/boom",
                Handler::new().endpoint(|_| panic!("boom")).unwrap(),
            )
            .unwrap();
        let app = build_router(state(routes, KernelConfig::default()), Duration::from_secs(5));

        let response = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::AuthMode;
use crate::middleware::gate;
use crate::oauth;
use crate::AppState;

pub mod descriptors;
pub mod handlers;

/// Request bodies are small JSON documents; 1 MB is plenty.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the full application router.
///
/// OAuth endpoints and the plugin manifest are only mounted when the
/// instance runs with `AUTH_MODE=oauth`.
pub fn router(state: Arc<AppState>) -> Router {
    let gated = middleware::from_fn_with_state(state.clone(), gate::require_caller);

    let mut app = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/test-jira", get(handlers::test_tracker))
        .route("/openapi.json", get(descriptors::openapi))
        .route(
            "/crear-epica",
            post(handlers::create_epic).route_layer(gated.clone()),
        )
        .route(
            "/crear-epica-desde-claude",
            post(handlers::create_epic)
                .route_layer(gated)
                .get(handlers::create_epic_info),
        );

    if state.config.auth_mode == AuthMode::OAuth {
        app = app
            .route("/oauth/authorize", get(oauth::handlers::authorize))
            .route("/oauth/token", post(oauth::handlers::token))
            .route(
                "/.well-known/ai-plugin.json",
                get(descriptors::plugin_manifest),
            );
    }

    app.fallback(fallback_404)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Middleware: injects a unique X-Request-Id into every response.
/// This allows clients to correlate errors with server logs.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: injects security headers into every response.
async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    // Token responses and epic results must never be cached
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    // Authorization codes travel in redirect URLs
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.remove("Server");

    resp
}

//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The dev server answers three kinds of requests under a single Axum router:
//! the landing view at `/`, a health check at `/healthz`, and everything
//! matching the proxy prefix, which is forwarded to the backend before any
//! local route sees it. Anything else falls through to the static directory.

use axum::Router;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::view;

pub fn app(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.public_dir);
    let cors = cors_layer(&state.config.cors_origins);

    let router = Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .fallback_service(static_files)
        .layer(CompressionLayer::new())
        // Outside compression: proxied bodies go back exactly as received.
        .layer(middleware::from_fn_with_state(state.clone(), proxy_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();
    if origins.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// `GET /` — the static landing view.
async fn index() -> Html<String> {
    Html(view::page(view::TITLE, &view::coming_soon()))
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

/// `GET /healthz` — liveness check, same body shape as the backend's.
async fn healthz() -> Json<Health> {
    Json(Health { status: "healthy" })
}

async fn proxy_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.proxy.rule().matches(request.uri().path()) {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    match state.proxy.forward(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(%method, %path, error = %e, "proxy request failed");
            e.into_response()
        }
    }
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;

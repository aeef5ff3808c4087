//! The HTTP/WS Front: the `axum::Router` exposing `POST /`, `GET /`,
//! `OPTIONS *`, and `GET /ws`.
//!
//! CORS headers are applied with the gateway's exact literal values rather
//! than `tower_http::cors::CorsLayer`'s permissive-`Any` defaults, so the
//! wire-visible headers match the contract byte for byte.

use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::extract::Request;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::bridge::Registry;

use super::{assets, setup, ws};

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/", get(assets::index).post(setup::connect).options(preflight))
        .route("/ws", get(ws::upgrade).options(preflight))
        .layer(middleware::from_fn(apply_cors_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn apply_cors_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        axum::http::header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("x-requested-with"),
    );
    headers.insert(
        axum::http::header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, GET, OPTIONS"),
    );
    response
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP surface: public listings, the signed-in account area and health.

pub mod account;
pub mod api;

use std::sync::Arc;

use axum::http::{header, request::Parts, HeaderValue, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::middleware::auth::require_auth;
use crate::middleware::security::add_security_headers;
use crate::AppState;

/// Origins accepted in addition to the site itself.
const DEV_ORIGIN_PREFIXES: &[&str] = &["http://localhost", "http://127.0.0.1"];

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id: option_env!("BUILD_ID").unwrap_or("unknown").to_string(),
    })
}

fn is_allowed_origin(origin: &str, site_origin: &str) -> bool {
    origin == site_origin
        || DEV_ORIGIN_PREFIXES
            .iter()
            .any(|prefix| origin.starts_with(prefix))
}

/// Credentialed CORS for the site front end. The access-token cookie
/// travels with favourites and profile requests.
fn cors_layer(site_origin: String) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _: &Parts| {
                origin
                    .to_str()
                    .is_ok_and(|o| is_allowed_origin(o, &site_origin))
            },
        ))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Listings and agents are public; `/api/me` and `/api/favorites` need a
/// signed-in user.
pub fn create_router(state: Arc<AppState>) -> Router {
    let account =
        account::routes().route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .merge(api::routes())
        .merge(account)
        .layer(middleware::from_fn(add_security_headers))
        .layer(cors_layer(state.config.site_origin.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origins() {
        let site = "https://superhomes.my";

        assert!(is_allowed_origin("https://superhomes.my", site));
        assert!(is_allowed_origin("http://localhost:3000", site));
        assert!(is_allowed_origin("http://127.0.0.1:8080", site));
        assert!(!is_allowed_origin("https://superhomes.my.evil.com", site));
        assert!(!is_allowed_origin("https://other.example", site));
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SuperHomes API Server
//!
//! Serves listings, agents and favourites from the hosted row store and
//! verifies access tokens issued by the hosted auth service.

use std::sync::Arc;

use anyhow::Context;
use superhomes::{backend::SupabaseClient, config::Config, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting SuperHomes API");

    if config.supabase_service_key.is_none() {
        tracing::warn!("SUPABASE_SERVICE_KEY not set, row access uses the anon key");
    }
    let db = Arc::new(SupabaseClient::server(&config));
    tracing::info!(url = %config.supabase_url, "Backend client initialized");

    let state = Arc::new(AppState::new(config.clone(), db));
    let app = superhomes::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("superhomes=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! SuperHomes: property listings backed by a hosted auth service and row store.
//!
//! The crate has two halves:
//! - [`services::SessionManager`]: client-side session state kept in step
//!   with the auth service, with profile hydration and provisioning
//! - An HTTP API ([`routes::create_router`]) for listings, agents,
//!   favourites and the caller's profile

pub mod backend;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use backend::Database;
use config::Config;
use services::{AgentService, FavoriteService, ListingService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Database>,
    pub listings: ListingService,
    pub agents: AgentService,
    pub favorites: FavoriteService,
}

impl AppState {
    pub fn new(config: Config, db: Arc<dyn Database>) -> Self {
        Self {
            listings: ListingService::new(db.clone()),
            agents: AgentService::new(db.clone()),
            favorites: FavoriteService::new(db.clone()),
            config,
            db,
        }
    }
}

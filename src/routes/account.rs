// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Routes for the signed-in user.
//! The auth middleware is applied in routes/mod.rs for these routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Agent, Favorite, Profile};
use crate::services::profile::resolve_profile;
use crate::services::ContactDetails;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/me/agent", put(update_agent_contact))
        .route("/api/favorites", get(list_favorites))
        .route(
            "/api/favorites/{property_id}",
            post(add_favorite).delete(remove_favorite),
        )
}

/// Hydrated profile of the caller. A missing profile row is created.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<Profile> {
    let profile = resolve_profile(
        state.db.as_ref(),
        user.user_id,
        user.email.as_deref(),
        state.config.profile_fetch_timeout,
    )
    .await;
    Json(profile)
}

async fn update_agent_contact(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(details): Json<ContactDetails>,
) -> Result<Json<Agent>> {
    Ok(Json(state.agents.update_contact(user.user_id, details).await?))
}

// ─── Favourites ──────────────────────────────────────────────

async fn list_favorites(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Favorite>>> {
    Ok(Json(state.favorites.list(user.user_id).await?))
}

async fn add_favorite(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(property_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.favorites.add(user.user_id, property_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(property_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.favorites.remove(user.user_id, property_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public listing and agent routes.

use crate::error::{AppError, Result};
use crate::models::property::{LOCATIONS, PROPERTY_TYPES};
use crate::models::{Agent, Property, SearchFilters};
use crate::services::PropertyDetail;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Public routes (no authentication).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/filters", get(get_filters))
        .route("/api/properties", get(search_properties))
        .route("/api/properties/featured", get(featured_properties))
        .route("/api/properties/{id}", get(get_property))
        .route("/api/properties/{id}/similar", get(similar_properties))
        .route("/api/agents", get(list_agents))
        .route("/api/agents/{id}", get(get_agent))
}

// ─── Filters ─────────────────────────────────────────────────

/// Choices for the search filter dropdowns.
#[derive(Serialize)]
pub struct FilterOptions {
    pub property_types: &'static [&'static str],
    pub locations: &'static [&'static str],
}

async fn get_filters() -> Json<FilterOptions> {
    Json(FilterOptions {
        property_types: PROPERTY_TYPES,
        locations: LOCATIONS,
    })
}

// ─── Properties ──────────────────────────────────────────────

/// Raw search query. Form fields arrive as strings and may be empty.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub location: Option<String>,
    pub property_type: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub bedrooms: Option<String>,
}

impl SearchParams {
    fn into_filters(self) -> Result<SearchFilters> {
        Ok(SearchFilters {
            location: self.location,
            property_type: self.property_type,
            min_price: parse_price("min_price", self.min_price)?,
            max_price: parse_price("max_price", self.max_price)?,
            bedrooms: parse_number("bedrooms", self.bedrooms)?,
        })
    }
}

/// Parse an optional numeric field; blank means unset.
fn parse_number<T: FromStr>(field: &str, raw: Option<String>) -> Result<Option<T>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid {}: {}", field, v))),
    }
}

/// Prices must be finite; `f64` parsing also accepts `inf` and `NaN`.
fn parse_price(field: &str, raw: Option<String>) -> Result<Option<f64>> {
    match parse_number::<f64>(field, raw)? {
        Some(v) if !v.is_finite() => {
            Err(AppError::BadRequest(format!("Invalid {}: {}", field, v)))
        }
        price => Ok(price),
    }
}

async fn search_properties(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Property>>> {
    let filters = params.into_filters()?;
    Ok(Json(state.listings.search(filters).await?))
}

async fn featured_properties(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Property>>> {
    Ok(Json(state.listings.featured().await?))
}

async fn get_property(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PropertyDetail>> {
    Ok(Json(state.listings.detail(id).await?))
}

async fn similar_properties(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Property>>> {
    Ok(Json(state.listings.similar(id).await?))
}

// ─── Agents ──────────────────────────────────────────────────

async fn list_agents(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Agent>>> {
    Ok(Json(state.agents.list().await?))
}

async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Agent>> {
    Ok(Json(state.agents.get(id).await?))
}

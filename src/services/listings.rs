// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Listing reads: search, featured, detail and similar listings.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::backend::Database;
use crate::error::{AppError, BackendError, Result};
use crate::models::{Agent, Property, PropertyQuery, SearchFilters};

/// Number of listings on the home page.
pub const FEATURED_LIMIT: u32 = 6;
/// Number of similar listings shown on a detail page.
pub const SIMILAR_LIMIT: u32 = 3;
/// Longest accepted location filter.
const MAX_LOCATION_LEN: usize = 100;

/// Listing detail with everything needed to contact the agent.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyDetail {
    pub property: Property,
    pub agent: Option<Agent>,
    pub formatted_price: String,
    /// WhatsApp click-to-chat link, when the agent has a number
    pub whatsapp_url: Option<String>,
}

pub struct ListingService {
    db: Arc<dyn Database>,
}

impl ListingService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Active listings matching `filters`, newest first.
    pub async fn search(&self, filters: SearchFilters) -> Result<Vec<Property>> {
        let filters = validate_filters(filters)?;
        let query = PropertyQuery::active().with_filters(filters);
        Ok(self.db.query_properties(&query).await?)
    }

    pub async fn featured(&self) -> Result<Vec<Property>> {
        let query = PropertyQuery::active().limit(FEATURED_LIMIT);
        Ok(self.db.query_properties(&query).await?)
    }

    pub async fn detail(&self, id: Uuid) -> Result<PropertyDetail> {
        let property = self.property(id).await?;

        // A listing whose agent has gone is still shown, without contact details.
        let agent = match self.db.get_agent(property.agent_id).await {
            Ok(agent) => Some(agent),
            Err(BackendError::NoRows) => {
                tracing::warn!(property_id = %id, agent_id = %property.agent_id, "Listing agent not found");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let whatsapp_url = agent
            .as_ref()
            .and_then(|a| a.whatsapp_link(&property.enquiry_message()));

        Ok(PropertyDetail {
            formatted_price: property.formatted_price(),
            property,
            agent,
            whatsapp_url,
        })
    }

    /// Other active listings of the same type.
    pub async fn similar(&self, id: Uuid) -> Result<Vec<Property>> {
        let property = self.property(id).await?;
        let query = PropertyQuery::active()
            .with_filters(SearchFilters {
                property_type: Some(property.property_type),
                ..Default::default()
            })
            .excluding(id)
            .limit(SIMILAR_LIMIT);
        Ok(self.db.query_properties(&query).await?)
    }

    async fn property(&self, id: Uuid) -> Result<Property> {
        self.db.get_property(id).await.map_err(|e| match e {
            BackendError::NoRows => AppError::NotFound(format!("Property {}", id)),
            other => other.into(),
        })
    }
}

/// Normalise filters and reject impossible ones.
fn validate_filters(filters: SearchFilters) -> Result<SearchFilters> {
    let filters = filters.normalized();

    if filters
        .location
        .as_ref()
        .is_some_and(|l| l.chars().count() > MAX_LOCATION_LEN)
    {
        return Err(AppError::BadRequest(format!(
            "location must be at most {} characters",
            MAX_LOCATION_LEN
        )));
    }
    if [filters.min_price, filters.max_price]
        .iter()
        .flatten()
        .any(|p| !p.is_finite())
    {
        return Err(AppError::BadRequest("price must be a finite number".to_string()));
    }
    if let (Some(min), Some(max)) = (filters.min_price, filters.max_price) {
        if min > max {
            return Err(AppError::BadRequest(
                "min_price must not exceed max_price".to_string(),
            ));
        }
    }
    Ok(filters)
}

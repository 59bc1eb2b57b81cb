// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Property listing model and listing queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Property types offered in the search filters.
pub const PROPERTY_TYPES: &[&str] = &["Condo", "Landed", "Commercial", "Apartment"];

/// Locations offered in the search filters.
pub const LOCATIONS: &[&str] = &[
    "KLCC, Kuala Lumpur",
    "Damansara Heights, Kuala Lumpur",
    "Mont Kiara, Kuala Lumpur",
    "Bangsar, Kuala Lumpur",
    "Setia Alam, Shah Alam",
    "Tropicana, Petaling Jaya",
    "Cyberjaya, Selangor",
    "Putrajaya",
    "Subang Jaya, Selangor",
    "Ampang, Kuala Lumpur",
];

/// Publication status of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    #[default]
    Active,
    Draft,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Active => "active",
            PropertyStatus::Draft => "draft",
        }
    }
}

/// Row in the `properties` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Asking price in MYR
    pub price: f64,
    pub location: String,
    /// Free-form type (scraped listings do not follow a fixed set)
    pub property_type: String,
    pub bedrooms: u32,
    pub bathrooms: u32,
    /// Built-up size in square feet
    pub built_up_size: f64,
    #[serde(default)]
    pub tenure: String,
    #[serde(default)]
    pub furnishing: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub status: PropertyStatus,
    pub agent_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Columns populated by the listing importer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub land_size: Option<f64>,
}

impl Property {
    pub fn formatted_price(&self) -> String {
        format_price(self.price)
    }

    /// Prefilled enquiry sent to the listing agent.
    pub fn enquiry_message(&self) -> String {
        format!(
            "Hi, I'm interested in {} listed at {}",
            self.title,
            self.formatted_price()
        )
    }
}

/// Format a price as whole ringgit with grouped thousands, e.g. `RM1,250,000`.
pub fn format_price(price: f64) -> String {
    let rounded = price.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}RM{}", sign, grouped)
}

/// User-facing search filters.
///
/// Empty strings and zero bounds mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    /// Minimum number of bedrooms
    #[serde(default)]
    pub bedrooms: Option<u32>,
}

impl SearchFilters {
    /// Drop blank strings and zero bounds.
    pub fn normalized(self) -> Self {
        let text = |v: Option<String>| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        Self {
            location: text(self.location),
            property_type: text(self.property_type),
            min_price: self.min_price.filter(|p| *p > 0.0),
            max_price: self.max_price.filter(|p| *p > 0.0),
            bedrooms: self.bedrooms.filter(|b| *b > 0),
        }
    }
}

/// Store-level listing query. Results are ordered newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyQuery {
    pub status: Option<PropertyStatus>,
    pub filters: SearchFilters,
    pub exclude_id: Option<Uuid>,
    pub limit: Option<u32>,
}

impl PropertyQuery {
    /// Active listings only.
    pub fn active() -> Self {
        Self {
            status: Some(PropertyStatus::Active),
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters.normalized();
        self
    }

    pub fn excluding(mut self, id: Uuid) -> Self {
        self.exclude_id = Some(id);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the query predicate against a single row.
    pub fn matches(&self, property: &Property) -> bool {
        let f = &self.filters;

        if self.status.is_some_and(|s| s != property.status) {
            return false;
        }
        if self.exclude_id == Some(property.id) {
            return false;
        }
        if let Some(location) = &f.location {
            if !property
                .location
                .to_lowercase()
                .contains(&location.to_lowercase())
            {
                return false;
            }
        }
        if f
            .property_type
            .as_ref()
            .is_some_and(|t| *t != property.property_type)
        {
            return false;
        }
        if f.min_price.is_some_and(|min| property.price < min) {
            return false;
        }
        if f.max_price.is_some_and(|max| property.price > max) {
            return false;
        }
        if f.bedrooms.is_some_and(|min| property.bedrooms < min) {
            return false;
        }
        true
    }
}

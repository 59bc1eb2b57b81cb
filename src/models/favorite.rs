//! Saved-listing model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row in the `favorites` table. Unique on `(user_id, property_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub property_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for the `favorites` table.
#[derive(Debug, Clone, Serialize)]
pub struct NewFavorite {
    pub user_id: Uuid,
    pub property_id: Uuid,
}

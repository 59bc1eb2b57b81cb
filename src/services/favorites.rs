// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Saved listings.

use std::sync::Arc;

use uuid::Uuid;

use crate::backend::Database;
use crate::error::{AppError, BackendError, Result};
use crate::models::{Favorite, NewFavorite};

pub struct FavoriteService {
    db: Arc<dyn Database>,
}

impl FavoriteService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Favourites of `user_id`, newest first.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Favorite>> {
        Ok(self.db.list_favorites(user_id).await?)
    }

    /// Save a listing. Saving it twice is not an error.
    pub async fn add(&self, user_id: Uuid, property_id: Uuid) -> Result<()> {
        self.db.get_property(property_id).await.map_err(|e| match e {
            BackendError::NoRows => AppError::NotFound(format!("Property {}", property_id)),
            other => other.into(),
        })?;

        let favorite = NewFavorite {
            user_id,
            property_id,
        };
        match self.db.insert_favorite(&favorite).await {
            Ok(_) => {
                tracing::debug!(user_id = %user_id, property_id = %property_id, "Favourite added");
                Ok(())
            }
            Err(e) if e.is_conflict() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove(&self, user_id: Uuid, property_id: Uuid) -> Result<()> {
        self.db.delete_favorite(user_id, property_id).await?;
        Ok(())
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Agent directory and self-service contact updates.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::backend::Database;
use crate::error::{AppError, BackendError, Result};
use crate::models::{Agent, AgentContactUpdate, UserType};

/// Contact details submitted by an agent.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub phone: String,
}

pub struct AgentService {
    db: Arc<dyn Database>,
}

impl AgentService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// All agents ordered by name.
    pub async fn list(&self) -> Result<Vec<Agent>> {
        Ok(self.db.list_agents().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Agent> {
        self.db.get_agent(id).await.map_err(|e| match e {
            BackendError::NoRows => AppError::NotFound(format!("Agent {}", id)),
            other => other.into(),
        })
    }

    /// Update the caller's own contact details. The WhatsApp number always
    /// mirrors the phone number.
    pub async fn update_contact(&self, user_id: Uuid, details: ContactDetails) -> Result<Agent> {
        let name = details.name.trim();
        let phone = details.phone.trim();
        if name.is_empty() || phone.is_empty() {
            return Err(AppError::BadRequest(
                "name and phone are required".to_string(),
            ));
        }

        let row = self.db.get_user_row(user_id).await.map_err(|e| match e {
            BackendError::NoRows => AppError::Forbidden("No profile for this account".to_string()),
            other => other.into(),
        })?;
        if row.user_type != UserType::Agent {
            return Err(AppError::Forbidden(
                "Only agents can edit contact details".to_string(),
            ));
        }

        let update = AgentContactUpdate {
            name: name.to_string(),
            phone: phone.to_string(),
            whatsapp: phone.to_string(),
            updated_at: Utc::now(),
        };

        let agent = self
            .db
            .update_agent_contact(user_id, &update)
            .await
            .map_err(|e| match e {
                BackendError::NoRows => AppError::NotFound("Agent record".to_string()),
                other => other.into(),
            })?;

        tracing::info!(user_id = %user_id, agent_id = %agent.id, "Agent contact updated");
        Ok(agent)
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Promote a freshly registered user to the agent role.
//!
//! The backend creates the `users` row asynchronously after sign-up, so the
//! first update may find nothing. We retry with exponential backoff and, if
//! the row never shows up, create it ourselves.

use std::time::Duration;

use crate::backend::Database;
use crate::error::BackendError;
use crate::models::{AuthUser, NewAgent, NewUserRow, UserRow, UserType};

/// Retry policy for waiting on the `users` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSyncPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RoleSyncPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RoleSyncPolicy {
    /// Delay after the given (zero-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoleSyncError {
    #[error("Failed to set agent role: {0}")]
    Role(BackendError),

    #[error("Failed to create agent record: {0}")]
    AgentRecord(BackendError),
}

/// Set `user_type = agent` for `user` and create the agent record when a
/// phone number was given.
pub async fn promote_to_agent(
    db: &dyn Database,
    user: &AuthUser,
    name: &str,
    phone: Option<&str>,
    policy: &RoleSyncPolicy,
) -> Result<(), RoleSyncError> {
    set_agent_role(db, user, policy)
        .await
        .map_err(RoleSyncError::Role)?;

    let Some(phone) = phone.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(());
    };

    match db.get_agent_by_user_id(user.id).await {
        Ok(_) => {
            tracing::debug!(user_id = %user.id, "Agent record already exists");
        }
        Err(BackendError::NoRows) => {
            let agent = NewAgent {
                user_id: user.id,
                name: name.to_string(),
                phone: phone.to_string(),
                whatsapp: phone.to_string(),
            };
            db.insert_agent(&agent)
                .await
                .map_err(RoleSyncError::AgentRecord)?;
            tracing::info!(user_id = %user.id, "Created agent record");
        }
        Err(e) => return Err(RoleSyncError::AgentRecord(e)),
    }

    Ok(())
}

async fn set_agent_role(
    db: &dyn Database,
    user: &AuthUser,
    policy: &RoleSyncPolicy,
) -> Result<UserRow, BackendError> {
    for attempt in 0..policy.max_attempts {
        match db.update_user_type(user.id, UserType::Agent).await {
            Ok(row) => {
                tracing::debug!(user_id = %user.id, attempt, "Agent role set");
                return Ok(row);
            }
            Err(BackendError::NoRows) if attempt + 1 < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::debug!(
                    user_id = %user.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Profile row not created yet, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(BackendError::NoRows) => {}
            Err(e) => return Err(e),
        }
    }

    tracing::info!(user_id = %user.id, "Profile row never appeared, creating it");
    let row = NewUserRow {
        id: user.id,
        email: user.email.clone(),
        user_type: UserType::Agent,
    };
    match db.insert_user_row(&row).await {
        Ok(row) => Ok(row),
        // Lost the race against the backend's own insert
        Err(e) if e.is_conflict() => db.update_user_type(user.id, UserType::Agent).await,
        Err(e) => Err(e),
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile hydration with fallback provisioning.

use std::time::Duration;

use uuid::Uuid;

use crate::backend::Database;
use crate::error::BackendError;
use crate::models::{AuthUser, NewUserRow, Profile, UserRow, UserType};

/// Resolve the profile of `user_id`.
///
/// A missing `users` row is provisioned as a buyer. Any other failure, or
/// running past `timeout`, degrades to [`Profile::minimal`]. Never fails.
pub async fn resolve_profile(
    db: &dyn Database,
    user_id: Uuid,
    email: Option<&str>,
    timeout: Duration,
) -> Profile {
    match tokio::time::timeout(timeout, fetch_profile(db, user_id, email)).await {
        Ok(Ok(profile)) => profile,
        Ok(Err(e)) => {
            tracing::warn!(user_id = %user_id, error = %e, "Profile fetch failed, using minimal profile");
            Profile::minimal(user_id, email)
        }
        Err(_) => {
            tracing::warn!(
                user_id = %user_id,
                timeout_ms = timeout.as_millis() as u64,
                "Profile fetch timed out, using minimal profile"
            );
            Profile::minimal(user_id, email)
        }
    }
}

async fn fetch_profile(
    db: &dyn Database,
    user_id: Uuid,
    email: Option<&str>,
) -> Result<Profile, BackendError> {
    let row = match db.get_user_row(user_id).await {
        Ok(row) => row,
        Err(BackendError::NoRows) => match provision_buyer(db, user_id, email).await {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Could not create profile row");
                return Ok(Profile::minimal(user_id, email));
            }
        },
        Err(e) => return Err(e),
    };

    let agent = if row.user_type == UserType::Agent {
        match db.get_agent_by_user_id(user_id).await {
            Ok(agent) => Some(agent),
            Err(BackendError::NoRows) => None,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Agent record fetch failed");
                None
            }
        }
    } else {
        None
    };

    Ok(Profile::from_row(row, agent.as_ref(), email))
}

/// Insert a buyer row, reading back the existing row if one appeared meanwhile.
async fn provision_buyer(
    db: &dyn Database,
    user_id: Uuid,
    email: Option<&str>,
) -> Result<UserRow, BackendError> {
    tracing::info!(user_id = %user_id, "No profile row, creating buyer profile");

    let row = NewUserRow {
        id: user_id,
        email: email.map(str::to_string),
        user_type: UserType::Buyer,
    };
    match db.insert_user_row(&row).await {
        Ok(row) => Ok(row),
        Err(e) if e.is_conflict() => db.get_user_row(user_id).await,
        Err(e) => Err(e),
    }
}

/// Make sure `user` has a `users` row, creating a buyer row if missing.
pub async fn ensure_profile_row(db: &dyn Database, user: &AuthUser) -> Result<(), BackendError> {
    match db.get_user_row(user.id).await {
        Ok(_) => Ok(()),
        Err(BackendError::NoRows) => provision_buyer(db, user.id, user.email.as_deref())
            .await
            .map(|_| ()),
        Err(e) => Err(e),
    }
}

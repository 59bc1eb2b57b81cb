// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Hydrated user profile.
//!
//! A profile is resolved once per hydration from the `users` row and, for
//! agents, the `agents` row. It never changes shape afterwards.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Agent, UserRow, UserType};

/// Profile view of the signed-in user, tagged by `user_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "user_type", rename_all = "lowercase")]
pub enum Profile {
    Buyer {
        id: Uuid,
        email: Option<String>,
    },
    Agent {
        id: Uuid,
        email: Option<String>,
        name: Option<String>,
        phone: Option<String>,
        whatsapp: Option<String>,
    },
}

impl Profile {
    /// Minimal profile used when the store cannot be read or written.
    pub fn minimal(id: Uuid, email: Option<&str>) -> Self {
        Profile::Buyer {
            id,
            email: email.map(str::to_string),
        }
    }

    /// Build a profile from a `users` row and, for agents, the agent extension.
    ///
    /// `fallback_email` is used when the row has no email.
    pub fn from_row(row: UserRow, agent: Option<&Agent>, fallback_email: Option<&str>) -> Self {
        let email = row.email.or_else(|| fallback_email.map(str::to_string));
        match row.user_type {
            UserType::Buyer => Profile::Buyer { id: row.id, email },
            UserType::Agent => Profile::Agent {
                id: row.id,
                email,
                name: agent.map(|a| a.name.clone()),
                phone: agent.map(|a| a.phone.clone()),
                whatsapp: agent.map(|a| a.whatsapp.clone()),
            },
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Profile::Buyer { id, .. } | Profile::Agent { id, .. } => *id,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Profile::Buyer { email, .. } | Profile::Agent { email, .. } => email.as_deref(),
        }
    }

    pub fn user_type(&self) -> UserType {
        match self {
            Profile::Buyer { .. } => UserType::Buyer,
            Profile::Agent { .. } => UserType::Agent,
        }
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, Profile::Agent { .. })
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Profile::Agent { name, .. } => name.as_deref(),
            Profile::Buyer { .. } => None,
        }
    }

    pub fn phone(&self) -> Option<&str> {
        match self {
            Profile::Agent { phone, .. } => phone.as_deref(),
            Profile::Buyer { .. } => None,
        }
    }

    pub fn whatsapp(&self) -> Option<&str> {
        match self {
            Profile::Agent { whatsapp, .. } => whatsapp.as_deref(),
            Profile::Buyer { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_row(id: Uuid) -> UserRow {
        UserRow {
            id,
            email: None,
            user_type: UserType::Agent,
            created_at: None,
        }
    }

    #[test]
    fn test_agent_fields_come_from_extension() {
        let id = Uuid::new_v4();
        let agent = Agent {
            id: Uuid::new_v4(),
            user_id: id,
            name: "Aisyah".to_string(),
            phone: "+60123456789".to_string(),
            whatsapp: "+60123456789".to_string(),
            profile_photo: None,
            credits_balance: 0,
            created_at: None,
            updated_at: None,
        };

        let profile = Profile::from_row(agent_row(id), Some(&agent), Some("a@test.com"));

        assert_eq!(profile.user_type(), UserType::Agent);
        assert_eq!(profile.name(), Some("Aisyah"));
        assert_eq!(profile.phone(), Some("+60123456789"));
        assert_eq!(profile.email(), Some("a@test.com"));
    }

    #[test]
    fn test_serializes_with_user_type_tag() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(Profile::minimal(id, Some("b@test.com"))).unwrap();

        assert_eq!(json["user_type"], "buyer");
        assert_eq!(json["email"], "b@test.com");
    }
}

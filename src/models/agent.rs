//! Agent extension model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row in the `agents` table, present only for users with the agent role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    /// Owning user (1:1 with `users.id`)
    pub user_id: Uuid,
    pub name: String,
    pub phone: String,
    pub whatsapp: String,
    #[serde(default)]
    pub profile_photo: Option<String>,
    #[serde(default)]
    pub credits_balance: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Agent {
    /// WhatsApp click-to-chat link with a prefilled message.
    pub fn whatsapp_link(&self, message: &str) -> Option<String> {
        let digits: String = self.whatsapp.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return None;
        }
        Some(format!(
            "https://wa.me/{}?text={}",
            digits,
            urlencoding::encode(message)
        ))
    }
}

/// Insert payload for the `agents` table.
#[derive(Debug, Clone, Serialize)]
pub struct NewAgent {
    pub user_id: Uuid,
    pub name: String,
    pub phone: String,
    pub whatsapp: String,
}

/// Contact fields an agent may edit on their own profile.
#[derive(Debug, Clone, Serialize)]
pub struct AgentContactUpdate {
    pub name: String,
    pub phone: String,
    pub whatsapp: String,
    pub updated_at: DateTime<Utc>,
}

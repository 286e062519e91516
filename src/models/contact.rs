use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub tenant_id: String,
    pub channel: String,
    /// Stable identity on the channel (Telegram numeric user id as text).
    pub channel_user_id: String,
    pub display_name: Option<String>,
    pub handle: Option<String>,
    pub status: ContactStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Active,
    Blocked,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Active => "active",
            ContactStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "blocked" => ContactStatus::Blocked,
            _ => ContactStatus::Active,
        }
    }
}

impl Contact {
    pub fn is_blocked(&self) -> bool {
        self.status == ContactStatus::Blocked
    }

    /// Best name we have for the contact, for event titles and prompts.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.handle.as_deref())
            .unwrap_or("Cliente")
    }
}

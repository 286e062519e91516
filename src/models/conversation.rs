use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub contact_id: String,
    pub tenant_id: String,
    pub channel: String,
    /// Where replies go on the channel (Telegram chat id as text).
    pub chat_id: String,
    pub message_count: i64,
    pub last_activity: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

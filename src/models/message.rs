use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    Contact,
    Assistant,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderType::Contact => "contact",
            SenderType::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "assistant" => SenderType::Assistant,
            _ => SenderType::Contact,
        }
    }
}

/// One append-only transcript row. `metadata` carries small JSON blobs
/// (media kind on inbound, situation key on outbound).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub sender_type: SenderType,
    pub content: String,
    pub channel_message_id: Option<String>,
    pub metadata: Option<String>,
    pub created_at: NaiveDateTime,
}

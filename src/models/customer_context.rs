use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::appointment::{Appointment, AppointmentStatus};
use super::message::{Message, SenderType};

/// Read-only snapshot assembled per turn. Never persisted; the cache in
/// `services::context` holds it for a few minutes at most.
#[derive(Debug, Clone)]
pub struct CustomerContext {
    pub contact_id: String,
    pub name: Option<String>,
    /// Chronological, most recent last.
    pub recent_messages: Vec<Message>,
    /// Most recent first.
    pub recent_appointments: Vec<Appointment>,
    pub preferred_professional: Option<String>,
    pub communication_style: CommunicationStyle,
    pub is_returning: bool,
    pub has_history: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicationStyle {
    Informal,
    Neutral,
}

impl CommunicationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationStyle::Informal => "informal",
            CommunicationStyle::Neutral => "neutral",
        }
    }
}

impl CustomerContext {
    /// Baseline snapshot for a contact with no usable history.
    pub fn minimal(contact_id: &str, name: Option<String>) -> Self {
        CustomerContext {
            contact_id: contact_id.to_string(),
            name,
            recent_messages: Vec::new(),
            recent_appointments: Vec::new(),
            preferred_professional: None,
            communication_style: CommunicationStyle::Neutral,
            is_returning: false,
            has_history: false,
        }
    }
}

/// Most-booked professional id; ties go to whoever was booked most
/// recently.
pub fn derive_preferred_professional(appointments: &[Appointment]) -> Option<String> {
    let mut counts: HashMap<&str, (usize, DateTime<Utc>)> = HashMap::new();
    for appt in appointments {
        let entry = counts
            .entry(appt.professional_id.as_str())
            .or_insert((0, appt.scheduled_at));
        entry.0 += 1;
        if appt.scheduled_at > entry.1 {
            entry.1 = appt.scheduled_at;
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, (count, latest))| (*count, *latest))
        .map(|(id, _)| id.to_string())
}

const INFORMAL_MARKERS: [&str; 9] =
    ["kk", "haha", "rsrs", "blz", "vlw", "valeu", "opa", ":)", "!"];

pub fn is_informal(text: &str) -> bool {
    let lower = text.to_lowercase();
    INFORMAL_MARKERS.iter().any(|m| lower.contains(m))
}

/// Looks at the contact's last five messages; informal wins on half or
/// more.
pub fn derive_communication_style(messages: &[Message]) -> CommunicationStyle {
    let recent: Vec<&Message> = messages
        .iter()
        .rev()
        .filter(|m| m.sender_type == SenderType::Contact)
        .take(5)
        .collect();
    if recent.is_empty() {
        return CommunicationStyle::Neutral;
    }
    let informal = recent.iter().filter(|m| is_informal(&m.content)).count();
    if informal * 2 >= recent.len() {
        CommunicationStyle::Informal
    } else {
        CommunicationStyle::Neutral
    }
}

pub fn derive_is_returning(appointments: &[Appointment]) -> bool {
    appointments
        .iter()
        .any(|a| a.status != AppointmentStatus::Cancelled)
}

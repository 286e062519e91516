use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub tenant_id: String,
    pub contact_id: String,
    pub professional_id: String,
    pub product_id: String,
    /// Mirrors the external calendar event title.
    pub title: String,
    pub description: Option<String>,
    /// Always UTC. Converted to the tenant's local clock only for display
    /// and business-hours checks.
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub calendar_event_id: Option<String>,
    /// Set when the external calendar and this row are known to disagree
    /// (event created but row insert failed is logged, not stored; this
    /// flag covers the inverse: row updated but event delete failed).
    pub needs_reconcile: bool,
    pub created_via: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    /// Reserved for bookings awaiting confirmation, e.g. ones entered by
    /// staff. The assistant always books straight to `Confirmed`.
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "scheduled" => AppointmentStatus::Scheduled,
            "cancelled" => AppointmentStatus::Cancelled,
            "completed" => AppointmentStatus::Completed,
            _ => AppointmentStatus::Confirmed,
        }
    }
}

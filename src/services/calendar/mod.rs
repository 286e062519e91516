pub mod google;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result of an availability probe. `reason` is provider detail for logs,
/// never shown to the customer.
#[derive(Debug, Clone)]
pub struct AvailabilityCheck {
    pub available: bool,
    pub reason: Option<String>,
}

/// Event to create on the target calendar. Times are UTC; the provider
/// is responsible for any wire-format conversion.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn check_availability(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        duration_minutes: i64,
    ) -> anyhow::Result<AvailabilityCheck>;

    /// Returns the provider's event id on success.
    async fn create_event(&self, calendar_id: &str, event: &EventDraft) -> anyhow::Result<String>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> anyhow::Result<()>;
}

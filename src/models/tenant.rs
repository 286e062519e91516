use serde::{Deserialize, Serialize};

use super::BusinessHours;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub business_name: String,
    /// Minutes east of UTC for the tenant's local clock, e.g. -180 for
    /// America/Sao_Paulo. Appointments are stored in UTC and converted at
    /// the edges.
    pub utc_offset_minutes: i32,
    pub business_hours: Option<String>,
    pub calendar_id: String,
    pub telegram_webhook_secret: Option<String>,
}

impl Tenant {
    pub fn hours(&self) -> Option<BusinessHours> {
        let raw = self.business_hours.as_deref()?;
        match BusinessHours::from_json(raw) {
            Ok(hours) => Some(hours),
            Err(e) => {
                tracing::warn!(tenant_id = %self.id, error = %e, "invalid business_hours json, ignoring");
                None
            }
        }
    }
}

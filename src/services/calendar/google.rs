use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::json;

use super::{AvailabilityCheck, CalendarProvider, EventDraft};

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar over REST: freeBusy for availability, events
/// insert/delete for bookings. Auth is a bearer token injected via config
/// (service-account deployments refresh it outside this process).
pub struct GoogleCalendarProvider {
    access_token: String,
    client: reqwest::Client,
}

impl GoogleCalendarProvider {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            client: reqwest::Client::new(),
        }
    }
}

fn rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    async fn check_availability(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        duration_minutes: i64,
    ) -> anyhow::Result<AvailabilityCheck> {
        let end = start + Duration::minutes(duration_minutes);
        let body = json!({
            "timeMin": rfc3339(&start),
            "timeMax": rfc3339(&end),
            "items": [{ "id": calendar_id }],
        });

        let resp = self
            .client
            .post(format!("{API_BASE}/freeBusy"))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("failed to call calendar freeBusy")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse freeBusy response")?;

        if !status.is_success() {
            anyhow::bail!("calendar freeBusy error ({}): {}", status, data);
        }

        let busy = data["calendars"][calendar_id]["busy"]
            .as_array()
            .map(|b| b.len())
            .unwrap_or(0);

        Ok(AvailabilityCheck {
            available: busy == 0,
            reason: (busy > 0).then(|| format!("{busy} busy block(s) in window")),
        })
    }

    async fn create_event(&self, calendar_id: &str, event: &EventDraft) -> anyhow::Result<String> {
        let body = json!({
            "summary": event.title,
            "description": event.description,
            "start": { "dateTime": rfc3339(&event.start) },
            "end": { "dateTime": rfc3339(&event.end) },
        });

        let resp = self
            .client
            .post(format!("{API_BASE}/calendars/{calendar_id}/events"))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("failed to create calendar event")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse event creation response")?;

        if !status.is_success() {
            anyhow::bail!("calendar event creation error ({}): {}", status, data);
        }

        data["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing id in created event response"))
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> anyhow::Result<()> {
        self.client
            .delete(format!("{API_BASE}/calendars/{calendar_id}/events/{event_id}"))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("failed to call calendar event delete")?
            .error_for_status()
            .context("calendar event delete returned error")?;

        Ok(())
    }
}

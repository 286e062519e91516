use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::db::queries;
use crate::models::customer_context::{
    derive_communication_style, derive_is_returning, derive_preferred_professional,
};
use crate::models::{Contact, CustomerContext};

pub const CONTEXT_TTL: Duration = Duration::from_secs(5 * 60);
pub const CONTEXT_CACHE_CAPACITY: usize = 128;

const RECENT_MESSAGES: i64 = 10;
const RECENT_APPOINTMENTS: i64 = 5;

/// Small in-process cache for context snapshots, keyed by (tenant,
/// contact). Entries expire after `ttl`; at capacity the stalest entry is
/// dropped. Shared via `AppState`, never a global.
pub struct ContextCache {
    entries: Mutex<HashMap<(String, String), (CustomerContext, Instant)>>,
    ttl: Duration,
    capacity: usize,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::with_ttl(CONTEXT_TTL, CONTEXT_CACHE_CAPACITY)
    }

    pub fn with_ttl(ttl: Duration, capacity: usize) -> Self {
        ContextCache {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    pub fn get(&self, tenant_id: &str, contact_id: &str) -> Option<CustomerContext> {
        let mut entries = self.entries.lock().unwrap();
        let key = (tenant_id.to_string(), contact_id.to_string());
        match entries.get(&key) {
            Some((ctx, inserted)) if inserted.elapsed() <= self.ttl => Some(ctx.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, tenant_id: &str, contact_id: &str, ctx: CustomerContext) {
        let mut entries = self.entries.lock().unwrap();
        let key = (tenant_id.to_string(), contact_id.to_string());
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let stalest = entries
                .iter()
                .min_by_key(|(_, (_, inserted))| *inserted)
                .map(|(k, _)| k.clone());
            if let Some(stalest) = stalest {
                entries.remove(&stalest);
            }
        }
        entries.insert(key, (ctx, Instant::now()));
    }

    /// Call after anything that changes history (a booking, a
    /// cancellation) so the next turn sees it.
    pub fn invalidate(&self, tenant_id: &str, contact_id: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&(tenant_id.to_string(), contact_id.to_string()));
    }
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembles the per-turn snapshot. Total: every query is independently
/// fail-soft, so a broken history table degrades the context instead of
/// killing the turn.
pub fn load_customer_context(
    conn: &Connection,
    cache: &ContextCache,
    contact: &Contact,
) -> CustomerContext {
    if let Some(ctx) = cache.get(&contact.tenant_id, &contact.id) {
        tracing::debug!(contact_id = %contact.id, "customer context cache hit");
        return ctx;
    }

    let recent_messages = match queries::recent_messages(conn, &contact.id, RECENT_MESSAGES) {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!(contact_id = %contact.id, error = %e, "failed to load recent messages");
            Vec::new()
        }
    };

    let recent_appointments =
        match queries::recent_appointments(conn, &contact.id, RECENT_APPOINTMENTS) {
            Ok(appointments) => appointments,
            Err(e) => {
                tracing::warn!(contact_id = %contact.id, error = %e, "failed to load recent appointments");
                Vec::new()
            }
        };

    let preferred_professional = derive_preferred_professional(&recent_appointments)
        .and_then(|id| match queries::get_professional(conn, &id) {
            Ok(Some(professional)) => Some(professional.name),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(professional_id = %id, error = %e, "failed to resolve preferred professional");
                None
            }
        });

    let ctx = CustomerContext {
        contact_id: contact.id.clone(),
        name: contact.display_name.clone().or_else(|| contact.handle.clone()),
        communication_style: derive_communication_style(&recent_messages),
        is_returning: derive_is_returning(&recent_appointments),
        has_history: !recent_messages.is_empty() || !recent_appointments.is_empty(),
        preferred_professional,
        recent_messages,
        recent_appointments,
    };

    cache.insert(&contact.tenant_id, &contact.id, ctx.clone());
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Appointment, AppointmentStatus, SenderType, Tenant};
    use chrono::Utc;

    fn setup() -> (Connection, Contact) {
        let conn = db::init_db(":memory:").unwrap();
        queries::insert_tenant(
            &conn,
            &Tenant {
                id: "t1".into(),
                business_name: "Estúdio Teste".into(),
                utc_offset_minutes: -180,
                business_hours: None,
                calendar_id: "cal-1".into(),
                telegram_webhook_secret: None,
            },
        )
        .unwrap();
        let contact =
            queries::find_or_create_contact(&conn, "t1", "telegram", "42", Some("Ana"), None)
                .unwrap();
        (conn, contact)
    }

    fn insert_appointment(conn: &Connection, contact: &Contact, professional: &str, hours_ago: i64) {
        let appt = Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: "t1".into(),
            contact_id: contact.id.clone(),
            professional_id: professional.into(),
            product_id: "prod-1".into(),
            title: "Corte de cabelo - Ana".into(),
            description: None,
            scheduled_at: Utc::now() - chrono::Duration::hours(hours_ago),
            duration_minutes: 60,
            status: AppointmentStatus::Completed,
            calendar_event_id: None,
            needs_reconcile: false,
            created_via: "assistant".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        queries::insert_appointment(conn, &appt).unwrap();
    }

    #[test]
    fn test_load_derives_context_from_history() {
        let (conn, contact) = setup();
        conn.execute_batch(
            "INSERT INTO professionals (id, tenant_id, name) VALUES
                ('prof-silva', 't1', 'Dra. Silva'),
                ('prof-costa', 't1', 'Dr. Costa');",
        )
        .unwrap();
        let conv =
            queries::find_or_create_conversation(&conn, &contact.id, "t1", "telegram", "100")
                .unwrap();
        queries::append_message(&conn, &conv.id, &SenderType::Contact, "opa, blz?", None, None)
            .unwrap();
        queries::append_message(&conn, &conv.id, &SenderType::Contact, "queria marcar kk", None, None)
            .unwrap();
        insert_appointment(&conn, &contact, "prof-silva", 24 * 30);
        insert_appointment(&conn, &contact, "prof-silva", 24 * 10);
        insert_appointment(&conn, &contact, "prof-costa", 24 * 5);

        let cache = ContextCache::new();
        let ctx = load_customer_context(&conn, &cache, &contact);

        assert_eq!(ctx.name.as_deref(), Some("Ana"));
        assert_eq!(ctx.recent_messages.len(), 2);
        assert_eq!(ctx.recent_appointments.len(), 3);
        assert_eq!(ctx.preferred_professional.as_deref(), Some("Dra. Silva"));
        assert!(ctx.is_returning);
        assert!(ctx.has_history);
        assert_eq!(ctx.communication_style, crate::models::CommunicationStyle::Informal);
    }

    #[test]
    fn test_load_with_empty_history_is_minimal() {
        let (conn, contact) = setup();
        let cache = ContextCache::new();
        let ctx = load_customer_context(&conn, &cache, &contact);

        assert!(!ctx.has_history);
        assert!(!ctx.is_returning);
        assert!(ctx.preferred_professional.is_none());
        assert!(ctx.recent_messages.is_empty());
    }

    #[test]
    fn test_cache_serves_stale_until_invalidated() {
        let (conn, contact) = setup();
        let cache = ContextCache::new();

        let first = load_customer_context(&conn, &cache, &contact);
        assert!(first.recent_appointments.is_empty());

        insert_appointment(&conn, &contact, "prof-silva", 5);

        let cached = load_customer_context(&conn, &cache, &contact);
        assert!(cached.recent_appointments.is_empty());

        cache.invalidate("t1", &contact.id);
        let fresh = load_customer_context(&conn, &cache, &contact);
        assert_eq!(fresh.recent_appointments.len(), 1);
    }

    #[test]
    fn test_cache_entries_expire() {
        let cache = ContextCache::with_ttl(Duration::from_millis(30), 8);
        cache.insert("t1", "c1", CustomerContext::minimal("c1", None));
        assert!(cache.get("t1", "c1").is_some());
        std::thread::sleep(Duration::from_millis(50));
        assert!(cache.get("t1", "c1").is_none());
    }

    #[test]
    fn test_cache_capacity_evicts_stalest() {
        let cache = ContextCache::with_ttl(Duration::from_secs(60), 2);
        cache.insert("t1", "c1", CustomerContext::minimal("c1", None));
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("t1", "c2", CustomerContext::minimal("c2", None));
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("t1", "c3", CustomerContext::minimal("c3", None));

        assert!(cache.get("t1", "c1").is_none());
        assert!(cache.get("t1", "c2").is_some());
        assert!(cache.get("t1", "c3").is_some());
    }
}

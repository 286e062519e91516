use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::ai::LlmProvider;
use crate::services::calendar::CalendarProvider;
use crate::services::channel::ChannelProvider;
use crate::services::context::ContextCache;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub llm: Box<dyn LlmProvider>,
    pub calendar: Box<dyn CalendarProvider>,
    pub channel: Box<dyn ChannelProvider>,
    pub context_cache: ContextCache,
    pub turn_locks: TurnLocks,
}

/// One async mutex per (tenant, contact), held for a whole turn. Two
/// webhook deliveries from the same contact cannot interleave on the
/// pending-interaction read-modify-clear, so they cannot double-book.
pub struct TurnLocks {
    locks: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

const TURN_LOCK_PRUNE_THRESHOLD: usize = 512;

impl TurnLocks {
    pub fn new() -> Self {
        TurnLocks {
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn for_contact(&self, tenant_id: &str, contact_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        if locks.len() > TURN_LOCK_PRUNE_THRESHOLD {
            // Drop entries nobody is holding; active turns keep a clone.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks
            .entry((tenant_id.to_string(), contact_id.to_string()))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

impl Default for TurnLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_contact_gets_same_lock() {
        let locks = TurnLocks::new();
        let a = locks.for_contact("t1", "c1");
        let b = locks.for_contact("t1", "c1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_different_contacts_get_different_locks() {
        let locks = TurnLocks::new();
        let a = locks.for_contact("t1", "c1");
        let b = locks.for_contact("t1", "c2");
        let c = locks.for_contact("t2", "c1");
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}

//! Bounded, time-expiring cache for list-all responses.
//!
//! Taxonomic groups and territorial units change rarely but are consulted on
//! every run; callers keep one of these and check it before hitting the
//! provider. Entries expire after the configured TTL instead of living for
//! the whole process, so long-running mirrors do not serve stale partitions.

use std::sync::Arc;
use std::time::Duration;

use fauna_core::{Controller, Payload};

#[derive(Clone)]
pub struct ListCache {
    entries: moka::sync::Cache<(Controller, String), Arc<Payload>>,
}

impl ListCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: moka::sync::Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn get(&self, controller: Controller, key: &str) -> Option<Arc<Payload>> {
        self.entries.get(&(controller, key.to_string()))
    }

    pub fn insert(&self, controller: Controller, key: String, payload: Arc<Payload>) {
        self.entries.insert((controller, key), payload);
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }
}

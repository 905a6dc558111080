//! In-memory reference driver, used by tests and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fauna_core::Controller;
use uuid::Uuid;

use crate::driver::{DownloadLogEntry, IdentityRow, StoreDriver};
use crate::error::StoreError;

const FORMS_TABLE: &str = "forms_json";

#[derive(Default)]
pub struct MemoryDriver {
    records: Mutex<HashMap<(&'static str, i64, String), String>>,
    observations: Mutex<HashMap<(i64, String), (String, i64)>>,
    identities: Mutex<HashMap<(i64, String), IdentityRow>>,
    logs: Mutex<Vec<DownloadLogEntry>>,
    watermarks: Mutex<HashMap<(String, String), DateTime<Utc>>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observation(&self, id: i64, site: &str) -> Option<(String, i64)> {
        self.observations
            .lock()
            .expect("lock")
            .get(&(id, site.to_string()))
            .cloned()
    }

    pub fn observation_count(&self) -> usize {
        self.observations.lock().expect("lock").len()
    }

    pub fn record_count(&self, controller: Controller) -> usize {
        self.records
            .lock()
            .expect("lock")
            .keys()
            .filter(|(table, _, _)| *table == controller.table())
            .count()
    }

    pub fn form_count(&self) -> usize {
        self.records
            .lock()
            .expect("lock")
            .keys()
            .filter(|(table, _, _)| *table == FORMS_TABLE)
            .count()
    }

    pub fn record(&self, controller: Controller, id: i64, site: &str) -> Option<String> {
        self.records
            .lock()
            .expect("lock")
            .get(&(controller.table(), id, site.to_string()))
            .cloned()
    }

    pub fn identity(&self, id: i64, site: &str) -> Option<IdentityRow> {
        self.identities
            .lock()
            .expect("lock")
            .get(&(id, site.to_string()))
            .cloned()
    }

    pub fn log_entries(&self) -> Vec<DownloadLogEntry> {
        self.logs.lock().expect("lock").clone()
    }

    pub fn watermark_of(&self, site: &str, partition: &str) -> Option<DateTime<Utc>> {
        self.watermarks
            .lock()
            .expect("lock")
            .get(&(site.to_string(), partition.to_string()))
            .copied()
    }
}

#[async_trait]
impl StoreDriver for MemoryDriver {
    async fn upsert_record(
        &self,
        controller: Controller,
        id: i64,
        site: &str,
        item: &str,
    ) -> Result<(), StoreError> {
        self.records
            .lock()
            .expect("lock")
            .insert((controller.table(), id, site.to_string()), item.to_string());
        Ok(())
    }

    async fn upsert_observation(
        &self,
        id: i64,
        site: &str,
        item: &str,
        update_ts: i64,
    ) -> Result<(), StoreError> {
        self.observations
            .lock()
            .expect("lock")
            .insert((id, site.to_string()), (item.to_string(), update_ts));
        Ok(())
    }

    async fn upsert_form(&self, id: i64, site: &str, item: &str) -> Result<(), StoreError> {
        self.records
            .lock()
            .expect("lock")
            .insert((FORMS_TABLE, id, site.to_string()), item.to_string());
        Ok(())
    }

    async fn create_identity(
        &self,
        id: i64,
        site: &str,
        universal_id: &str,
    ) -> Result<bool, StoreError> {
        let mut identities = self.identities.lock().expect("lock");
        let key = (id, site.to_string());
        if identities.contains_key(&key) {
            return Ok(false);
        }
        identities.insert(
            key,
            IdentityRow {
                id,
                site: site.to_string(),
                universal_id: universal_id.to_string(),
                uuid: Uuid::new_v4(),
                alias: None,
                assigned_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn delete_observations(&self, site: &str, ids: &[i64]) -> Result<u64, StoreError> {
        let mut observations = self.observations.lock().expect("lock");
        let mut deleted = 0;
        for id in ids {
            if observations.remove(&(*id, site.to_string())).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn append_log(&self, entry: DownloadLogEntry) -> Result<(), StoreError> {
        self.logs.lock().expect("lock").push(entry);
        Ok(())
    }

    async fn watermark(
        &self,
        site: &str,
        partition: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.watermark_of(site, partition))
    }

    async fn set_watermark(
        &self,
        site: &str,
        partition: &str,
        ts: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.watermarks
            .lock()
            .expect("lock")
            .insert((site.to_string(), partition.to_string()), ts);
        Ok(())
    }
}

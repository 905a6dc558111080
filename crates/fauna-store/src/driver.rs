//! Physical row operations every backend must provide.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fauna_core::Controller;
use uuid::Uuid;

use crate::error::StoreError;

/// One append-only audit row, written after each fetch-and-store cycle.
#[derive(Debug, Clone)]
pub struct DownloadLogEntry {
    pub site: String,
    pub controller: Controller,
    pub error_count: u32,
    pub http_status: u16,
    pub comment: String,
    pub downloaded_at: DateTime<Utc>,
}

/// Identity cross-reference, created once per (id, site) and never updated.
#[derive(Debug, Clone)]
pub struct IdentityRow {
    pub id: i64,
    pub site: String,
    pub universal_id: String,
    pub uuid: Uuid,
    pub alias: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

/// Row-level backend interface.
///
/// Implementations must serialize conflicting upserts on the same (id, site)
/// key themselves; the worker pool enforces no mutual exclusion beyond the
/// identity-before-enqueue ordering.
#[async_trait]
pub trait StoreDriver: Send + Sync {
    /// Insert-if-absent-else-update for a plain or geometry entity.
    async fn upsert_record(
        &self,
        controller: Controller,
        id: i64,
        site: &str,
        item: &str,
    ) -> Result<(), StoreError>;

    /// Upsert one observation row together with its update timestamp.
    async fn upsert_observation(
        &self,
        id: i64,
        site: &str,
        item: &str,
        update_ts: i64,
    ) -> Result<(), StoreError>;

    /// Upsert one form row.
    async fn upsert_form(&self, id: i64, site: &str, item: &str) -> Result<(), StoreError>;

    /// Create the identity row for (id, site) unless it already exists.
    /// Returns true when a new identity was assigned.
    async fn create_identity(
        &self,
        id: i64,
        site: &str,
        universal_id: &str,
    ) -> Result<bool, StoreError>;

    /// Batch-delete observations of one site; returns the number of rows
    /// actually removed.
    async fn delete_observations(&self, site: &str, ids: &[i64]) -> Result<u64, StoreError>;

    /// Append one audit entry.
    async fn append_log(&self, entry: DownloadLogEntry) -> Result<(), StoreError>;

    /// Last confirmed sync timestamp for (site, partition), if any.
    async fn watermark(
        &self,
        site: &str,
        partition: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Create or overwrite the watermark for (site, partition).
    async fn set_watermark(
        &self,
        site: &str,
        partition: &str,
        ts: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

//! Postgres driver over sqlx.
//!
//! Upserts go through `INSERT ... ON CONFLICT`, which makes the database
//! serialize conflicting writes on one (id, site) key; that is the
//! serialization the worker pool relies on. Table provisioning (DDL, roles,
//! schemas) is deployment territory and assumed done.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fauna_core::Controller;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::driver::{DownloadLogEntry, StoreDriver};
use crate::error::StoreError;

pub struct PgDriver {
    pool: PgPool,
}

impl PgDriver {
    /// Connect with one pooled connection per worker plus one for the
    /// synchronous control path.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(2))
            .connect(database_url)
            .await?;
        tracing::info!(max_connections, "connected to database");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StoreDriver for PgDriver {
    async fn upsert_record(
        &self,
        controller: Controller,
        id: i64,
        site: &str,
        item: &str,
    ) -> Result<(), StoreError> {
        // Table names come from the closed controller enum, never from input.
        let sql = format!(
            "INSERT INTO {} (id, site, item) VALUES ($1, $2, $3::jsonb) \
             ON CONFLICT (id, site) DO UPDATE SET item = EXCLUDED.item",
            controller.table()
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(site)
            .bind(item)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_observation(
        &self,
        id: i64,
        site: &str,
        item: &str,
        update_ts: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO observations_json (id, site, item, update_ts) \
             VALUES ($1, $2, $3::jsonb, $4) \
             ON CONFLICT (id, site) DO UPDATE \
             SET item = EXCLUDED.item, update_ts = EXCLUDED.update_ts",
        )
        .bind(id)
        .bind(site)
        .bind(item)
        .bind(update_ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_form(&self, id: i64, site: &str, item: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO forms_json (id, site, item) VALUES ($1, $2, $3::jsonb) \
             ON CONFLICT (id, site) DO UPDATE SET item = EXCLUDED.item",
        )
        .bind(id)
        .bind(site)
        .bind(item)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_identity(
        &self,
        id: i64,
        site: &str,
        universal_id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO uuid_xref (id, site, universal_id, uuid, assigned_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id, site) DO NOTHING",
        )
        .bind(id)
        .bind(site)
        .bind(universal_id)
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_observations(&self, site: &str, ids: &[i64]) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM observations_json WHERE site = $1 AND id = ANY($2)")
            .bind(site)
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn append_log(&self, entry: DownloadLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO download_log (site, controller, error_count, http_status, comment, download_ts) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&entry.site)
        .bind(entry.controller.path())
        .bind(entry.error_count as i32)
        .bind(entry.http_status as i32)
        .bind(&entry.comment)
        .bind(entry.downloaded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn watermark(
        &self,
        site: &str,
        partition: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT last_ts FROM increment_log WHERE site = $1 AND taxo_group = $2")
                .bind(site)
                .bind(partition)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(ts,)| ts))
    }

    async fn set_watermark(
        &self,
        site: &str,
        partition: &str,
        ts: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO increment_log (site, taxo_group, last_ts) VALUES ($1, $2, $3) \
             ON CONFLICT (site, taxo_group) DO UPDATE SET last_ts = EXCLUDED.last_ts",
        )
        .bind(site)
        .bind(partition)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

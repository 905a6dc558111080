//! The store facade the sync layer consumes.
//!
//! Dispatches each merged payload to the storage path matching its
//! controller: plain entities inline, geometry entities inline after
//! reprojection, observations through the worker pool with identity
//! assignment up front.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fauna_core::{
    Controller, FormRecord, GeometryRecord, Observation, Payload, SimpleRecord, StorageKind,
};
use tokio::sync::Mutex;

use crate::driver::{DownloadLogEntry, StoreDriver};
use crate::error::StoreError;
use crate::pipeline::ObservationPipeline;
use crate::reproject::{Reprojector, LAMBERT_93, WGS84};

/// Storage configuration for one mirror site.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub site: String,
    pub workers: usize,
    pub queue_capacity: usize,
    pub source_proj: String,
    pub target_proj: String,
}

impl StoreConfig {
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            workers: 4,
            queue_capacity: 100_000,
            source_proj: WGS84.to_string(),
            target_proj: LAMBERT_93.to_string(),
        }
    }
}

pub struct MirrorStore {
    site: String,
    driver: Arc<dyn StoreDriver>,
    reprojector: Arc<Reprojector>,
    pipeline: Mutex<Option<ObservationPipeline>>,
}

impl MirrorStore {
    pub fn new(driver: Arc<dyn StoreDriver>, config: &StoreConfig) -> Result<Self, StoreError> {
        let reprojector = Arc::new(Reprojector::new(&config.source_proj, &config.target_proj)?);
        let pipeline = ObservationPipeline::spawn(
            Arc::clone(&driver),
            Arc::clone(&reprojector),
            config.workers,
            config.queue_capacity,
        );
        Ok(Self {
            site: config.site.clone(),
            driver,
            reprojector,
            pipeline: Mutex::new(Some(pipeline)),
        })
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    /// Persist one merged payload; returns the number of records handled.
    ///
    /// `seq` tags the position of this payload within a larger stream
    /// (partition/window/species) for tracing.
    pub async fn store(
        &self,
        controller: Controller,
        seq: &str,
        payload: &Payload,
    ) -> Result<usize, StoreError> {
        tracing::debug!(%controller, seq, items = payload.len(), "storing payload");
        match controller.storage_kind() {
            StorageKind::Simple => self.store_simple(controller, payload).await,
            StorageKind::Geometry => self.store_geometry(controller, payload).await,
            StorageKind::Observation => self.store_observations(payload).await,
        }
    }

    async fn store_simple(
        &self,
        controller: Controller,
        payload: &Payload,
    ) -> Result<usize, StoreError> {
        let mut count = 0;
        for item in payload.records() {
            let record = SimpleRecord::from_json(item.clone())?;
            self.driver
                .upsert_record(controller, record.id, &self.site, &record.raw().to_string())
                .await?;
            count += 1;
        }
        tracing::info!(%controller, count, site = %self.site, "stored entities");
        Ok(count)
    }

    async fn store_geometry(
        &self,
        controller: Controller,
        payload: &Payload,
    ) -> Result<usize, StoreError> {
        let mut count = 0;
        for item in payload.records() {
            let mut record = GeometryRecord::from_json(item.clone())?;
            if let Some((lon, lat)) = record.coord {
                let (x, y) = self.reprojector.project(lon, lat)?;
                record.set_local_coord(x, y);
            }
            self.driver
                .upsert_record(controller, record.id, &self.site, &record.raw().to_string())
                .await?;
            count += 1;
        }
        tracing::info!(%controller, count, site = %self.site, "stored geometry entities");
        Ok(count)
    }

    async fn store_observations(&self, payload: &Payload) -> Result<usize, StoreError> {
        let Payload::Observations { sightings, forms } = payload else {
            tracing::warn!("observation payload without a sightings envelope, nothing stored");
            return Ok(0);
        };

        let mut count = 0;
        for sighting in sightings {
            let record = Observation::from_json(sighting.clone())?;
            // The identity row must exist before the write task is queued;
            // workers never race the creation step for the same key.
            self.driver
                .create_identity(record.id_sighting, &self.site, &record.id_universal)
                .await?;
            self.submit(record).await?;
            count += 1;
        }

        for form in forms {
            let mut form_record = FormRecord::from_json(form.clone())?;
            for sighting in form_record.take_sightings() {
                let record = Observation::from_json(sighting)?;
                self.submit(record).await?;
                count += 1;
            }
            self.store_form(form_record).await?;
        }

        tracing::debug!(count, site = %self.site, "queued observations for persistence");
        Ok(count)
    }

    async fn submit(&self, record: Observation) -> Result<(), StoreError> {
        let guard = self.pipeline.lock().await;
        let pipeline = guard.as_ref().ok_or(StoreError::PipelineClosed)?;
        pipeline.submit(self.site.clone(), record).await
    }

    async fn store_form(&self, mut record: FormRecord) -> Result<(), StoreError> {
        if let Some((lon, lat)) = record.coord {
            let (x, y) = self.reprojector.project(lon, lat)?;
            record.set_local_coord(x, y);
        }
        self.driver
            .upsert_form(record.id, &self.site, &record.raw().to_string())
            .await
    }

    /// Append one audit entry for a completed fetch-and-store cycle.
    pub async fn log(
        &self,
        controller: Controller,
        error_count: u32,
        http_status: u16,
        comment: &str,
    ) -> Result<(), StoreError> {
        self.driver
            .append_log(DownloadLogEntry {
                site: self.site.clone(),
                controller,
                error_count,
                http_status,
                comment: comment.to_string(),
                downloaded_at: Utc::now(),
            })
            .await
    }

    pub async fn watermark(&self, partition: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.driver.watermark(&self.site, partition).await
    }

    pub async fn set_watermark(
        &self,
        partition: &str,
        ts: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.driver.set_watermark(&self.site, partition, ts).await
    }

    /// Batch-delete observations of this site.
    pub async fn delete_observations(&self, ids: &[i64]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        tracing::info!(count = ids.len(), site = %self.site, "deleting observations");
        self.driver.delete_observations(&self.site, ids).await
    }

    /// Drain queued writes and stop the worker pool. Call before dropping
    /// the store, or queued work is lost.
    pub async fn close(&self) {
        let pipeline = self.pipeline.lock().await.take();
        if let Some(pipeline) = pipeline {
            pipeline.shutdown().await;
        }
    }
}

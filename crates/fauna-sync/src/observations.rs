//! Observation ingestion: full backfills and incremental differential sync.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use fauna_client::{ApiClient, ModificationFilter, ObservationsClient};
use fauna_core::{Controller, DiffEntry, ModificationKind, SpeciesEntry};
use fauna_store::MirrorStore;

use crate::downloader::PartitionDirectory;
use crate::error::SyncError;
use crate::regulator::{RegulatorConfig, WindowRegulator};

/// Search bodies carry provider-format dates.
const DATE_FORMAT: &str = "%d.%m.%Y";

/// How a full backfill walks the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillMethod {
    /// Windowed search walking backward from now, throughput-regulated.
    Search,
    /// Straight list per partition, optionally exploded by species.
    List { by_species: bool },
}

/// Summary of a multi-partition run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOutcome {
    pub partitions_ok: usize,
    pub partitions_skipped: usize,
    pub partitions_failed: usize,
    pub records: usize,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        self.partitions_failed == 0
    }
}

pub struct ObservationSync {
    client: ObservationsClient,
    species: ApiClient,
    partitions: PartitionDirectory,
    store: Arc<MirrorStore>,
    regulator: RegulatorConfig,
    short_version: String,
}

impl ObservationSync {
    pub fn new(
        client: ObservationsClient,
        species: ApiClient,
        partitions: PartitionDirectory,
        store: Arc<MirrorStore>,
        regulator: RegulatorConfig,
    ) -> Self {
        Self {
            client,
            species,
            partitions,
            store,
            regulator,
            short_version: "1".to_string(),
        }
    }

    /// The provider has no data before this date; window walks stop here.
    fn backfill_floor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1901, 1, 1, 0, 0, 0)
            .single()
            .expect("fixed epoch floor is valid")
    }

    fn opt_params(&self) -> Vec<(String, String)> {
        vec![("short_version".to_string(), self.short_version.clone())]
    }

    async fn resolve_partitions(
        &mut self,
        requested: Option<&[String]>,
    ) -> Result<Vec<String>, SyncError> {
        match requested {
            Some(ids) => Ok(ids.to_vec()),
            None => Ok(self
                .partitions
                .active()
                .await?
                .into_iter()
                .map(|group| group.id)
                .collect()),
        }
    }

    /// Full backfill across partitions. A failing partition is logged with
    /// its HTTP status and does not stop its siblings.
    pub async fn backfill(
        &mut self,
        requested: Option<&[String]>,
        method: BackfillMethod,
    ) -> Result<SyncOutcome, SyncError> {
        let partitions = self.resolve_partitions(requested).await?;
        let mut outcome = SyncOutcome::default();
        for partition in &partitions {
            let result = match method {
                BackfillMethod::Search => self.backfill_search(partition).await,
                BackfillMethod::List { by_species } => {
                    self.backfill_list(partition, by_species).await
                }
            };
            match result {
                Ok(count) => {
                    outcome.partitions_ok += 1;
                    outcome.records += count;
                }
                Err(err) => {
                    outcome.partitions_failed += 1;
                    self.log_partition_failure(partition, &err).await?;
                }
            }
        }
        Ok(outcome)
    }

    /// Incremental sync: apply provider-reported updates and deletions since
    /// the recorded watermark (or an explicit `since`).
    pub async fn incremental(
        &mut self,
        requested: Option<&[String]>,
        since: Option<DateTime<Utc>>,
    ) -> Result<SyncOutcome, SyncError> {
        let partitions = self.resolve_partitions(requested).await?;
        let mut outcome = SyncOutcome::default();
        for partition in &partitions {
            match self.incremental_partition(partition, since).await {
                Ok(Some(count)) => {
                    outcome.partitions_ok += 1;
                    outcome.records += count;
                }
                Ok(None) => {
                    // Never fall back to a full backfill on a missing
                    // watermark; that is an explicit operator decision.
                    tracing::warn!(
                        partition = %partition,
                        "no watermark recorded, skipping incremental sync"
                    );
                    outcome.partitions_skipped += 1;
                }
                Err(err) => {
                    outcome.partitions_failed += 1;
                    self.log_partition_failure(partition, &err).await?;
                }
            }
        }
        Ok(outcome)
    }

    async fn log_partition_failure(
        &mut self,
        partition: &str,
        err: &SyncError,
    ) -> Result<(), SyncError> {
        let session = self.client.session();
        tracing::error!(
            partition = %partition,
            %err,
            status = session.last_status,
            "partition sync failed"
        );
        self.store
            .log(
                Controller::Observations,
                session.transfer_errors,
                session.last_status,
                &format!("partition {partition} failed: {err}"),
            )
            .await?;
        Ok(())
    }

    /// Windowed search walking backward from now toward the epoch floor,
    /// window size steered by the regulator.
    async fn backfill_search(&mut self, partition: &str) -> Result<usize, SyncError> {
        self.store.set_watermark(partition, Utc::now()).await?;
        let floor = Self::backfill_floor();
        let mut regulator = WindowRegulator::new(self.regulator);
        let mut window_days = regulator.window_days();
        let mut end = Utc::now();
        let mut seq = 1u32;
        let mut total = 0usize;

        loop {
            let start = end - chrono::Duration::days(window_days as i64);
            let query = serde_json::json!({
                "period_choice": "range",
                "date_from": start.format(DATE_FORMAT).to_string(),
                "date_to": end.format(DATE_FORMAT).to_string(),
                "species_choice": "all",
                "taxonomic_group": partition,
            });
            let payload = self.client.search(Some(&query), &self.opt_params()).await?;
            let session = self.client.session();
            self.store
                .log(
                    Controller::Observations,
                    session.transfer_errors,
                    session.last_status,
                    "",
                )
                .await?;
            let stored = self
                .store
                .store(Controller::Observations, &format!("{partition}_{seq}"), &payload)
                .await?;
            tracing::info!(
                iteration = seq,
                records = stored,
                partition = %partition,
                from = %start.format(DATE_FORMAT),
                days = window_days as i64,
                "backfill window stored"
            );
            total += stored;
            seq += 1;
            end = start;
            window_days = regulator.update(stored);
            if start <= floor {
                break;
            }
        }
        Ok(total)
    }

    /// Straight list backfill, optionally one call per species in use.
    async fn backfill_list(&mut self, partition: &str, by_species: bool) -> Result<usize, SyncError> {
        self.store.set_watermark(partition, Utc::now()).await?;
        tracing::info!(partition = %partition, by_species, "listing observations");
        let mut total = 0;
        if by_species {
            for species in self.species_of(partition).await? {
                if !species.in_use() {
                    continue;
                }
                tracing::info!(partition = %partition, species = %species.id, "listing species observations");
                let mut params = self.opt_params();
                params.push(("id_species".to_string(), species.id.clone()));
                let payload = self.client.list(partition, &params).await?;
                let session = self.client.session();
                self.store
                    .log(
                        Controller::Observations,
                        session.transfer_errors,
                        session.last_status,
                        &format!("observations of partition {partition}, species {}", species.id),
                    )
                    .await?;
                total += self
                    .store
                    .store(
                        Controller::Observations,
                        &format!("{partition}_{}", species.id),
                        &payload,
                    )
                    .await?;
            }
        } else {
            let payload = self.client.list(partition, &self.opt_params()).await?;
            let session = self.client.session();
            self.store
                .log(
                    Controller::Observations,
                    session.transfer_errors,
                    session.last_status,
                    "",
                )
                .await?;
            total += self
                .store
                .store(Controller::Observations, &format!("{partition}_1"), &payload)
                .await?;
        }
        Ok(total)
    }

    async fn species_of(&mut self, partition: &str) -> Result<Vec<SpeciesEntry>, SyncError> {
        let payload = self
            .species
            .list(&[("id_taxo_group".to_string(), partition.to_string())])
            .await?;
        payload
            .records()
            .iter()
            .map(|item| serde_json::from_value(item.clone()).map_err(SyncError::from))
            .collect()
    }

    /// One partition's incremental pass. `Ok(None)` means no watermark and
    /// no explicit `since`, so the partition was skipped.
    async fn incremental_partition(
        &mut self,
        partition: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<usize>, SyncError> {
        let since = match since {
            Some(ts) => ts,
            None => match self.store.watermark(partition).await? {
                Some(ts) => ts,
                None => return Ok(None),
            },
        };

        // The watermark advances before the differential is applied. A crash
        // past this point replays on the next run at worst (upserts are
        // idempotent) but can lose this window's changes; see DESIGN.md.
        self.store.set_watermark(partition, Utc::now()).await?;
        tracing::info!(partition = %partition, since = %since, "fetching changes");
        let payload = self
            .client
            .diff(partition, since, ModificationFilter::All)
            .await?;

        // Classify everything before storing anything: an unknown marker
        // must abort the response, not half-apply it.
        let mut updated = Vec::new();
        let mut deleted = Vec::new();
        for item in payload.records() {
            let entry = DiffEntry::from_json(item)?;
            match entry.modification {
                ModificationKind::Updated => updated.push(entry.id_sighting),
                ModificationKind::Deleted => deleted.push(entry.id_sighting),
            }
        }
        tracing::info!(
            updated = updated.len(),
            deleted = deleted.len(),
            partition = %partition,
            "classified changes"
        );

        let mut count = 0;
        for id in &updated {
            tracing::debug!(id, "fetching updated observation");
            let payload = self.client.get(*id, &self.opt_params()).await?;
            let session = self.client.session();
            self.store
                .log(
                    Controller::Observations,
                    session.transfer_errors,
                    session.last_status,
                    "",
                )
                .await?;
            count += self
                .store
                .store(Controller::Observations, &format!("{partition}_1"), &payload)
                .await?;
        }
        if !deleted.is_empty() {
            self.store.delete_observations(&deleted).await?;
        }
        Ok(Some(count))
    }
}

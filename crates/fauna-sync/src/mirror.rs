//! One configured mirror: clients, store and the sync entry points.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fauna_client::{
    ApiClient, HmacSigner, HttpTransport, ListCache, ObservationsClient, Transport,
};
use fauna_core::Controller;
use fauna_store::{MirrorStore, PgDriver, StoreDriver};

use crate::config::MirrorConfig;
use crate::downloader::{ControllerSync, PartitionDirectory};
use crate::error::SyncError;
use crate::observations::{BackfillMethod, ObservationSync, SyncOutcome};
use crate::regulator::RegulatorConfig;

pub struct Mirror {
    config: MirrorConfig,
    store: Arc<MirrorStore>,
    transport: Arc<dyn Transport>,
    cache: ListCache,
}

impl Mirror {
    /// Wire the production stack: signed HTTP transport and the Postgres
    /// driver, with one pooled connection per worker plus the control path.
    pub async fn connect(config: MirrorConfig) -> Result<Self> {
        let driver = PgDriver::connect(&config.database_url, config.workers as u32 + 1)
            .await
            .context("connecting to the mirror database")?;
        Self::new(config, Arc::new(driver))
    }

    /// Assemble a mirror over an arbitrary driver (used by tests and dry
    /// runs with the in-memory driver).
    pub fn new(config: MirrorConfig, driver: Arc<dyn StoreDriver>) -> Result<Self> {
        let signer = Arc::new(HmacSigner::new(
            config.client_key.clone(),
            config.client_secret.clone(),
        ));
        let transport: Arc<dyn Transport> = Arc::new(
            HttpTransport::new(&config.base_url, signer)
                .context("building the provider transport")?,
        );
        Self::with_transport(config, driver, transport)
    }

    pub fn with_transport(
        config: MirrorConfig,
        driver: Arc<dyn StoreDriver>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let store = Arc::new(
            MirrorStore::new(driver, &config.store_config())
                .context("building the mirror store")?,
        );
        let cache = ListCache::new(config.list_cache_capacity, config.list_cache_ttl());
        Ok(Self {
            config,
            store,
            transport,
            cache,
        })
    }

    pub fn site(&self) -> &str {
        self.store.site()
    }

    fn api_client(&self, controller: Controller) -> ApiClient {
        ApiClient::new(
            Arc::clone(&self.transport),
            self.config.credentials(),
            controller,
            self.config.fetch_limits(),
        )
    }

    fn directory(&self) -> PartitionDirectory {
        PartitionDirectory::new(self.api_client(Controller::TaxoGroups), self.cache.clone())
    }

    fn observation_sync(&self) -> ObservationSync {
        ObservationSync::new(
            ObservationsClient::new(
                Arc::clone(&self.transport),
                self.config.credentials(),
                self.config.fetch_limits(),
            ),
            self.api_client(Controller::Species),
            self.directory(),
            Arc::clone(&self.store),
            RegulatorConfig::default(),
        )
    }

    /// Mirror every reference controller (everything but observations).
    /// Controllers fail independently, like partitions do.
    pub async fn sync_tables(&self) -> Result<SyncOutcome> {
        let mut outcome = SyncOutcome::default();
        for controller in Controller::ALL {
            if controller == Controller::Observations {
                continue;
            }
            match self.sync_table(controller).await {
                Ok(count) => {
                    outcome.partitions_ok += 1;
                    outcome.records += count;
                }
                // Already logged with its session counters by sync_table.
                Err(_) => outcome.partitions_failed += 1,
            }
        }
        Ok(outcome)
    }

    async fn sync_table(&self, controller: Controller) -> Result<usize, SyncError> {
        let mut downloader = ControllerSync::new(self.api_client(controller), Arc::clone(&self.store));
        let result = match controller {
            // Species listing is partitioned; restricted groups are skipped.
            Controller::Species => {
                let groups = self.directory().active().await?;
                let sets: Vec<Vec<(String, String)>> = groups
                    .iter()
                    .map(|group| vec![("id_taxo_group".to_string(), group.id.clone())])
                    .collect();
                downloader.run(&sets).await
            }
            _ => downloader.run(&[]).await,
        };
        if let Err(err) = &result {
            let session = downloader.session();
            tracing::error!(%controller, %err, status = session.last_status, "controller sync failed");
            self.store
                .log(
                    controller,
                    session.transfer_errors,
                    session.last_status,
                    &format!("controller sync failed: {err}"),
                )
                .await?;
        }
        result
    }

    /// Full observation backfill.
    pub async fn backfill_observations(
        &self,
        partitions: Option<&[String]>,
        method: BackfillMethod,
    ) -> Result<SyncOutcome> {
        let mut sync = self.observation_sync();
        Ok(sync.backfill(partitions, method).await?)
    }

    /// Incremental observation sync since the stored watermarks.
    pub async fn update_observations(
        &self,
        partitions: Option<&[String]>,
        since: Option<DateTime<Utc>>,
    ) -> Result<SyncOutcome> {
        let mut sync = self.observation_sync();
        Ok(sync.incremental(partitions, since).await?)
    }

    /// Drain the worker pool; call once at the end of a run.
    pub async fn close(&self) {
        self.store.close().await;
    }
}

//! Plain-controller downloaders and the partition directory.

use std::sync::Arc;

use fauna_client::{ApiClient, ListCache};
use fauna_core::{Controller, TaxoGroup};
use fauna_store::MirrorStore;

use crate::error::SyncError;

/// Downloads one plain controller and stores its merged payloads: one fetch,
/// one audit log entry and one store call per parameter set.
pub struct ControllerSync {
    client: ApiClient,
    store: Arc<MirrorStore>,
}

impl ControllerSync {
    pub fn new(client: ApiClient, store: Arc<MirrorStore>) -> Self {
        Self { client, store }
    }

    pub fn controller(&self) -> Controller {
        self.client.controller()
    }

    /// Transfer counters of the underlying client, for audit logging.
    pub fn session(&self) -> fauna_client::SessionState {
        self.client.session()
    }

    /// Fetch and persist once per parameter set; an empty slice means one
    /// plain list call.
    pub async fn run(&mut self, param_sets: &[Vec<(String, String)>]) -> Result<usize, SyncError> {
        let plain = [Vec::new()];
        let sets: &[Vec<(String, String)>] = if param_sets.is_empty() {
            &plain
        } else {
            param_sets
        };

        let mut total = 0;
        for (iteration, params) in sets.iter().enumerate() {
            tracing::debug!(
                controller = %self.controller(),
                iteration = iteration + 1,
                "fetching controller page set"
            );
            let payload = self.client.list(params).await?;
            let session = self.client.session();
            self.store
                .log(
                    self.controller(),
                    session.transfer_errors,
                    session.last_status,
                    "",
                )
                .await?;
            total += self
                .store
                .store(self.controller(), &(iteration + 1).to_string(), &payload)
                .await?;
        }
        Ok(total)
    }
}

/// Resolves the partition list, serving repeats from the bounded cache.
pub struct PartitionDirectory {
    client: ApiClient,
    cache: ListCache,
}

impl PartitionDirectory {
    pub fn new(client: ApiClient, cache: ListCache) -> Self {
        Self { client, cache }
    }

    pub async fn all(&mut self) -> Result<Vec<TaxoGroup>, SyncError> {
        let payload = match self.cache.get(Controller::TaxoGroups, "") {
            Some(hit) => hit,
            None => {
                let fresh = Arc::new(self.client.list(&[]).await?);
                self.cache
                    .insert(Controller::TaxoGroups, String::new(), Arc::clone(&fresh));
                fresh
            }
        };
        payload
            .records()
            .iter()
            .map(|item| serde_json::from_value(item.clone()).map_err(SyncError::from))
            .collect()
    }

    /// Partitions whose access mode allows downloads.
    pub async fn active(&mut self) -> Result<Vec<TaxoGroup>, SyncError> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(TaxoGroup::is_active)
            .collect())
    }
}

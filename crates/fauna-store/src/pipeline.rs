//! Worker pool for observation persistence.
//!
//! A fixed pool of workers drains one bounded queue. Submission applies
//! backpressure when the queue is full; shutdown waits for the queue to
//! drain, then hands every worker a sentinel and joins it, so no queued
//! write is ever dropped.

use std::sync::Arc;
use std::time::Duration;

use fauna_core::Observation;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::driver::StoreDriver;
use crate::error::StoreError;
use crate::reproject::Reprojector;

enum WriteTask {
    Record { site: String, record: Observation },
    /// Poison pill; exactly one per worker at shutdown.
    Shutdown,
}

pub struct ObservationPipeline {
    tx: mpsc::Sender<WriteTask>,
    workers: Vec<JoinHandle<()>>,
}

impl ObservationPipeline {
    pub fn spawn(
        driver: Arc<dyn StoreDriver>,
        reprojector: Arc<Reprojector>,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..workers.max(1))
            .map(|index| {
                tokio::spawn(observation_worker(
                    index,
                    Arc::clone(&rx),
                    Arc::clone(&driver),
                    Arc::clone(&reprojector),
                ))
            })
            .collect();
        Self {
            tx,
            workers: handles,
        }
    }

    /// Queue one observation write; blocks when the queue is full.
    pub async fn submit(&self, site: String, record: Observation) -> Result<(), StoreError> {
        self.tx
            .send(WriteTask::Record { site, record })
            .await
            .map_err(|_| StoreError::PipelineClosed)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Wait until the queue reports empty, then stop every worker.
    ///
    /// Sentinels go out only after the drain: they queue behind any
    /// remaining tasks, and joining the workers afterwards guarantees all
    /// in-flight writes finished before the owner releases its store.
    pub async fn shutdown(self) {
        while self.tx.capacity() < self.tx.max_capacity() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        for _ in 0..self.workers.len() {
            if self.tx.send(WriteTask::Shutdown).await.is_err() {
                break;
            }
        }
        drop(self.tx);
        for handle in self.workers {
            if let Err(err) = handle.await {
                tracing::error!(%err, "observation worker panicked");
            }
        }
    }
}

async fn observation_worker(
    index: usize,
    rx: Arc<Mutex<mpsc::Receiver<WriteTask>>>,
    driver: Arc<dyn StoreDriver>,
    reprojector: Arc<Reprojector>,
) {
    loop {
        let task = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };
        match task {
            None | Some(WriteTask::Shutdown) => break,
            Some(WriteTask::Record { site, record }) => {
                let id = record.id_sighting;
                if let Err(err) =
                    persist_observation(driver.as_ref(), &reprojector, &site, record).await
                {
                    tracing::error!(worker = index, id, %err, "failed to persist observation");
                }
            }
        }
    }
    tracing::debug!(worker = index, "observation worker stopped");
}

/// Reproject, resolve the last-modified timestamp and upsert one row.
async fn persist_observation(
    driver: &dyn StoreDriver,
    reprojector: &Reprojector,
    site: &str,
    mut record: Observation,
) -> Result<(), StoreError> {
    if let Some((lon, lat)) = record.coord {
        let (x, y) = reprojector.project(lon, lat)?;
        record.set_local_coord(x, y);
    }
    let update_ts = record.last_modified().unwrap_or_default();
    let item = record.raw().to_string();
    driver
        .upsert_observation(record.id_sighting, site, &item, update_ts)
        .await
}

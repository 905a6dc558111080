//! Sync orchestration: decides, per partition, between full backfills and
//! incremental differential syncs, and drives fetch results into the store.

pub mod config;
pub mod downloader;
pub mod error;
pub mod mirror;
pub mod observations;
pub mod regulator;

pub use config::MirrorConfig;
pub use downloader::{ControllerSync, PartitionDirectory};
pub use error::SyncError;
pub use mirror::Mirror;
pub use observations::{BackfillMethod, ObservationSync, SyncOutcome};
pub use regulator::{RegulatorConfig, WindowRegulator};

pub const CRATE_NAME: &str = "fauna-sync";

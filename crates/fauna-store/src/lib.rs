//! Persistence for fetched provider data: the store facade the sync layer
//! talks to, the physical row drivers behind it, and the worker pool that
//! fans observation writes out.

pub mod driver;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod postgres;
pub mod reproject;
pub mod store;

pub use driver::{DownloadLogEntry, IdentityRow, StoreDriver};
pub use error::StoreError;
pub use memory::MemoryDriver;
pub use pipeline::ObservationPipeline;
pub use postgres::PgDriver;
pub use reproject::{Reprojector, LAMBERT_93, WGS84};
pub use store::{MirrorStore, StoreConfig};

pub const CRATE_NAME: &str = "fauna-store";

//! Core domain model for the fauna mirror: controllers, typed provider
//! records and merged response payloads.

pub mod controller;
pub mod payload;
pub mod record;

pub use controller::{Controller, StorageKind};
pub use payload::Payload;
pub use record::{
    DiffEntry, FormRecord, GeometryRecord, ModificationKind, Observation, RecordError,
    SimpleRecord, SpeciesEntry, TaxoGroup,
};

pub const CRATE_NAME: &str = "fauna-core";

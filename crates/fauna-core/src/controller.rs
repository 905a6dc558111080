//! The closed set of remote resource collections the provider exposes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named remote resource collection (observations, species, places, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    Entities,
    Fields,
    LocalAdminUnits,
    Observations,
    Observers,
    Places,
    Species,
    TaxoGroups,
    TerritorialUnits,
}

/// Which storage path handles rows of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Plain entities, upserted inline.
    Simple,
    /// Entities carrying coordinates, reprojected before the inline upsert.
    Geometry,
    /// Observations, fanned out to the worker pool.
    Observation,
}

impl Controller {
    pub const ALL: [Controller; 9] = [
        Controller::Entities,
        Controller::Fields,
        Controller::LocalAdminUnits,
        Controller::Observations,
        Controller::Observers,
        Controller::Places,
        Controller::Species,
        Controller::TaxoGroups,
        Controller::TerritorialUnits,
    ];

    /// URL path segment of the controller under `<base>/api/`.
    pub fn path(&self) -> &'static str {
        match self {
            Controller::Entities => "entities",
            Controller::Fields => "fields",
            Controller::LocalAdminUnits => "local_admin_units",
            Controller::Observations => "observations",
            Controller::Observers => "observers",
            Controller::Places => "places",
            Controller::Species => "species",
            Controller::TaxoGroups => "taxo_groups",
            Controller::TerritorialUnits => "territorial_units",
        }
    }

    /// Row-store table holding this controller's entities.
    pub fn table(&self) -> &'static str {
        match self {
            Controller::Entities => "entities_json",
            Controller::Fields => "fields_json",
            Controller::LocalAdminUnits => "local_admin_units_json",
            Controller::Observations => "observations_json",
            Controller::Observers => "observers_json",
            Controller::Places => "places_json",
            Controller::Species => "species_json",
            Controller::TaxoGroups => "taxo_groups_json",
            Controller::TerritorialUnits => "territorial_units_json",
        }
    }

    /// Storage dispatch is a closed decision: adding a controller forces a
    /// choice here at compile time.
    pub fn storage_kind(&self) -> StorageKind {
        match self {
            Controller::Entities => StorageKind::Simple,
            Controller::Fields => StorageKind::Simple,
            Controller::LocalAdminUnits => StorageKind::Geometry,
            Controller::Observations => StorageKind::Observation,
            Controller::Observers => StorageKind::Simple,
            Controller::Places => StorageKind::Geometry,
            Controller::Species => StorageKind::Simple,
            Controller::TaxoGroups => StorageKind::Simple,
            Controller::TerritorialUnits => StorageKind::Simple,
        }
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

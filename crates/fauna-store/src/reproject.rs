//! Coordinate reprojection from the provider's WGS84 into the locally
//! configured projection.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::StoreError;

/// Provider-side geographic coordinates.
pub const WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Default local projection (Lambert-93, meters).
pub const LAMBERT_93: &str = "+proj=lcc +lat_1=49 +lat_2=44 +lat_0=46.5 +lon_0=3 \
     +x_0=700000 +y_0=6600000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs";

pub struct Reprojector {
    source: Proj,
    target: Proj,
}

impl Reprojector {
    /// Build from proj-string definitions.
    pub fn new(source: &str, target: &str) -> Result<Self, StoreError> {
        Ok(Self {
            source: Proj::from_proj_string(source)?,
            target: Proj::from_proj_string(target)?,
        })
    }

    pub fn lambert93() -> Result<Self, StoreError> {
        Self::new(WGS84, LAMBERT_93)
    }

    /// Project one lon/lat pair into target coordinates.
    pub fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), StoreError> {
        // Geographic projections work in radians.
        let mut point = if self.source.is_latlong() {
            (lon.to_radians(), lat.to_radians(), 0.0)
        } else {
            (lon, lat, 0.0)
        };
        transform(&self.source, &self.target, &mut point)?;
        if self.target.is_latlong() {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

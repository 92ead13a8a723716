//! Coordinate Reference System handling
//!
//! Imagery catalogs describe projections through the STAC projection
//! extension (`proj:epsg`), so a CRS here is an EPSG code. Only WGS84 and the
//! UTM zones (EPSG 326xx / 327xx) can be reprojected into; that covers
//! Sentinel-2 and Landsat products.

mod reproject;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use reproject::{reproject_point, wgs84_to_utm};

/// Coordinate Reference System identified by its EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CRS {
    epsg: u32,
}

/// The projection family of a [`CRS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    /// Longitude/latitude in degrees (EPSG:4326)
    Geographic,
    /// Universal Transverse Mercator, metres
    Utm { zone: u32, north: bool },
    /// Anything else; coordinates are taken as-is
    Unsupported,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// UTM zone CRS (EPSG 326xx north, 327xx south)
    pub fn utm(zone: u32, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        Self::from_epsg(base + zone)
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Classify the projection.
    ///
    /// - EPSG 4326 → geographic
    /// - EPSG 32601..=32660 → UTM north, 32701..=32760 → UTM south
    pub fn kind(&self) -> CrsKind {
        match self.epsg {
            4326 => CrsKind::Geographic,
            code @ 32601..=32660 => CrsKind::Utm {
                zone: code - 32600,
                north: true,
            },
            code @ 32701..=32760 => CrsKind::Utm {
                zone: code - 32700,
                north: false,
            },
            _ => CrsKind::Unsupported,
        }
    }

    /// Whether coordinates are in degrees rather than metres
    pub fn is_geographic(&self) -> bool {
        self.kind() == CrsKind::Geographic
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), 4326);
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
    }

    #[test]
    fn test_utm_kind() {
        assert_eq!(
            CRS::from_epsg(32643).kind(),
            CrsKind::Utm { zone: 43, north: true }
        );
        assert_eq!(
            CRS::from_epsg(32721).kind(),
            CrsKind::Utm { zone: 21, north: false }
        );
        assert_eq!(CRS::utm(43, true), CRS::from_epsg(32643));
    }

    #[test]
    fn test_unsupported_kind() {
        assert_eq!(CRS::from_epsg(3857).kind(), CrsKind::Unsupported);
        assert_eq!(CRS::from_epsg(32600).kind(), CrsKind::Unsupported);
        assert_eq!(CRS::from_epsg(32661).kind(), CrsKind::Unsupported);
    }
}

//! # cropscan core
//!
//! Core types and traits shared by the cropscan crates.
//!
//! This crate provides:
//! - `Raster<T>`: generic georeferenced raster grid
//! - `GeoTransform` and `CRS`: georeferencing, with WGS84 ↔ UTM reprojection
//! - `Roi` and `BBox`: the region of interest a time series is aggregated over
//! - `MultiBandImage`: a scene with named spectral bands on one grid
//! - `ImageryCatalog`: the seam to any remote imagery provider
//! - GeoTIFF decoding from in-memory buffers

pub mod catalog;
pub mod crs;
pub mod error;
pub mod image;
pub mod io;
pub mod raster;
pub mod vector;

pub use catalog::{CatalogQuery, ImageryCatalog};
pub use crs::CRS;
pub use error::{Error, Result};
pub use image::{Band, MultiBandImage};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use vector::{BBox, Roi};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::catalog::{CatalogQuery, ImageryCatalog};
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::image::{Band, MultiBandImage};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{BBox, Roi};
}

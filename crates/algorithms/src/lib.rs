//! # cropscan algorithms
//!
//! Per-pixel and per-region computations behind the index time series.
//!
//! ## Available Algorithm Categories
//!
//! - **imagery**: the six spectral indices (NDVI, GNDVI, NDMI, DSWI, NDNI,
//!   EVI2) and temporal-mean compositing of per-scene index layers
//! - **statistics**: mean/min/max reduction of an index layer over a region

pub(crate) mod maybe_rayon;

pub mod imagery;
pub mod statistics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        composite_indices, compute_indices, dswi, evi2, gndvi, ndmi, ndni, ndvi,
        normalized_difference, temporal_mean, IndexStack, SpectralIndex,
    };
    pub use crate::statistics::{reduce_region, ReduceParams, RegionStats};
    pub use cropscan_core::prelude::*;
}

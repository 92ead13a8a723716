//! Spectral index band algebra and temporal compositing
//!
//! - Indices: NDVI, GNDVI, NDMI, DSWI, NDNI, EVI2 from a [`MultiBandImage`]
//! - Composite: pixel-wise temporal mean of index layers across scenes
//!
//! [`MultiBandImage`]: cropscan_core::MultiBandImage

mod composite;
mod indices;

pub use composite::{composite_indices, temporal_mean};
pub use indices::{
    compute_indices, dswi, evi2, gndvi, ndmi, ndni, ndvi, normalized_difference, IndexStack,
    ParseIndexError, SpectralIndex,
};

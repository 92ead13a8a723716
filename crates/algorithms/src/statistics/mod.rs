//! Spatial reduction of index layers
//!
//! - **region**: mean/min/max of a layer over a region of interest

pub mod region;

pub use region::{reduce_region, ReduceParams, RegionStats};

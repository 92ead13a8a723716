//! GeoTIFF decoding for band assets

mod cog;
mod native;

pub use cog::{CogLayout, TileWindow};
pub use native::{read_geotiff_from_buffer, write_geotiff_to_buffer};

//! Vector geometry: the region of interest and bounding boxes

mod bbox;
mod roi;

pub use bbox::BBox;
pub use roi::{Roi, DEMO_FARM_PLOT};

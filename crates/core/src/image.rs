//! Multi-band scenes as delivered by an imagery catalog

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};

/// Spectral bands the index formulas draw on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Red,
    Green,
    Nir,
    Swir1,
    Swir2,
    RedEdge,
}

impl Band {
    pub const ALL: [Band; 6] = [
        Band::Red,
        Band::Green,
        Band::Nir,
        Band::Swir1,
        Band::Swir2,
        Band::RedEdge,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Band::Red => "red",
            Band::Green => "green",
            Band::Nir => "nir",
            Band::Swir1 => "swir1",
            Band::Swir2 => "swir2",
            Band::RedEdge => "red_edge",
        }
    }

    /// Sentinel-2 MSI band designation
    pub fn sentinel2(&self) -> &'static str {
        match self {
            Band::Red => "B04",
            Band::Green => "B03",
            Band::Nir => "B08",
            Band::Swir1 => "B11",
            Band::Swir2 => "B12",
            Band::RedEdge => "B05",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One scene: named bands sharing a single grid.
///
/// The first band inserted fixes the grid; later bands must match its shape
/// and transform (resample before inserting).
#[derive(Debug, Clone)]
pub struct MultiBandImage {
    id: String,
    acquired: Option<String>,
    cloud_cover: Option<f64>,
    bands: BTreeMap<Band, Raster<f64>>,
}

impl MultiBandImage {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            acquired: None,
            cloud_cover: None,
            bands: BTreeMap::new(),
        }
    }

    /// Acquisition timestamp as reported by the catalog (ISO 8601)
    pub fn with_acquired(mut self, acquired: impl Into<String>) -> Self {
        self.acquired = Some(acquired.into());
        self
    }

    /// Scene-level cloud cover percentage
    pub fn with_cloud_cover(mut self, percent: f64) -> Self {
        self.cloud_cover = Some(percent);
        self
    }

    /// Add a band; its grid must match the bands already present.
    pub fn with_band(mut self, band: Band, raster: Raster<f64>) -> Result<Self> {
        self.insert_band(band, raster)?;
        Ok(self)
    }

    pub fn insert_band(&mut self, band: Band, raster: Raster<f64>) -> Result<()> {
        if let Some(reference) = self.bands.values().next() {
            if !reference.same_grid(&raster) {
                let (er, ec) = reference.shape();
                let (ar, ac) = raster.shape();
                return Err(Error::SizeMismatch { er, ec, ar, ac });
            }
        }
        self.bands.insert(band, raster);
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn acquired(&self) -> Option<&str> {
        self.acquired.as_deref()
    }

    pub fn cloud_cover(&self) -> Option<f64> {
        self.cloud_cover
    }

    /// Look up a band, failing with [`Error::MissingBand`] when absent
    pub fn band(&self, band: Band) -> Result<&Raster<f64>> {
        self.bands.get(&band).ok_or_else(|| Error::MissingBand {
            band,
            image: self.id.clone(),
        })
    }

    /// (rows, cols) of the shared grid, `None` before any band is added
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.bands.values().next().map(Raster::shape)
    }

    pub fn transform(&self) -> Option<GeoTransform> {
        self.bands.values().next().map(|r| *r.transform())
    }

    pub fn crs(&self) -> Option<CRS> {
        self.bands.values().next().and_then(Raster::crs)
    }

    /// Blank out every band where `mask` is non-zero.
    ///
    /// The mask is sampled by map position, so it may sit on a coarser grid
    /// than the bands. Cells outside the mask are left untouched.
    pub fn apply_mask(&mut self, mask: &Raster<u8>) {
        for raster in self.bands.values_mut() {
            let (rows, cols) = raster.shape();
            let transform = *raster.transform();
            let data = raster.data_mut();
            for row in 0..rows {
                for col in 0..cols {
                    let (x, y) = transform.pixel_to_geo(col, row);
                    if mask.sample_geo(x, y).is_some_and(|m| m != 0) {
                        data[(row, col)] = f64::NAN;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(2, 2, value);
        r.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -10.0));
        r
    }

    #[test]
    fn missing_band_is_reported() {
        let img = MultiBandImage::new("S2A_43PGQ").with_band(Band::Red, band(0.1)).unwrap();
        assert!(img.band(Band::Red).is_ok());
        match img.band(Band::Nir) {
            Err(Error::MissingBand { band, image }) => {
                assert_eq!(band, Band::Nir);
                assert_eq!(image, "S2A_43PGQ");
            }
            other => panic!("expected MissingBand, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_grid_is_rejected() {
        let img = MultiBandImage::new("a").with_band(Band::Red, band(0.1)).unwrap();
        let other = Raster::filled(3, 2, 0.5);
        assert!(matches!(
            img.with_band(Band::Nir, other),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn mask_blanks_flagged_cells() {
        let mut img = MultiBandImage::new("a")
            .with_band(Band::Red, band(0.1))
            .unwrap()
            .with_band(Band::Nir, band(0.5))
            .unwrap();

        let mut mask: Raster<u8> = Raster::new(2, 2);
        mask.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -10.0));
        mask.set(0, 1, 1).unwrap();
        img.apply_mask(&mask);

        assert!(img.band(Band::Red).unwrap().get(0, 1).unwrap().is_nan());
        assert!(img.band(Band::Nir).unwrap().get(0, 1).unwrap().is_nan());
        assert_eq!(img.band(Band::Nir).unwrap().get(1, 1).unwrap(), 0.5);
    }

    #[test]
    fn band_names() {
        assert_eq!(Band::RedEdge.name(), "red_edge");
        assert_eq!(Band::Swir1.sentinel2(), "B11");
        assert_eq!(Band::ALL.len(), 6);
    }
}

//! Spectral vegetation and moisture indices
//!
//! The six indices tracked per window, computed from a [`MultiBandImage`].
//! Every function works on single-band rasters sharing one grid; invalid
//! pixels (nodata input, zero denominator, log of a non-positive value,
//! non-finite result) come out as NaN.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;
use cropscan_core::raster::Raster;
use cropscan_core::{Band, Error, MultiBandImage, Result};

/// Indices computed for every window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Green Normalized Difference Vegetation Index
    Gndvi,
    /// Normalized Difference Moisture Index
    Ndmi,
    /// Disease-Water Stress Index
    Dswi,
    /// Normalized Difference Nitrogen Index
    Ndni,
    /// Two-band Enhanced Vegetation Index
    Evi2,
}

impl SpectralIndex {
    /// Record order
    pub const ALL: [SpectralIndex; 6] = [
        SpectralIndex::Ndvi,
        SpectralIndex::Gndvi,
        SpectralIndex::Ndmi,
        SpectralIndex::Dswi,
        SpectralIndex::Ndni,
        SpectralIndex::Evi2,
    ];

    /// Key used in nested records, e.g. `"NDVI"`
    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Gndvi => "GNDVI",
            SpectralIndex::Ndmi => "NDMI",
            SpectralIndex::Dswi => "DSWI",
            SpectralIndex::Ndni => "NDNI",
            SpectralIndex::Evi2 => "EVI2",
        }
    }

    /// Prefix of the flat-table columns, e.g. `"ndvi"` for `ndvi_mean`
    pub fn column_prefix(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "ndvi",
            SpectralIndex::Gndvi => "gndvi",
            SpectralIndex::Ndmi => "ndmi",
            SpectralIndex::Dswi => "dswi",
            SpectralIndex::Ndni => "ndni",
            SpectralIndex::Evi2 => "evi2",
        }
    }

    /// Evaluate this index over the bands of `image`
    pub fn compute(&self, image: &MultiBandImage) -> Result<Raster<f64>> {
        let nir = image.band(Band::Nir)?;
        match self {
            SpectralIndex::Ndvi => ndvi(nir, image.band(Band::Red)?),
            SpectralIndex::Gndvi => gndvi(nir, image.band(Band::Green)?),
            SpectralIndex::Ndmi => ndmi(nir, image.band(Band::Swir1)?),
            SpectralIndex::Dswi => dswi(
                nir,
                image.band(Band::Swir1)?,
                image.band(Band::Red)?,
                image.band(Band::Swir2)?,
            ),
            SpectralIndex::Ndni => ndni(nir, image.band(Band::RedEdge)?),
            SpectralIndex::Evi2 => evi2(nir, image.band(Band::Red)?),
        }
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown index name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown spectral index '{0}' (expected one of NDVI, GNDVI, NDMI, DSWI, NDNI, EVI2)")]
pub struct ParseIndexError(pub String);

impl FromStr for SpectralIndex {
    type Err = ParseIndexError;

    /// Case-insensitive
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SpectralIndex::ALL
            .into_iter()
            .find(|index| index.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseIndexError(s.to_string()))
    }
}

/// One index layer per [`SpectralIndex`], all on the same grid.
#[derive(Debug, Clone, Default)]
pub struct IndexStack {
    layers: BTreeMap<SpectralIndex, Raster<f64>>,
}

impl IndexStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: SpectralIndex, layer: Raster<f64>) {
        self.layers.insert(index, layer);
    }

    pub fn get(&self, index: SpectralIndex) -> Option<&Raster<f64>> {
        self.layers.get(&index)
    }

    /// Layers in [`SpectralIndex::ALL`] order
    pub fn iter(&self) -> impl Iterator<Item = (SpectralIndex, &Raster<f64>)> {
        self.layers.iter().map(|(index, layer)| (*index, layer))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Compute all six indices for one scene.
///
/// Fails with [`Error::MissingBand`] if any band a formula needs is absent.
pub fn compute_indices(image: &MultiBandImage) -> Result<IndexStack> {
    let mut stack = IndexStack::new();
    for index in SpectralIndex::ALL {
        stack.insert(index, index.compute(image)?);
    }
    Ok(stack)
}

// ---------------------------------------------------------------------------
// Generic normalized difference
// ---------------------------------------------------------------------------

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Pixels where the sum is zero or either input is nodata are set to NaN.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    pixelwise([band_a, band_b], |[a, b]| safe_div(a - b, a + b))
}

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

/// Green NDVI
///
/// `GNDVI = (NIR - Green) / (NIR + Green)`
///
/// More sensitive to chlorophyll concentration than NDVI.
pub fn gndvi(nir: &Raster<f64>, green: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, green)
}

/// Normalized Difference Moisture Index
///
/// `NDMI = (NIR - SWIR1) / (NIR + SWIR1)`
pub fn ndmi(nir: &Raster<f64>, swir1: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, swir1)
}

/// Disease-Water Stress Index
///
/// `DSWI = (NIR + SWIR1) / (Red + SWIR2)`
///
/// Unbounded ratio; higher values indicate healthier, well-watered canopy.
pub fn dswi(
    nir: &Raster<f64>,
    swir1: &Raster<f64>,
    red: &Raster<f64>,
    swir2: &Raster<f64>,
) -> Result<Raster<f64>> {
    pixelwise([nir, swir1, red, swir2], |[n, s1, r, s2]| {
        safe_div(n + s1, r + s2)
    })
}

/// Normalized Difference Nitrogen Index
///
/// `NDNI = ln(NIR - RedEdge) / ln(NIR + RedEdge)`
///
/// This is the ratio-of-logs form the monitoring tables have always used,
/// not the textbook `log(1/R1510) - log(1/R1680)` definition. Pixels where
/// `NIR <= RedEdge` have no defined value.
pub fn ndni(nir: &Raster<f64>, red_edge: &Raster<f64>) -> Result<Raster<f64>> {
    pixelwise([nir, red_edge], |[n, re]| {
        let (diff, sum) = (n - re, n + re);
        if diff <= 0.0 || sum <= 0.0 {
            return f64::NAN;
        }
        safe_div(diff.ln(), sum.ln())
    })
}

/// Two-band Enhanced Vegetation Index (Jiang et al., 2008)
///
/// `EVI2 = 2.5 * (NIR - Red) / (NIR + 2.4 * Red + 1)`
pub fn evi2(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    pixelwise([nir, red], |[n, r]| safe_div(2.5 * (n - r), n + 2.4 * r + 1.0))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn safe_div(num: f64, den: f64) -> f64 {
    if den.abs() < 1e-10 {
        return f64::NAN;
    }
    num / den
}

/// Apply `f` to every pixel of `N` co-registered bands, row-parallel.
fn pixelwise<const N: usize, F>(bands: [&Raster<f64>; N], f: F) -> Result<Raster<f64>>
where
    F: Fn([f64; N]) -> f64 + Sync + Send,
{
    let template = bands[0];
    for band in &bands[1..] {
        check_dimensions(template, band)?;
    }

    let (rows, cols) = template.shape();
    let nodata: [Option<f64>; N] = bands.map(|b| b.nodata());

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            'cells: for col in 0..cols {
                let mut values = [0.0; N];
                for (i, band) in bands.iter().enumerate() {
                    let v = unsafe { band.get_unchecked(row, col) };
                    if is_nodata_f64(v, nodata[i]) {
                        continue 'cells;
                    }
                    values[i] = v;
                }
                let out = f(values);
                if out.is_finite() {
                    row_data[col] = out;
                }
            }
            row_data
        })
        .collect();

    build_output(template, rows, cols, data)
}

fn is_nodata_f64(value: f64, nodata: Option<f64>) -> bool {
    if !value.is_finite() {
        return true;
    }
    match nodata {
        Some(nd) if nd.is_finite() => (value - nd).abs() < f64::EPSILON,
        _ => false,
    }
}

fn check_dimensions(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

fn build_output(
    template: &Raster<f64>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
) -> Result<Raster<f64>> {
    let mut output = template.with_same_meta::<f64>();
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Region statistics
//!
//! Reduces an index layer to mean/min/max over a polygon. The layer is read
//! on a regular lattice of `scale` spacing anchored at the polygon's bounding
//! box; each lattice point inside the polygon takes the value of the pixel
//! it falls in.

use serde::{Deserialize, Serialize};
use tracing::debug;

use cropscan_core::raster::Raster;
use cropscan_core::{Error, Result, Roi};

/// Metres per degree of latitude (mean, spherical approximation)
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Parameters for region reduction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReduceParams {
    /// Sampling interval in metres
    pub scale: f64,
    /// Upper bound on lattice points considered
    pub max_pixels: u64,
}

impl Default for ReduceParams {
    fn default() -> Self {
        Self {
            scale: 30.0,
            max_pixels: 1_000_000_000,
        }
    }
}

/// Summary of one layer over a region.
///
/// All three statistics are `None` when no lattice point produced a valid
/// sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionStats {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Number of valid samples
    pub count: usize,
}

impl RegionStats {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Reduce `layer` to mean/min/max over `roi`.
///
/// The region is reprojected into the layer's CRS first (a layer without a
/// CRS is assumed to share the region's). NaN and nodata pixels, and lattice
/// points that fall outside the layer, are skipped.
///
/// # Errors
/// - [`Error::InvalidParameter`] for a non-positive scale or a lattice larger
///   than `max_pixels`
/// - [`Error::CrsMismatch`] if the layer's CRS is unsupported
pub fn reduce_region(layer: &Raster<f64>, roi: &Roi, params: &ReduceParams) -> Result<RegionStats> {
    if !(params.scale.is_finite() && params.scale > 0.0) {
        return Err(Error::InvalidParameter {
            name: "scale",
            value: params.scale.to_string(),
            reason: "must be a positive number of metres".into(),
        });
    }

    let target = layer.crs().unwrap_or_else(|| roi.crs());
    let region = roi.reproject(target)?;
    let (dx, dy) = lattice_spacing(&region, params.scale, target.is_geographic());

    let bbox = region.bbox();
    let nx = ((bbox.width() / dx).ceil() as u64).max(1);
    let ny = ((bbox.height() / dy).ceil() as u64).max(1);
    if nx.saturating_mul(ny) > params.max_pixels {
        return Err(Error::InvalidParameter {
            name: "max_pixels",
            value: params.max_pixels.to_string(),
            reason: format!("region needs {nx}x{ny} samples at scale {}", params.scale),
        });
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for j in 0..ny {
        let y = bbox.min_y + (j as f64 + 0.5) * dy;
        for i in 0..nx {
            let x = bbox.min_x + (i as f64 + 0.5) * dx;
            if !region.contains(x, y) {
                continue;
            }
            let Some(v) = layer.sample_geo(x, y) else {
                continue;
            };
            if layer.is_nodata(v) {
                continue;
            }
            sum += v;
            count += 1;
            min = min.min(v);
            max = max.max(v);
        }
    }

    debug!(
        "Reduced {}x{} lattice in {}: {} valid sample(s)",
        nx,
        ny,
        target.identifier(),
        count
    );

    if count == 0 {
        return Ok(RegionStats::default());
    }
    Ok(RegionStats {
        mean: Some(sum / count as f64),
        min: Some(min),
        max: Some(max),
        count,
    })
}

/// Lattice step in CRS units for a metric `scale`
fn lattice_spacing(region: &Roi, scale: f64, geographic: bool) -> (f64, f64) {
    if !geographic {
        return (scale, scale);
    }
    let (_, lat) = region.centroid();
    let dy = scale / METRES_PER_DEGREE;
    let dx = scale / (METRES_PER_DEGREE * lat.to_radians().cos().max(1e-6));
    (dx, dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cropscan_core::{GeoTransform, CRS};

    /// 10 m UTM 43N layer covering the demo farm plot
    fn farm_layer(fill: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let (rows, cols) = (40, 40);
        let data = (0..rows * cols).map(|i| fill(i / cols, i % cols)).collect();
        let mut r = Raster::from_vec(data, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(801_400.0, 1_371_700.0, 10.0, -10.0));
        r.set_crs(Some(CRS::utm(43, true)));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn test_constant_layer() {
        let layer = farm_layer(|_, _| 0.6667);
        let stats = reduce_region(&layer, &Roi::demo_farm(), &ReduceParams::default()).unwrap();
        assert!(stats.count > 0);
        assert_abs_diff_eq!(stats.mean.unwrap(), 0.6667, epsilon = 1e-12);
        assert_eq!(stats.min, stats.max);
    }

    #[test]
    fn test_min_max_bracket_mean() {
        let layer = farm_layer(|row, col| (row * 40 + col) as f64 / 1600.0);
        let stats = reduce_region(&layer, &Roi::demo_farm(), &ReduceParams::default()).unwrap();
        let (mean, min, max) = (stats.mean.unwrap(), stats.min.unwrap(), stats.max.unwrap());
        assert!(min < mean && mean < max, "{min} {mean} {max}");
    }

    #[test]
    fn test_all_nan_gives_none() {
        let layer = farm_layer(|_, _| f64::NAN);
        let stats = reduce_region(&layer, &Roi::demo_farm(), &ReduceParams::default()).unwrap();
        assert_eq!(stats, RegionStats::default());
        assert!(stats.is_empty());
    }

    #[test]
    fn test_layer_outside_region_gives_none() {
        let mut layer = farm_layer(|_, _| 0.5);
        layer.set_transform(GeoTransform::new(500_000.0, 1_000_000.0, 10.0, -10.0));
        let stats = reduce_region(&layer, &Roi::demo_farm(), &ReduceParams::default()).unwrap();
        assert!(stats.mean.is_none());
    }

    #[test]
    fn test_geographic_layer() {
        let roi = Roi::new(vec![
            (10.0, 10.0),
            (10.01, 10.0),
            (10.01, 10.01),
            (10.0, 10.01),
            (10.0, 10.0),
        ])
        .unwrap();
        let mut layer = Raster::filled(20, 20, 0.25);
        layer.set_transform(GeoTransform::new(9.995, 10.015, 0.001, -0.001));
        layer.set_crs(Some(CRS::wgs84()));

        let stats = reduce_region(&layer, &roi, &ReduceParams::default()).unwrap();
        // ~1.1 km square at 30 m: roughly 37x37 samples
        assert!(stats.count > 1000, "count {}", stats.count);
        assert_abs_diff_eq!(stats.mean.unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_scale() {
        let layer = farm_layer(|_, _| 0.5);
        let params = ReduceParams {
            scale: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            reduce_region(&layer, &Roi::demo_farm(), &params),
            Err(Error::InvalidParameter { name: "scale", .. })
        ));
    }

    #[test]
    fn test_max_pixels_cap() {
        let layer = farm_layer(|_, _| 0.5);
        let params = ReduceParams {
            scale: 1.0,
            max_pixels: 100,
        };
        assert!(matches!(
            reduce_region(&layer, &Roi::demo_farm(), &params),
            Err(Error::InvalidParameter { name: "max_pixels", .. })
        ));
    }
}

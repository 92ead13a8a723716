//! Temporal compositing of index layers
//!
//! A window may contain several scenes. Indices are computed per scene and
//! then collapsed to one layer per index by a NaN-skipping pixel-wise mean.

use ndarray::Array2;
use tracing::debug;

use crate::imagery::indices::{compute_indices, IndexStack, SpectralIndex};
use crate::maybe_rayon::*;
use cropscan_core::raster::Raster;
use cropscan_core::{Error, MultiBandImage, Result};

/// Pixel-wise mean of `layers`, skipping NaN and nodata.
///
/// The first layer defines the output grid; layers on another grid are
/// sampled onto it by nearest neighbour. A pixel with no valid value in any
/// layer is NaN.
pub fn temporal_mean(layers: &[&Raster<f64>]) -> Result<Raster<f64>> {
    let template = *layers.first().ok_or_else(|| Error::InvalidParameter {
        name: "layers",
        value: "[]".into(),
        reason: "at least one layer is required".into(),
    })?;

    let aligned: Vec<Raster<f64>> = layers[1..]
        .iter()
        .map(|layer| layer.resample_like(template))
        .collect();
    let stack: Vec<&Raster<f64>> = std::iter::once(template).chain(aligned.iter()).collect();

    let (rows, cols) = template.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let mut sum = 0.0;
                let mut count = 0usize;
                for layer in &stack {
                    let v = unsafe { layer.get_unchecked(row, col) };
                    if layer.is_nodata(v) {
                        continue;
                    }
                    sum += v;
                    count += 1;
                }
                if count > 0 {
                    *out = sum / count as f64;
                }
            }
            row_data
        })
        .collect();

    let mut output = template.with_same_meta::<f64>();
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

/// Compute the six indices for every scene and reduce each to its temporal mean.
pub fn composite_indices(scenes: &[MultiBandImage]) -> Result<IndexStack> {
    if scenes.is_empty() {
        return Err(Error::InvalidParameter {
            name: "scenes",
            value: "[]".into(),
            reason: "cannot composite an empty scene list".into(),
        });
    }

    let per_scene = scenes
        .iter()
        .map(compute_indices)
        .collect::<Result<Vec<IndexStack>>>()?;
    debug!("Compositing {} scene(s)", per_scene.len());

    let mut composite = IndexStack::new();
    for index in SpectralIndex::ALL {
        let layers: Vec<&Raster<f64>> = per_scene.iter().filter_map(|s| s.get(index)).collect();
        composite.insert(index, temporal_mean(&layers)?);
    }
    Ok(composite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cropscan_core::{Band, GeoTransform};

    fn layer(values: Vec<f64>) -> Raster<f64> {
        let mut r = Raster::from_vec(values, 2, 2).unwrap();
        r.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -10.0));
        r.set_nodata(Some(f64::NAN));
        r
    }

    fn scene(id: &str, nir: f64, red: f64) -> MultiBandImage {
        let mut img = MultiBandImage::new(id);
        for band in Band::ALL {
            let value = match band {
                Band::Nir => nir,
                Band::Red => red,
                _ => 0.1,
            };
            img.insert_band(band, layer(vec![value; 4])).unwrap();
        }
        img
    }

    #[test]
    fn test_mean_skips_nan() {
        let a = layer(vec![0.2, f64::NAN, f64::NAN, 0.4]);
        let b = layer(vec![0.4, 0.6, f64::NAN, 0.4]);
        let mean = temporal_mean(&[&a, &b]).unwrap();

        assert_abs_diff_eq!(mean.get(0, 0).unwrap(), 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(mean.get(0, 1).unwrap(), 0.6, epsilon = 1e-12);
        assert!(mean.get(1, 0).unwrap().is_nan());
        assert_abs_diff_eq!(mean.get(1, 1).unwrap(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_single_layer_is_identity() {
        let a = layer(vec![0.1, 0.2, 0.3, 0.4]);
        let mean = temporal_mean(&[&a]).unwrap();
        assert_eq!(mean.data(), a.data());
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(temporal_mean(&[]).is_err());
        assert!(composite_indices(&[]).is_err());
    }

    #[test]
    fn test_offset_grid_is_aligned() {
        let a = layer(vec![0.2; 4]);
        // Shifted one cell east: only column 1 of `a` overlaps column 0 of `b`
        let mut b = layer(vec![0.4; 4]);
        b.set_transform(GeoTransform::new(10.0, 20.0, 10.0, -10.0));

        let mean = temporal_mean(&[&a, &b]).unwrap();
        assert_abs_diff_eq!(mean.get(0, 0).unwrap(), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(mean.get(0, 1).unwrap(), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_composite_averages_indices_per_scene() {
        let scenes = [scene("a", 0.5, 0.1), scene("b", 0.3, 0.3)];
        let stack = composite_indices(&scenes).unwrap();
        assert_eq!(stack.len(), 6);

        // NDVI is 2/3 and 0, composited after the index step
        let ndvi = stack.get(SpectralIndex::Ndvi).unwrap();
        assert_abs_diff_eq!(ndvi.get(0, 0).unwrap(), 1.0 / 3.0, epsilon = 1e-12);
    }
}

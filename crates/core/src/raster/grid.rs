//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use crate::vector::BBox;
use ndarray::{s, Array2};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a 2D grid with associated
/// geographic metadata (transform and CRS). Spectral bands and derived
/// index layers are `Raster<f64>`; scene classification masks are
/// `Raster<u8>`.
///
/// # Example
///
/// ```ignore
/// use cropscan_core::Raster;
///
/// let mut nir: Raster<f64> = Raster::filled(3, 3, 0.5);
/// nir.set(1, 1, 0.8)?;
/// assert_eq!(nir.get(1, 1)?, 0.8);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a zero-filled raster of another type on the same grid
    pub fn with_same_meta<U: RasterElement>(&self) -> Raster<U> {
        Raster {
            data: Array2::zeros(self.data.dim()),
            transform: self.transform,
            crs: self.crs,
            nodata: None,
        }
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `other` shares this raster's shape and transform
    pub fn same_grid<U: RasterElement>(&self, other: &Raster<U>) -> bool {
        self.shape() == other.shape() && self.transform == other.transform
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<CRS> {
        self.crs
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Map-space bounding box of the whole grid
    pub fn bounds(&self) -> BBox {
        self.transform.bounds(self.cols(), self.rows())
    }

    // Coordinate conversion

    /// Map coordinates of the centre of (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Fractional pixel coordinates `(col, row)` of a map position
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    /// Whether a value is no-data for this raster
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Value of the cell containing map position `(x, y)`.
    ///
    /// Returns `None` outside the grid; no-data cells are returned as stored.
    pub fn sample_geo(&self, x: f64, y: f64) -> Option<T> {
        let (col, row) = self.geo_to_pixel(x, y);
        if !(col.is_finite() && row.is_finite()) || col < 0.0 || row < 0.0 {
            return None;
        }
        self.data.get((row.floor() as usize, col.floor() as usize)).copied()
    }

    /// Cut out the cells that intersect `bbox`.
    ///
    /// The window is widened to whole cells and clamped to the grid. A bbox
    /// that misses the raster entirely is an [`Error::InvalidParameter`].
    pub fn crop(&self, bbox: &BBox) -> Result<Raster<T>> {
        let (col_a, row_a) = self.geo_to_pixel(bbox.min_x, bbox.max_y);
        let (col_b, row_b) = self.geo_to_pixel(bbox.max_x, bbox.min_y);

        let min_col = col_a.min(col_b).floor().max(0.0);
        let min_row = row_a.min(row_b).floor().max(0.0);
        let max_col = col_a.max(col_b).ceil().min(self.cols() as f64);
        let max_row = row_a.max(row_b).ceil().min(self.rows() as f64);

        if !(min_col < max_col && min_row < max_row) {
            return Err(Error::InvalidParameter {
                name: "bbox",
                value: format!("{bbox:?}"),
                reason: "does not intersect raster extent".into(),
            });
        }

        let (c0, r0, c1, r1) = (
            min_col as usize,
            min_row as usize,
            max_col as usize,
            max_row as usize,
        );
        Ok(Raster {
            data: self.data.slice(s![r0..r1, c0..c1]).to_owned(),
            transform: self.transform.offset(c0, r0),
            crs: self.crs,
            nodata: self.nodata,
        })
    }

    /// Nearest-neighbour resample onto the grid of `template`.
    ///
    /// Cells of the template that fall outside this raster receive the
    /// no-data value (or the type's default no-data when none is set).
    pub fn resample_like<U: RasterElement>(&self, template: &Raster<U>) -> Raster<T> {
        if self.same_grid(template) {
            return self.clone();
        }

        let fill = self.nodata.unwrap_or_else(T::default_nodata);
        let (rows, cols) = template.shape();
        let data = Array2::from_shape_fn((rows, cols), |(row, col)| {
            let (x, y) = template.pixel_to_geo(col, row);
            self.sample_geo(x, y).unwrap_or(fill)
        });

        Raster {
            data,
            transform: template.transform,
            crs: template.crs.or(self.crs),
            nodata: Some(fill),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, cols: usize) -> Raster<f64> {
        let data = (0..rows * cols).map(|v| v as f64).collect();
        let mut r = Raster::from_vec(data, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64 * 10.0, 10.0, -10.0));
        r
    }

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.get(10, 0).is_err());
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        assert!(Raster::<f64>::from_vec(vec![1.0; 5], 2, 3).is_err());
    }

    #[test]
    fn test_sample_geo() {
        let r = ramp(4, 4);
        // Cell (row 1, col 2) covers x in [20, 30), y in (20, 30]
        assert_eq!(r.sample_geo(25.0, 25.0), Some(6.0));
        assert_eq!(r.sample_geo(-1.0, 25.0), None);
        assert_eq!(r.sample_geo(25.0, 41.0), None);
    }

    #[test]
    fn test_crop_window() {
        let r = ramp(4, 4);
        let sub = r.crop(&BBox::new(12.0, 12.0, 28.0, 28.0)).unwrap();
        assert_eq!(sub.shape(), (2, 2));
        assert_eq!(sub.get(0, 0).unwrap(), 5.0);
        assert_eq!(sub.get(1, 1).unwrap(), 10.0);
        assert_eq!(sub.transform().origin_x, 10.0);
        assert_eq!(sub.transform().origin_y, 30.0);
    }

    #[test]
    fn test_crop_outside_fails() {
        let r = ramp(4, 4);
        assert!(r.crop(&BBox::new(100.0, 100.0, 110.0, 110.0)).is_err());
    }

    #[test]
    fn test_resample_to_finer_grid() {
        // 20 m band onto a 10 m template covering the same extent
        let coarse = ramp(2, 2);
        let mut coarse20 = coarse.clone();
        coarse20.set_transform(GeoTransform::new(0.0, 40.0, 20.0, -20.0));

        let mut template: Raster<f64> = Raster::new(4, 4);
        template.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));

        let fine = coarse20.resample_like(&template);
        assert_eq!(fine.shape(), (4, 4));
        assert_eq!(fine.get(0, 0).unwrap(), 0.0);
        assert_eq!(fine.get(1, 1).unwrap(), 0.0);
        assert_eq!(fine.get(0, 3).unwrap(), 1.0);
        assert_eq!(fine.get(3, 3).unwrap(), 3.0);
    }

    #[test]
    fn test_resample_fills_outside_with_nodata() {
        let small = ramp(2, 2);
        let mut template: Raster<f64> = Raster::new(2, 3);
        template.set_transform(*small.transform());

        let out = small.resample_like(&template);
        assert!(out.get(0, 2).unwrap().is_nan());
        assert!(out.is_nodata(out.get(0, 2).unwrap()));
    }
}

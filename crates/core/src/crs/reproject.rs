//! Pure-Rust WGS84 → UTM projection (Snyder 1987, USGS formulas).
//!
//! Region outlines arrive as longitude/latitude while Sentinel-2 tiles are
//! delivered in their UTM zone, so every vertex that meets a raster goes
//! through [`reproject_point`].

use super::{CrsKind, CRS};
use crate::error::{Error, Result};

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Project a WGS84 `(lon, lat)` pair into `target`.
///
/// Geographic targets return the input unchanged. Targets other than
/// WGS84 and UTM are rejected with [`Error::CrsMismatch`].
pub fn reproject_point(lon: f64, lat: f64, target: CRS) -> Result<(f64, f64)> {
    match target.kind() {
        CrsKind::Geographic => Ok((lon, lat)),
        CrsKind::Utm { zone, north } => Ok(wgs84_to_utm(lon, lat, zone, north)),
        CrsKind::Unsupported => Err(Error::CrsMismatch(
            CRS::wgs84().identifier(),
            target.identifier(),
        )),
    }
}

/// Convert WGS84 (longitude, latitude) in degrees to UTM (easting, northing)
/// in metres for the given zone and hemisphere.
pub fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();

    let lon0 = ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians();

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);
    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0
        * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a_coeff / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    if north {
        (easting, northing)
    } else {
        (easting, northing + FALSE_NORTHING_SOUTH)
    }
}

/// Meridional arc from the equator to `lat` (radians), Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // Farm plot near Bengaluru, zone 43N
    #[test]
    fn farm_plot_to_utm43n() {
        let (e, n) = wgs84_to_utm(77.77333199305133, 12.392392446684909, 43, true);
        assert_abs_diff_eq!(e, 801_566.34, epsilon = 1.0);
        assert_abs_diff_eq!(n, 1_371_511.43, epsilon = 1.0);
    }

    // Buenos Aires: (-58.3816, -34.6037) → UTM 21S → (373317.50, 6170036.17)
    #[test]
    fn southern_hemisphere_offset() {
        let (e, n) = wgs84_to_utm(-58.3816, -34.6037, 21, false);
        assert_abs_diff_eq!(e, 373_317.50, epsilon = 1.0);
        assert_abs_diff_eq!(n, 6_170_036.17, epsilon = 1.0);
    }

    #[test]
    fn equator_central_meridian() {
        let (e, n) = wgs84_to_utm(-3.0, 0.0, 30, true);
        assert_abs_diff_eq!(e, 500_000.0, epsilon = 0.01);
        assert_abs_diff_eq!(n, 0.0, epsilon = 0.01);
    }

    #[test]
    fn geographic_target_is_identity() {
        let (x, y) = reproject_point(77.77, 12.39, CRS::wgs84()).unwrap();
        assert_eq!((x, y), (77.77, 12.39));
    }

    #[test]
    fn unsupported_target_is_rejected() {
        let err = reproject_point(77.77, 12.39, CRS::from_epsg(3857)).unwrap_err();
        assert!(matches!(err, Error::CrsMismatch(_, _)));
    }
}

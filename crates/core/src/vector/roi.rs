//! Region of interest: the field polygon statistics are aggregated over

use geo::{Centroid, Contains};
use geo_types::{Coord, LineString, Point, Polygon};
use serde_json::Value;

use crate::crs::{reproject_point, CRS};
use crate::error::{Error, Result};
use crate::vector::BBox;

/// Outline of the monitored farm plot (lon, lat), closed ring.
pub const DEMO_FARM_PLOT: [(f64, f64); 7] = [
    (77.77333199305133, 12.392392446684909),
    (77.77285377084087, 12.391034719901086),
    (77.77415744218291, 12.390603704636632),
    (77.77438732135664, 12.391302225016886),
    (77.77376792469431, 12.391501801924363),
    (77.77399141833513, 12.392187846379386),
    (77.77333199305133, 12.392392446684909),
];

/// An immutable closed polygon.
///
/// Built from WGS84 `(lon, lat)` pairs; [`Roi::reproject`] produces the same
/// outline in a raster's projected CRS. The ring must have at least four
/// points and end where it starts. Self-intersection is not checked.
#[derive(Debug, Clone, PartialEq)]
pub struct Roi {
    polygon: Polygon<f64>,
    crs: CRS,
}

impl Roi {
    /// Build a WGS84 region from a closed ring of `(lon, lat)` pairs.
    pub fn new(ring: Vec<(f64, f64)>) -> Result<Self> {
        Self::with_crs(ring, CRS::wgs84())
    }

    fn with_crs(ring: Vec<(f64, f64)>, crs: CRS) -> Result<Self> {
        if ring.len() < 4 {
            return Err(Error::InvalidRoi(format!(
                "a closed ring needs at least 4 points, got {}",
                ring.len()
            )));
        }
        if let Some(bad) = ring.iter().find(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(Error::InvalidRoi(format!("non-finite coordinate {bad:?}")));
        }
        if ring.first() != ring.last() {
            return Err(Error::InvalidRoi(
                "ring is not closed (first point != last point)".into(),
            ));
        }

        let exterior: LineString<f64> = ring.into_iter().map(|(x, y)| Coord { x, y }).collect();
        Ok(Self {
            polygon: Polygon::new(exterior, vec![]),
            crs,
        })
    }

    /// The outline of [`DEMO_FARM_PLOT`]
    pub fn demo_farm() -> Self {
        Self {
            polygon: Polygon::new(
                DEMO_FARM_PLOT.iter().map(|&(x, y)| Coord { x, y }).collect(),
                vec![],
            ),
            crs: CRS::wgs84(),
        }
    }

    /// Parse a GeoJSON `Polygon`, `Feature` or `FeatureCollection`.
    ///
    /// Only the exterior ring of the first polygon is used.
    pub fn from_geojson(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::InvalidRoi(format!("invalid GeoJSON: {e}")))?;
        let geometry = polygon_geometry(&value)?;

        let ring = geometry
            .get("coordinates")
            .and_then(|c| c.get(0))
            .and_then(Value::as_array)
            .ok_or_else(|| Error::InvalidRoi("polygon has no exterior ring".into()))?;

        let points = ring
            .iter()
            .map(|pos| match (pos.get(0).and_then(Value::as_f64), pos.get(1).and_then(Value::as_f64)) {
                (Some(x), Some(y)) => Ok((x, y)),
                _ => Err(Error::InvalidRoi(format!("invalid position {pos}"))),
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(points)
    }

    pub fn crs(&self) -> CRS {
        self.crs
    }

    /// Ring vertices, closing point included
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.polygon.exterior().points().map(|p| (p.x(), p.y())).collect()
    }

    pub fn bbox(&self) -> BBox {
        BBox::enclosing(self.polygon.exterior().points().map(|p| (p.x(), p.y())))
    }

    /// Whether `(x, y)` lies strictly inside the polygon
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.polygon.contains(&Point::new(x, y))
    }

    /// Area-weighted centroid, falling back to the bbox centre
    pub fn centroid(&self) -> (f64, f64) {
        match self.polygon.centroid() {
            Some(p) => (p.x(), p.y()),
            None => {
                let b = self.bbox();
                ((b.min_x + b.max_x) / 2.0, (b.min_y + b.max_y) / 2.0)
            }
        }
    }

    /// The same outline in `target` coordinates.
    ///
    /// Only WGS84 regions can be reprojected; asking for the CRS the region
    /// already uses is a no-op.
    pub fn reproject(&self, target: CRS) -> Result<Roi> {
        if target == self.crs {
            return Ok(self.clone());
        }
        if !self.crs.is_geographic() {
            return Err(Error::CrsMismatch(self.crs.identifier(), target.identifier()));
        }

        let ring = self
            .points()
            .into_iter()
            .map(|(lon, lat)| reproject_point(lon, lat, target))
            .collect::<Result<Vec<_>>>()?;
        Self::with_crs(ring, target)
    }
}

fn polygon_geometry(value: &Value) -> Result<&Value> {
    match value.get("type").and_then(Value::as_str) {
        Some("Polygon") => Ok(value),
        Some("Feature") => value
            .get("geometry")
            .ok_or_else(|| Error::InvalidRoi("feature has no geometry".into()))
            .and_then(polygon_geometry),
        Some("FeatureCollection") => value
            .get("features")
            .and_then(|f| f.get(0))
            .ok_or_else(|| Error::InvalidRoi("feature collection is empty".into()))
            .and_then(polygon_geometry),
        Some(other) => Err(Error::InvalidRoi(format!(
            "expected a Polygon geometry, got {other}"
        ))),
        None => Err(Error::InvalidRoi("GeoJSON object has no type".into())),
    }
}

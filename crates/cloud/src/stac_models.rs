//! STAC (SpatioTemporal Asset Catalog) data types.
//!
//! Lightweight serde models for STAC Item Search (POST /search) covering what
//! scene loading needs: bbox/datetime/collection filtering, the `query`
//! extension for cloud cover, pagination via `links`, projection metadata and
//! asset access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Search request
// ---------------------------------------------------------------------------

/// Body for `POST /search` (STAC API – Item Search).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StacSearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Property filters (STAC API query extension).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Map<String, Value>>,

    /// Pagination token (next page).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Catalog-specific fields, e.g. Earth Search's `next` paging key.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StacSearchParams {
    /// Create empty search params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bounding box `[west, south, east, north]`.
    pub fn bbox(mut self, west: f64, south: f64, east: f64, north: f64) -> Self {
        self.bbox = Some(vec![west, south, east, north]);
        self
    }

    /// Set datetime or datetime range (e.g. `"2024-06-01/2024-06-30"`).
    pub fn datetime(mut self, dt: &str) -> Self {
        self.datetime = Some(dt.to_string());
        self
    }

    /// Set collection filter.
    pub fn collections(mut self, cols: &[&str]) -> Self {
        self.collections = Some(cols.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Set maximum items per page.
    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    /// Keep only items with `eo:cloud_cover` strictly below `percent`.
    pub fn cloud_cover_below(mut self, percent: f64) -> Self {
        let mut op = Map::new();
        op.insert("lt".into(), Value::from(percent));
        self.query
            .get_or_insert_with(Map::new)
            .insert("eo:cloud_cover".into(), Value::Object(op));
        self
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A STAC Item Collection (GeoJSON FeatureCollection).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemCollection {
    #[serde(rename = "type")]
    pub type_: String,

    pub features: Vec<StacItem>,

    #[serde(default)]
    pub links: Vec<StacLink>,

    #[serde(rename = "numberMatched", skip_serializing_if = "Option::is_none")]
    pub number_matched: Option<u64>,

    #[serde(rename = "numberReturned", skip_serializing_if = "Option::is_none")]
    pub number_returned: Option<u64>,

    /// Earth Search reports counts under `context` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StacItemCollection {
    /// Find the `"next"` pagination link, if any.
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }

    pub fn has_next(&self) -> bool {
        self.next_link().is_some()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A single STAC Item (GeoJSON Feature).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItem {
    #[serde(rename = "type")]
    pub type_: String,

    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,

    /// Bounding box `[west, south, east, north]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    pub properties: StacItemProperties,

    pub assets: HashMap<String, StacAsset>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    #[serde(default)]
    pub links: Vec<StacLink>,
}

impl StacItem {
    pub fn asset(&self, key: &str) -> Option<&StacAsset> {
        self.assets.get(key)
    }

    /// EPSG code of the item's native grid.
    ///
    /// Read from `proj:epsg`, or from `proj:code` (`"EPSG:32643"`) as
    /// written by projection extension v2.
    pub fn epsg(&self) -> Option<u32> {
        let extra = &self.properties.extra;
        if let Some(code) = extra.get("proj:epsg").and_then(Value::as_u64) {
            return u32::try_from(code).ok();
        }
        extra
            .get("proj:code")
            .and_then(Value::as_str)
            .and_then(|code| code.strip_prefix("EPSG:"))
            .and_then(|code| code.parse().ok())
    }

    pub fn cloud_cover(&self) -> Option<f64> {
        self.properties.eo_cloud_cover
    }

    /// Acquisition instant, `None` if missing or not RFC 3339
    pub fn acquired(&self) -> Option<DateTime<Utc>> {
        let raw = self.properties.datetime.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// STAC Item properties.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemProperties {
    /// ISO 8601 datetime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    /// Cloud cover percentage (EO extension).
    #[serde(rename = "eo:cloud_cover", skip_serializing_if = "Option::is_none")]
    pub eo_cloud_cover: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// All other properties we don't model explicitly.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A single STAC Asset (file reference).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacAsset {
    pub href: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    /// All other asset fields.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl StacAsset {
    /// `(scale, offset)` of the first entry in `raster:bands`, if present.
    pub fn scale_offset(&self) -> Option<(f64, f64)> {
        let band = self.extra.get("raster:bands")?.get(0)?;
        let scale = band.get("scale").and_then(Value::as_f64).unwrap_or(1.0);
        let offset = band.get("offset").and_then(Value::as_f64).unwrap_or(0.0);
        Some((scale, offset))
    }

    /// Declared nodata of the first entry in `raster:bands`.
    pub fn nodata(&self) -> Option<f64> {
        self.extra
            .get("raster:bands")?
            .get(0)?
            .get("nodata")
            .and_then(Value::as_f64)
    }
}

/// A STAC Link (used for pagination and related resources).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacLink {
    /// Relationship: `"self"`, `"root"`, `"next"`, `"prev"`, etc.
    pub rel: String,

    pub href: String,

    /// HTTP method for the link (default GET, but `"next"` often uses POST).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Request body for POST-based pagination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// If true, merge body with previous request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<bool>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

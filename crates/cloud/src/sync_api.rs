//! Blocking imagery catalog backed by a STAC API.
//!
//! Wraps the async [`StacClient`] and scene reader with a Tokio runtime so
//! the sequential pipeline can call it like any other [`ImageryCatalog`].

use std::time::Duration;

use cropscan_core::{CatalogQuery, ImageryCatalog, MultiBandImage};
use tracing::{debug, info, warn};

use crate::error::{CloudError, Result};
use crate::http::HttpClient;
use crate::stac_client::{StacCatalog, StacClient, StacClientOptions};
use crate::stac_models::{StacItem, StacSearchParams};
use crate::stac_reader::read_scene;

/// Items requested per search page
const PAGE_LIMIT: u32 = 50;

/// Configuration for [`StacImageryCatalog`].
#[derive(Debug, Clone)]
pub struct StacCatalogOptions {
    pub catalog: StacCatalog,
    /// Collection searched (default `sentinel-2-l2a`).
    pub collection: String,
    /// Maximum items loaded per window (default 20).
    pub max_items: usize,
    /// Per-request timeout (default 60 s; band assets are large).
    pub request_timeout: Duration,
    /// Maximum retries on transient failures (default 3).
    pub max_retries: u32,
    /// Blank cloud and shadow pixels using the scene classification layer.
    pub mask_clouds: bool,
}

impl Default for StacCatalogOptions {
    fn default() -> Self {
        Self {
            catalog: StacCatalog::EarthSearch,
            collection: "sentinel-2-l2a".to_string(),
            max_items: 20,
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
            mask_clouds: true,
        }
    }
}

/// [`ImageryCatalog`] over a STAC API.
///
/// Uses an internal single-threaded Tokio runtime. Create it once and pass
/// it by reference; the HTTP connection pools are reused across windows.
pub struct StacImageryCatalog {
    rt: tokio::runtime::Runtime,
    client: StacClient,
    http: HttpClient,
    options: StacCatalogOptions,
    name: String,
}

impl StacImageryCatalog {
    pub fn new(options: StacCatalogOptions) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CloudError::Network(e.to_string()))?;

        let client = StacClient::new(
            options.catalog.clone(),
            StacClientOptions {
                request_timeout: options.request_timeout,
                max_retries: options.max_retries,
                max_items: options.max_items,
            },
        )?;
        let http = HttpClient::new(options.request_timeout, options.max_retries)?;
        let name = format!("stac:{}", options.catalog);

        Ok(Self {
            rt,
            client,
            http,
            options,
            name,
        })
    }

    pub fn options(&self) -> &StacCatalogOptions {
        &self.options
    }

    /// Search parameters for one catalog query.
    pub fn search_params(&self, query: &CatalogQuery<'_>) -> StacSearchParams {
        let [west, south, east, north] = query.roi.bbox().to_array();
        StacSearchParams::new()
            .bbox(west, south, east, north)
            .datetime(&query.datetime_range())
            .collections(&[self.options.collection.as_str()])
            .cloud_cover_below(query.max_cloud_cover)
            .limit(PAGE_LIMIT.min(self.options.max_items.max(1) as u32))
    }

    /// Run the item search only (blocking).
    pub fn search_items(&self, query: &CatalogQuery<'_>) -> Result<Vec<StacItem>> {
        let params = self.search_params(query);
        let mut items = self.rt.block_on(self.client.search_all(&params))?;
        items.retain(|item| query.accepts_cloud_cover(item.cloud_cover()));
        items.sort_by_key(StacItem::acquired);
        Ok(items)
    }
}

impl ImageryCatalog for StacImageryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn search(&self, query: &CatalogQuery<'_>) -> cropscan_core::Result<Vec<MultiBandImage>> {
        let items = self.search_items(query)?;
        if items.is_empty() {
            debug!("No items for {}", query.datetime_range());
            return Ok(Vec::new());
        }
        info!(
            "Loading {} scene(s) for {}",
            items.len(),
            query.datetime_range()
        );

        let mut scenes = Vec::with_capacity(items.len());
        for item in &items {
            let scene = self.rt.block_on(read_scene(
                &self.client,
                &self.http,
                item,
                query.roi,
                self.options.mask_clouds,
            ));
            match scene {
                Ok(scene) => scenes.push(scene),
                // Neighbouring tiles can match the bbox search without covering the plot
                Err(CloudError::OutsideTile { item }) => {
                    warn!("{} does not cover the region, skipped", item);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(scenes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cropscan_core::Roi;

    fn query(roi: &Roi) -> CatalogQuery<'_> {
        CatalogQuery::new(
            roi,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 6).unwrap(),
        )
    }

    #[test]
    fn search_params_carry_window_and_cloud_filter() {
        let catalog = StacImageryCatalog::new(StacCatalogOptions::default()).unwrap();
        let roi = Roi::demo_farm();
        let json = serde_json::to_value(catalog.search_params(&query(&roi))).unwrap();

        assert_eq!(json["datetime"], "2024-06-01T00:00:00Z/2024-06-05T23:59:59.999Z");
        assert_eq!(json["collections"], serde_json::json!(["sentinel-2-l2a"]));
        assert_eq!(json["query"]["eo:cloud_cover"]["lt"], 30.0);
        assert_eq!(json["limit"], 20);
        let bbox = json["bbox"].as_array().unwrap();
        assert!(bbox[0].as_f64().unwrap() > 77.77 && bbox[2].as_f64().unwrap() < 77.78);
    }

    #[test]
    fn catalog_name_includes_endpoint() {
        let catalog = StacImageryCatalog::new(StacCatalogOptions {
            catalog: StacCatalog::PlanetaryComputer,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(catalog.name(), "stac:planetary-computer");
    }

    #[test]
    #[ignore] // requires network access
    fn earth_search_returns_farm_scenes() {
        let catalog = StacImageryCatalog::new(StacCatalogOptions::default()).unwrap();
        let roi = Roi::demo_farm();
        let q = CatalogQuery::new(
            &roi,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        let items = catalog.search_items(&q).unwrap();
        assert!(!items.is_empty());
        assert!(items.iter().all(|i| i.cloud_cover().unwrap_or(0.0) < 30.0));
    }
}

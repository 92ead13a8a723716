//! Async STAC client for Sentinel-2 item search.
//!
//! Earth Search and Planetary Computer are supported out of the box, plus
//! any STAC API endpoint via [`StacCatalog::Custom`]. The two public catalogs
//! name Sentinel-2 assets differently; [`StacCatalog::asset_keys`] resolves a
//! [`Band`] to the keys to look for.

use std::fmt;
use std::time::Duration;

use cropscan_core::Band;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CloudError, Result};
use crate::http::backoff_delay;
use crate::stac_models::{StacItem, StacItemCollection, StacLink, StacSearchParams};

const EARTH_SEARCH_URL: &str = "https://earth-search.aws.element84.com/v1";
const PLANETARY_COMPUTER_URL: &str = "https://planetarycomputer.microsoft.com/api/stac/v1";
const PC_SIGN_URL: &str = "https://planetarycomputer.microsoft.com/api/sas/v1/sign";

/// Well-known STAC catalogs plus custom endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StacCatalog {
    /// AWS Earth Search (Element 84).
    EarthSearch,
    /// Microsoft Planetary Computer; assets need a SAS-signed href.
    PlanetaryComputer,
    /// Any STAC API root, e.g. `"https://stac.example.com/api/v1"`.
    Custom(String),
}

impl StacCatalog {
    /// Full POST `/search` URL.
    pub fn search_url(&self) -> String {
        let base = match self {
            Self::EarthSearch => EARTH_SEARCH_URL,
            Self::PlanetaryComputer => PLANETARY_COMPUTER_URL,
            Self::Custom(base) => base.trim_end_matches('/'),
        };
        if base.ends_with("/search") {
            base.to_string()
        } else {
            format!("{}/search", base)
        }
    }

    /// Parse a shorthand (`es`, `earth-search`, `pc`, `planetary-computer`)
    /// or treat the input as a custom URL.
    pub fn from_str_or_url(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "es" | "earth-search" | "earthsearch" => Self::EarthSearch,
            "pc" | "planetary-computer" | "planetarycomputer" => Self::PlanetaryComputer,
            _ => Self::Custom(s.trim().to_string()),
        }
    }

    pub fn needs_signing(&self) -> bool {
        matches!(self, Self::PlanetaryComputer)
    }

    /// Candidate asset keys for `band`, preferred key first.
    ///
    /// Custom endpoints are tried with both naming schemes.
    pub fn asset_keys(&self, band: Band) -> Vec<&'static str> {
        let common = earth_search_key(band);
        let designation = band.sentinel2();
        match self {
            Self::EarthSearch => vec![common],
            Self::PlanetaryComputer => vec![designation],
            Self::Custom(_) => vec![common, designation],
        }
    }

    /// Candidate keys for the scene classification layer.
    pub fn scl_keys(&self) -> &'static [&'static str] {
        match self {
            Self::EarthSearch => &["scl"],
            Self::PlanetaryComputer => &["SCL"],
            Self::Custom(_) => &["scl", "SCL"],
        }
    }
}

impl fmt::Display for StacCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EarthSearch => f.write_str("earth-search"),
            Self::PlanetaryComputer => f.write_str("planetary-computer"),
            Self::Custom(url) => f.write_str(url),
        }
    }
}

fn earth_search_key(band: Band) -> &'static str {
    match band {
        Band::Red => "red",
        Band::Green => "green",
        Band::Nir => "nir",
        Band::Swir1 => "swir16",
        Band::Swir2 => "swir22",
        Band::RedEdge => "rededge1",
    }
}

/// Configuration for [`StacClient`].
#[derive(Debug, Clone)]
pub struct StacClientOptions {
    /// Per-request timeout (default 30 s).
    pub request_timeout: Duration,
    /// Maximum retries on transient failures (default 3).
    pub max_retries: u32,
    /// Maximum total items to fetch across pages (default 100).
    pub max_items: usize,
}

impl Default for StacClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            max_items: 100,
        }
    }
}

/// Async client for STAC Item Search.
pub struct StacClient {
    catalog: StacCatalog,
    client: reqwest::Client,
    options: StacClientOptions,
}

impl StacClient {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| CloudError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            catalog,
            client,
            options,
        })
    }

    pub fn catalog(&self) -> &StacCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &StacClientOptions {
        &self.options
    }

    /// Search with automatic pagination, collecting up to `max_items` items.
    pub async fn search_all(&self, params: &StacSearchParams) -> Result<Vec<StacItem>> {
        let max = self.options.max_items;
        let mut items: Vec<StacItem> = Vec::new();
        let mut page = self.post_search(&self.catalog.search_url(), params).await?;

        loop {
            let next = page.next_link().cloned();
            items.append(&mut page.features);
            if items.len() >= max {
                break;
            }
            let Some(link) = next else { break };
            page = self.follow_next(&link, params).await?;
            if page.is_empty() {
                break;
            }
        }

        items.truncate(max);
        debug!("STAC search on {} returned {} item(s)", self.catalog, items.len());
        Ok(items)
    }

    /// Return a downloadable href for an asset, SAS-signing it for
    /// Planetary Computer and passing it through unchanged elsewhere.
    pub async fn sign_href(&self, href: &str) -> Result<String> {
        if !self.catalog.needs_signing() {
            return Ok(href.to_string());
        }

        let resp = self
            .client
            .get(PC_SIGN_URL)
            .query(&[("href", href)])
            .send()
            .await
            .map_err(|e| CloudError::Auth(format!("sign request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CloudError::Auth(format!("sign endpoint returned HTTP {status}")));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| CloudError::Auth(format!("parsing sign response: {e}")))?;
        body.get("href")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CloudError::Auth("sign response has no 'href'".into()))
    }

    async fn post_search(&self, url: &str, params: &StacSearchParams) -> Result<StacItemCollection> {
        let mut last_err = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let resp = match self.client.post(url).json(params).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!("STAC search attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(CloudError::Network(format!("STAC search request failed: {e}")));
                    continue;
                }
            };

            let status = resp.status();
            if status.is_success() {
                let body = resp.text().await?;
                return serde_json::from_str(&body)
                    .map_err(|e| CloudError::Network(format!("parsing STAC response: {e}")));
            }

            let body = resp.text().await.unwrap_or_default();
            last_err = Some(CloudError::Network(format!(
                "STAC search returned HTTP {}: {}",
                status,
                body.chars().take(300).collect::<String>()
            )));
            // A rejected query will not succeed on retry
            if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
                break;
            }
        }

        Err(last_err.unwrap_or_else(|| CloudError::Network("STAC search failed".into())))
    }

    /// Follow a `next` link: POST links carry (or merge into) a body, GET
    /// links embed the token in the URL.
    async fn follow_next(
        &self,
        link: &StacLink,
        original: &StacSearchParams,
    ) -> Result<StacItemCollection> {
        let is_post = link
            .method
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("POST"));

        if !is_post {
            let resp = self.client.get(&link.href).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(CloudError::Network(format!(
                    "STAC pagination returned HTTP {status}"
                )));
            }
            return resp
                .json()
                .await
                .map_err(|e| CloudError::Network(format!("parsing pagination response: {e}")));
        }

        let params = next_page_params(link, original)?;
        self.post_search(&link.href, &params).await
    }
}

/// Request body for a POST `next` link.
fn next_page_params(link: &StacLink, original: &StacSearchParams) -> Result<StacSearchParams> {
    let mut body = match (&link.body, link.merge.unwrap_or(false)) {
        (Some(body), false) => return parse_params(body.clone()),
        _ => serde_json::to_value(original)
            .map_err(|e| CloudError::Network(format!("serializing search params: {e}")))?,
    };

    if let (Some(base), Some(Value::Object(extra))) = (body.as_object_mut(), &link.body) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    parse_params(body)
}

fn parse_params(body: Value) -> Result<StacSearchParams> {
    serde_json::from_value(body)
        .map_err(|e| CloudError::Network(format!("invalid pagination body: {e}")))
}

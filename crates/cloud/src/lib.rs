//! # cropscan cloud
//!
//! Sentinel-2 imagery from STAC APIs.
//!
//! [`StacImageryCatalog`] implements [`cropscan_core::ImageryCatalog`]: it
//! searches a STAC endpoint (Earth Search, Planetary Computer or a custom
//! URL) for scenes over a region, reads the six band assets over the region
//! with HTTP range requests and optionally masks clouds with the scene
//! classification layer.
//!
//! The async building blocks ([`StacClient`], [`stac_reader::read_scene`])
//! are public for callers that run their own runtime.

pub mod cog_reader;
pub mod error;
pub mod http;
pub mod stac_client;
pub mod stac_models;
pub mod stac_reader;
pub mod sync_api;

pub use error::{CloudError, Result};
pub use stac_client::{StacCatalog, StacClient, StacClientOptions};
pub use stac_models::{StacItem, StacItemCollection, StacSearchParams};
pub use sync_api::{StacCatalogOptions, StacImageryCatalog};

//! Error types for the STAC imagery catalog.

use cropscan_core::Band;
use thiserror::Error;

/// Errors produced while searching a STAC API or loading scene assets.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("asset signing error: {0}")]
    Auth(String),

    #[error("item '{item}' has no asset for band {band}")]
    MissingAsset { band: Band, item: String },

    #[error("invalid STAC item '{item}': {reason}")]
    InvalidItem { item: String, reason: String },

    #[error("item '{item}' does not cover the requested window")]
    OutsideTile { item: String },

    #[error("server does not support range requests for {url}")]
    RangeNotSupported { url: String },

    #[error("cannot decode asset {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("core error: {0}")]
    Core(#[from] cropscan_core::Error),
}

/// Result alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;

impl From<CloudError> for cropscan_core::Error {
    /// A scene without a band asset is fatal; every other remote failure is
    /// reported as a (transient) catalog error.
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::MissingAsset { band, item } => {
                cropscan_core::Error::MissingBand { band, image: item }
            }
            CloudError::Core(inner) => inner,
            other => cropscan_core::Error::Catalog(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_failures_are_transient() {
        let err: cropscan_core::Error = CloudError::Network("timed out".into()).into();
        assert!(err.is_transient());
    }

    #[test]
    fn missing_asset_is_fatal() {
        let err: cropscan_core::Error = CloudError::MissingAsset {
            band: Band::RedEdge,
            item: "S2B_43PGQ_20240612_0_L2A".into(),
        }
        .into();
        assert!(!err.is_transient());
        assert!(matches!(
            err,
            cropscan_core::Error::MissingBand { band: Band::RedEdge, .. }
        ));
    }

    #[test]
    fn decode_failures_are_transient_catalog_errors() {
        let err: cropscan_core::Error = CloudError::Decode {
            url: "https://example.com/B04.tif".into(),
            reason: "No georeferencing".into(),
        }
        .into();
        assert!(matches!(err, cropscan_core::Error::Catalog(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn core_errors_pass_through() {
        let err: cropscan_core::Error =
            CloudError::Core(cropscan_core::Error::InvalidRoi("open".into())).into();
        assert!(matches!(err, cropscan_core::Error::InvalidRoi(_)));
    }
}

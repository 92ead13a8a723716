//! Error types for cropscan

use thiserror::Error;

use crate::image::Band;

/// Main error type for cropscan operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid region of interest: {0}")]
    InvalidRoi(String),

    #[error("Band '{band}' missing from image '{image}'")]
    MissingBand { band: Band, image: String },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the failure is local to one request and may not recur.
    ///
    /// Catalog and I/O failures are transient; everything else describes a
    /// problem with the inputs that would repeat on every window.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Catalog(_) | Error::Io(_))
    }
}

/// Result type alias for cropscan operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::Catalog("timeout".into()).is_transient());
        assert!(Error::Io(std::io::Error::other("reset")).is_transient());
        assert!(!Error::InvalidRoi("open ring".into()).is_transient());
        assert!(!Error::MissingBand {
            band: Band::Nir,
            image: "S2A".into()
        }
        .is_transient());
    }

    #[test]
    fn missing_band_message_names_band() {
        let err = Error::MissingBand {
            band: Band::Swir2,
            image: "scene-1".into(),
        };
        assert_eq!(err.to_string(), "Band 'swir2' missing from image 'scene-1'");
    }
}

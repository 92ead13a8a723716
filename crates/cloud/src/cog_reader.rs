//! Windowed band reads over HTTP Range requests.
//!
//! Sentinel-2 L2A assets are tiled COGs of roughly 240 MB per band. A plot
//! covers a handful of their 1024 px tiles, so only the IFD prefix and
//! those tiles are fetched.

use cropscan_core::io::{CogLayout, TileWindow};
use cropscan_core::raster::{Raster, RasterElement};
use cropscan_core::BBox;
use futures::future::try_join_all;
use tracing::debug;

use crate::error::{CloudError, Result};
use crate::http::HttpClient;

/// First request for the IFD; enough for Sentinel-2 COGs
const HEADER_PREFIX: u64 = 64 * 1024;

/// Give up growing the IFD request past this size
const MAX_HEADER_PREFIX: u64 = 1024 * 1024;

/// Outcome of a windowed read
#[derive(Debug)]
pub enum WindowRead<T: RasterElement> {
    /// The tiles under the window, decoded and georeferenced
    Raster(Raster<T>),
    /// The file's footprint misses the window
    Outside,
    /// The file is striped or the server ignores ranges; read it whole
    NeedsFullRead,
}

/// Read the part of the GeoTIFF at `url` that covers `window`.
pub async fn read_window<T: RasterElement>(
    http: &HttpClient,
    url: &str,
    window: &BBox,
) -> Result<WindowRead<T>> {
    let (header, layout) = match read_layout(http, url).await {
        Ok(found) => found,
        Err(CloudError::RangeNotSupported { .. }) => return Ok(WindowRead::NeedsFullRead),
        Err(CloudError::Core(cropscan_core::Error::UnsupportedDataType(reason))) => {
            debug!("{}: {}", unsigned(url), reason);
            return Ok(WindowRead::NeedsFullRead);
        }
        Err(e) => return Err(e),
    };

    let Some(tiles) = layout.window(window) else {
        return Ok(WindowRead::Outside);
    };
    let fetched = fetch_tiles(http, url, &layout, &tiles).await?;
    debug!(
        "{}: {} of {} tiles, {} bytes",
        unsigned(url),
        fetched.len(),
        layout.tile_count(),
        fetched.iter().map(|(_, bytes)| bytes.len()).sum::<usize>()
    );

    let raster = layout
        .read_window(&header, &tiles, fetched)
        .map_err(|e| decode_error(url, e))?;
    Ok(WindowRead::Raster(raster))
}

/// Fetch a growing prefix of the file until its first IFD parses.
async fn read_layout(http: &HttpClient, url: &str) -> Result<(Vec<u8>, CogLayout)> {
    let mut size = HEADER_PREFIX;
    loop {
        let header = http.fetch_range(url, 0, size).await?;
        match CogLayout::from_header(&header) {
            Ok(layout) => return Ok((header, layout)),
            Err(e @ cropscan_core::Error::UnsupportedDataType(_)) => return Err(e.into()),
            // A short answer is the whole file, so a larger prefix would not help
            Err(e) if size >= MAX_HEADER_PREFIX || (header.len() as u64) < size => {
                return Err(decode_error(url, e));
            }
            Err(_) => size *= 4,
        }
    }
}

async fn fetch_tiles(
    http: &HttpClient,
    url: &str,
    layout: &CogLayout,
    tiles: &TileWindow,
) -> Result<Vec<(usize, Vec<u8>)>> {
    let requests = tiles.tiles.iter().map(|&tile| async move {
        let (offset, length) = layout.tile_range(tile).ok_or_else(|| CloudError::Decode {
            url: unsigned(url).to_string(),
            reason: format!("tile {} missing from the tile table", tile),
        })?;
        let bytes = http.fetch_range(url, offset, length).await?;
        Ok::<_, CloudError>((tile, bytes))
    });
    try_join_all(requests).await
}

fn decode_error(url: &str, e: cropscan_core::Error) -> CloudError {
    CloudError::Decode {
        url: unsigned(url).to_string(),
        reason: e.to_string(),
    }
}

/// `url` without its query string, which may carry a signing token
pub(crate) fn unsigned(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_token_is_kept_out_of_messages() {
        let signed = "https://sentinel2l2a01.blob.core.windows.net/B04.tif?st=2024&sig=abc";
        assert_eq!(unsigned(signed), "https://sentinel2l2a01.blob.core.windows.net/B04.tif");
        assert_eq!(unsigned("https://example.com/B04.tif"), "https://example.com/B04.tif");

        let err = decode_error(signed, cropscan_core::Error::Other("truncated".into()));
        assert!(!err.to_string().contains("sig="));
    }
}

//! Bridge between STAC search results and [`MultiBandImage`].
//!
//! Each band asset is read over the region only (the tiles under it, or the
//! whole file when the asset is not range-readable), cropped and converted
//! to surface reflectance. Bands are then resampled onto the red band's
//! 10 m grid so the scene satisfies the one-grid invariant.

use cropscan_core::io::read_geotiff_from_buffer;
use cropscan_core::raster::{Raster, RasterElement};
use cropscan_core::{BBox, Band, MultiBandImage, Roi, CRS};
use tracing::{debug, warn};

use crate::cog_reader::{self, unsigned, WindowRead};
use crate::error::{CloudError, Result};
use crate::http::HttpClient;
use crate::stac_client::StacClient;
use crate::stac_models::{StacAsset, StacItem};

/// Sentinel-2 L2A digital numbers per unit reflectance
const DEFAULT_REFLECTANCE_SCALE: f64 = 1e-4;

/// Scene classification classes treated as unusable: cloud shadow, cloud
/// (medium and high probability) and thin cirrus.
pub const SCL_MASKED_CLASSES: [u8; 4] = [3, 8, 9, 10];

/// Margin around the region bbox, one 20 m pixel
const CROP_MARGIN: f64 = 20.0;

/// Load one item as a scene cropped to `roi`.
///
/// Fails with [`CloudError::MissingAsset`] when a band asset is absent and
/// [`CloudError::InvalidItem`] when the item carries no projection.
pub async fn read_scene(
    client: &StacClient,
    http: &HttpClient,
    item: &StacItem,
    roi: &Roi,
    mask_clouds: bool,
) -> Result<MultiBandImage> {
    let epsg = item.epsg().ok_or_else(|| CloudError::InvalidItem {
        item: item.id.clone(),
        reason: "no proj:epsg / proj:code property".into(),
    })?;
    let crs = CRS::from_epsg(epsg);
    let window = roi.reproject(crs)?.bbox().expand(CROP_MARGIN);

    let mut scene = MultiBandImage::new(item.id.clone());
    if let Some(datetime) = &item.properties.datetime {
        scene = scene.with_acquired(datetime.clone());
    }
    if let Some(cc) = item.cloud_cover() {
        scene = scene.with_cloud_cover(cc);
    }

    // Red is 10 m and defines the scene grid
    let mut template: Option<Raster<f64>> = None;
    for band in std::iter::once(Band::Red).chain(Band::ALL.into_iter().filter(|b| *b != Band::Red)) {
        let (key, asset) = find_asset(item, &client.catalog().asset_keys(band)).ok_or_else(|| {
            CloudError::MissingAsset {
                band,
                item: item.id.clone(),
            }
        })?;
        let raw: Raster<u16> = fetch_window(client, http, item, asset, crs, &window).await?;
        let reflectance = to_reflectance(&raw, asset);
        debug!("{} {} -> {:?}", item.id, key, reflectance.shape());

        let aligned = match &template {
            Some(t) => reflectance.resample_like(t),
            None => {
                template = Some(reflectance.clone());
                reflectance
            }
        };
        scene.insert_band(band, aligned)?;
    }

    if mask_clouds {
        match find_asset(item, client.catalog().scl_keys()) {
            Some((_, asset)) => {
                let scl: Raster<u8> = fetch_window(client, http, item, asset, crs, &window).await?;
                scene.apply_mask(&cloud_mask(&scl));
            }
            None => warn!("{} has no scene classification asset; cloud mask skipped", item.id),
        }
    }

    Ok(scene)
}

fn find_asset<'a>(item: &'a StacItem, keys: &[&'static str]) -> Option<(&'static str, &'a StacAsset)> {
    keys.iter().find_map(|key| item.asset(key).map(|asset| (*key, asset)))
}

async fn fetch_window<T: RasterElement>(
    client: &StacClient,
    http: &HttpClient,
    item: &StacItem,
    asset: &StacAsset,
    crs: CRS,
    window: &BBox,
) -> Result<Raster<T>> {
    let href = client.sign_href(&asset.href).await?;
    let mut raster: Raster<T> = match cog_reader::read_window(http, &href, window).await? {
        WindowRead::Raster(raster) => raster,
        WindowRead::Outside => {
            return Err(CloudError::OutsideTile {
                item: item.id.clone(),
            })
        }
        WindowRead::NeedsFullRead => {
            debug!("{} is not range-readable, downloading whole", unsigned(&href));
            let bytes = http.fetch(&href).await?;
            read_geotiff_from_buffer(&bytes).map_err(|e| CloudError::Decode {
                url: unsigned(&href).to_string(),
                reason: e.to_string(),
            })?
        }
    };
    raster.set_crs(Some(crs));
    crop_to_window(&raster, window, &item.id)
}

/// Crop a decoded asset to `window`.
///
/// A tile whose footprint misses the window is [`CloudError::OutsideTile`].
fn crop_to_window<T: RasterElement>(
    raster: &Raster<T>,
    window: &BBox,
    item: &str,
) -> Result<Raster<T>> {
    if !raster.bounds().intersects(window) {
        return Err(CloudError::OutsideTile {
            item: item.to_string(),
        });
    }
    Ok(raster.crop(window)?)
}

/// Digital numbers to reflectance, using the asset's `raster:bands` scale
/// and offset when declared. Nodata cells become NaN.
fn to_reflectance(raw: &Raster<u16>, asset: &StacAsset) -> Raster<f64> {
    let (scale, offset) = asset
        .scale_offset()
        .unwrap_or((DEFAULT_REFLECTANCE_SCALE, 0.0));
    let nodata = asset.nodata().unwrap_or(0.0);

    let mut out = raw.with_same_meta::<f64>();
    out.set_nodata(Some(f64::NAN));
    *out.data_mut() = raw.data().mapv(|dn| {
        let dn = f64::from(dn);
        if dn == nodata {
            f64::NAN
        } else {
            dn * scale + offset
        }
    });
    out
}

/// 1 where the scene classification marks cloud or shadow, 0 elsewhere.
fn cloud_mask(scl: &Raster<u8>) -> Raster<u8> {
    let mut mask = scl.with_same_meta::<u8>();
    *mask.data_mut() = scl
        .data()
        .mapv(|class| u8::from(SCL_MASKED_CLASSES.contains(&class)));
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stac_models::tests::FIXTURE;
    use crate::stac_models::StacItemCollection;
    use approx::assert_abs_diff_eq;
    use cropscan_core::GeoTransform;

    fn fixture_item() -> StacItem {
        let col: StacItemCollection = serde_json::from_str(FIXTURE).unwrap();
        col.features.into_iter().next().unwrap()
    }

    #[test]
    fn reflectance_uses_declared_scaling() {
        let item = fixture_item();
        let raw = Raster::from_vec(vec![0u16, 1000, 2000, 5000], 2, 2).unwrap();
        let refl = to_reflectance(&raw, item.asset("red").unwrap());

        assert!(refl.get(0, 0).unwrap().is_nan());
        assert_abs_diff_eq!(refl.get(0, 1).unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(refl.get(1, 0).unwrap(), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(refl.get(1, 1).unwrap(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn reflectance_defaults_without_metadata() {
        let item = fixture_item();
        let raw = Raster::from_vec(vec![2500u16; 4], 2, 2).unwrap();
        // scl carries no raster:bands entry
        let refl = to_reflectance(&raw, item.asset("scl").unwrap());
        assert_abs_diff_eq!(refl.get(1, 1).unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn cloud_mask_flags_cloud_and_shadow() {
        let mut scl = Raster::from_vec(vec![4u8, 3, 8, 9, 10, 5], 2, 3).unwrap();
        scl.set_transform(GeoTransform::new(0.0, 40.0, 20.0, -20.0));
        let mask = cloud_mask(&scl);

        let flags: Vec<u8> = mask.data().iter().copied().collect();
        assert_eq!(flags, vec![0, 1, 1, 1, 1, 0]);
        assert_eq!(mask.transform(), scl.transform());
    }

    /// Decoded 40x40 10 m band around the demo farm, as a tile asset would arrive
    fn decoded_farm_band() -> Raster<u16> {
        let mut band: Raster<f64> = Raster::filled(40, 40, 1200.0);
        band.set_transform(GeoTransform::new(801_400.0, 1_371_700.0, 10.0, -10.0));
        let bytes = cropscan_core::io::write_geotiff_to_buffer(&band).unwrap();
        let mut raster: Raster<u16> = read_geotiff_from_buffer(&bytes).unwrap();
        raster.set_crs(Some(CRS::utm(43, true)));
        raster
    }

    #[test]
    fn decoded_asset_crops_to_region_window() {
        let raster = decoded_farm_band();
        let window = Roi::demo_farm()
            .reproject(CRS::utm(43, true))
            .unwrap()
            .bbox()
            .expand(CROP_MARGIN);

        let cropped = crop_to_window(&raster, &window, "S2B_43PGQ").unwrap();
        let (rows, cols) = cropped.shape();
        assert!(rows > 0 && rows < 40 && cols > 0 && cols < 40);
        assert_eq!(cropped.get(0, 0).unwrap(), 1200);
    }

    #[test]
    fn disjoint_tile_is_outside() {
        let raster = decoded_farm_band();
        let window = BBox::new(600_000.0, 1_200_000.0, 600_200.0, 1_200_200.0);
        assert!(matches!(
            crop_to_window(&raster, &window, "S2B_43PGP"),
            Err(CloudError::OutsideTile { item }) if item == "S2B_43PGP"
        ));
    }

    #[test]
    fn asset_lookup_falls_back_across_naming_schemes() {
        let item = fixture_item();
        assert_eq!(find_asset(&item, &["B04", "red"]).map(|(k, _)| k), Some("red"));
        assert!(find_asset(&item, &["B05", "rededge1"]).is_none());
    }
}

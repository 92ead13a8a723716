//! Integration tests against live STAC catalogs.
//!
//! All tests here need network access and are `#[ignore]`d.
//! Run with: `cargo test -p cropscan-cloud -- --ignored stac`

use std::time::Duration;

use chrono::NaiveDate;
use cropscan_cloud::cog_reader::{read_window, WindowRead};
use cropscan_cloud::http::HttpClient;
use cropscan_cloud::{
    StacCatalog, StacCatalogOptions, StacClient, StacClientOptions, StacImageryCatalog,
    StacSearchParams,
};
use cropscan_core::{Band, CatalogQuery, ImageryCatalog, Roi, CRS};

fn farm_params() -> StacSearchParams {
    let [west, south, east, north] = Roi::demo_farm().bbox().to_array();
    StacSearchParams::new()
        .bbox(west, south, east, north)
        .datetime("2024-01-01T00:00:00Z/2024-01-31T23:59:59.999Z")
        .collections(&["sentinel-2-l2a"])
        .cloud_cover_below(30.0)
        .limit(5)
}

/// Search Earth Search for Sentinel-2 scenes over the demo plot.
#[tokio::test]
#[ignore]
async fn stac_earth_search_sentinel2() {
    let client = StacClient::new(StacCatalog::EarthSearch, StacClientOptions::default())
        .expect("failed to create client");

    let items = client.search_all(&farm_params()).await.expect("search failed");

    println!("Found {} items", items.len());
    assert!(!items.is_empty(), "January is dry season, expected clear scenes");

    for item in &items {
        println!(
            "  {} dt={} cc={:?}",
            item.id,
            item.properties.datetime.as_deref().unwrap_or("-"),
            item.cloud_cover()
        );
        assert!(item.cloud_cover().is_some_and(|cc| cc < 30.0));
        assert!(item.epsg().is_some(), "item should carry its projection");
        for band in Band::ALL {
            let keys = StacCatalog::EarthSearch.asset_keys(band);
            assert!(
                keys.iter().any(|k| item.asset(k).is_some()),
                "{} lacks {:?}",
                item.id,
                band
            );
        }
    }
}

/// Search Planetary Computer and sign one asset.
#[tokio::test]
#[ignore]
async fn stac_planetary_computer_signing() {
    let client = StacClient::new(StacCatalog::PlanetaryComputer, StacClientOptions::default())
        .expect("failed to create client");

    let items = client.search_all(&farm_params()).await.expect("search failed");
    assert!(!items.is_empty(), "should find at least one item");

    let asset = items[0].asset("B08").expect("PC items carry B08");
    let signed = client.sign_href(&asset.href).await.expect("signing failed");
    assert!(signed.starts_with(&asset.href));
    assert!(signed.contains("sig="), "signed URL should carry a SAS token");
}

/// Read the plot window of one red band asset by range requests.
#[tokio::test]
#[ignore]
async fn stac_red_band_window_by_ranges() {
    let client = StacClient::new(StacCatalog::EarthSearch, StacClientOptions::default())
        .expect("failed to create client");
    let items = client.search_all(&farm_params()).await.expect("search failed");
    let item = items.first().expect("at least one item");
    let asset = item.asset("red").expect("Earth Search items carry red");

    let crs = CRS::from_epsg(item.epsg().expect("item projection"));
    let window = Roi::demo_farm().reproject(crs).unwrap().bbox().expand(20.0);
    let http = HttpClient::new(Duration::from_secs(30), 2).unwrap();

    match read_window::<u16>(&http, &asset.href, &window).await.expect("windowed read") {
        WindowRead::Raster(raster) => {
            assert!(raster.rows() < 64 && raster.cols() < 64, "only the plot window");
            assert!(raster.data().iter().any(|&dn| dn > 0));
        }
        other => panic!("expected a tiled read, got {:?}", other),
    }
}

/// Load one window of scenes through the blocking catalog.
#[test]
#[ignore]
fn stac_catalog_loads_cropped_scenes() {
    let catalog = StacImageryCatalog::new(StacCatalogOptions {
        max_items: 2,
        ..Default::default()
    })
    .expect("failed to create catalog");

    let roi = Roi::demo_farm();
    let query = CatalogQuery::new(
        &roi,
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
    );
    let scenes = catalog.search(&query).expect("search failed");
    assert!(!scenes.is_empty());

    for scene in &scenes {
        let red = scene.band(Band::Red).expect("red band");
        assert!(red.rows() < 64 && red.cols() < 64, "scene should be cropped");
        for band in Band::ALL {
            let raster = scene.band(band).expect("all six bands");
            assert_eq!(raster.shape(), red.shape(), "{:?} not on the red grid", band);
        }
    }
}

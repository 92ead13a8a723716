//! Catalog query stage: one request per window, failing soft

use cropscan_core::{CatalogQuery, ImageryCatalog, MultiBandImage, Roi};
use tracing::{debug, warn};

use crate::window::DateWindow;

/// Imagery available for one window
#[derive(Debug, Clone)]
pub enum WindowImagery {
    /// At least one scene passed the filters
    Found(Vec<MultiBandImage>),
    /// No scene, or the catalog failed transiently
    Empty,
}

impl WindowImagery {
    pub fn is_empty(&self) -> bool {
        matches!(self, WindowImagery::Empty)
    }
}

/// Ask `catalog` for scenes over `roi` in `window`.
///
/// Scene-level cloud cover is re-checked against `max_cloud_cover` in case
/// the catalog ignored the filter. Scenes come back in acquisition order,
/// so the first one fixes the composite grid. Transient catalog errors are logged and
/// reported as [`WindowImagery::Empty`]; anything else is returned.
pub fn query_window<C: ImageryCatalog + ?Sized>(
    catalog: &C,
    roi: &Roi,
    window: &DateWindow,
    max_cloud_cover: f64,
) -> cropscan_core::Result<WindowImagery> {
    let query = CatalogQuery::new(roi, window.start, window.end).max_cloud_cover(max_cloud_cover);

    let scenes = match catalog.search(&query) {
        Ok(scenes) => scenes,
        Err(e) if e.is_transient() => {
            warn!("{} query for {} failed, window left empty: {}", catalog.name(), window, e);
            return Ok(WindowImagery::Empty);
        }
        Err(e) => return Err(e),
    };

    let total = scenes.len();
    let mut kept: Vec<MultiBandImage> = scenes
        .into_iter()
        .filter(|scene| query.accepts_cloud_cover(scene.cloud_cover()))
        .collect();
    kept.sort_by(|a, b| a.acquired().cmp(&b.acquired()));
    debug!("{}: {} scene(s), {} under cloud threshold", window, total, kept.len());

    if kept.is_empty() {
        Ok(WindowImagery::Empty)
    } else {
        Ok(WindowImagery::Found(kept))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cropscan_core::Error;

    enum Stub {
        Scenes(Vec<f64>),
        Transient,
        Fatal,
    }

    impl ImageryCatalog for Stub {
        fn name(&self) -> &str {
            "stub"
        }

        fn search(&self, _query: &CatalogQuery<'_>) -> cropscan_core::Result<Vec<MultiBandImage>> {
            match self {
                Stub::Scenes(covers) => Ok(covers
                    .iter()
                    .enumerate()
                    .map(|(i, cc)| {
                        MultiBandImage::new(format!("scene-{i}"))
                            .with_acquired(format!("2024-01-0{}T05:20:31Z", 5 - i))
                            .with_cloud_cover(*cc)
                    })
                    .collect()),
                Stub::Transient => Err(Error::Catalog("HTTP 503".into())),
                Stub::Fatal => Err(Error::InvalidRoi("degenerate".into())),
            }
        }
    }

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn cloudy_scenes_are_dropped() {
        let roi = Roi::demo_farm();
        let result = query_window(&Stub::Scenes(vec![12.0, 30.0, 80.0]), &roi, &window(), 30.0).unwrap();
        match result {
            WindowImagery::Found(scenes) => {
                assert_eq!(scenes.len(), 1);
                assert_eq!(scenes[0].id(), "scene-0");
            }
            WindowImagery::Empty => panic!("expected one scene"),
        }
    }

    #[test]
    fn scenes_come_back_in_acquisition_order() {
        let roi = Roi::demo_farm();
        let result = query_window(&Stub::Scenes(vec![5.0, 10.0, 15.0]), &roi, &window(), 30.0).unwrap();
        match result {
            WindowImagery::Found(scenes) => {
                let ids: Vec<_> = scenes.iter().map(MultiBandImage::id).collect();
                assert_eq!(ids, ["scene-2", "scene-1", "scene-0"]);
                assert_eq!(scenes[0].acquired(), Some("2024-01-03T05:20:31Z"));
            }
            WindowImagery::Empty => panic!("expected three scenes"),
        }
    }

    #[test]
    fn all_cloudy_is_empty() {
        let roi = Roi::demo_farm();
        let result = query_window(&Stub::Scenes(vec![55.0]), &roi, &window(), 30.0).unwrap();
        assert!(result.is_empty());
        let none = query_window(&Stub::Scenes(vec![]), &roi, &window(), 30.0).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn transient_failure_is_empty() {
        let roi = Roi::demo_farm();
        assert!(query_window(&Stub::Transient, &roi, &window(), 30.0).unwrap().is_empty());
    }

    #[test]
    fn fatal_failure_propagates() {
        let roi = Roi::demo_farm();
        assert!(matches!(
            query_window(&Stub::Fatal, &roi, &window(), 30.0),
            Err(Error::InvalidRoi(_))
        ));
    }
}

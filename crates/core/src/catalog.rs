//! The seam between the time-series engine and an imagery provider.

use chrono::NaiveDate;

use crate::error::Result;
use crate::image::MultiBandImage;
use crate::vector::Roi;

/// Cloud cover ceiling used unless configured otherwise (percent)
pub const DEFAULT_MAX_CLOUD_COVER: f64 = 30.0;

/// One catalog request: scenes over `roi` acquired in `[start, end)`.
#[derive(Debug, Clone, Copy)]
pub struct CatalogQuery<'a> {
    pub roi: &'a Roi,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Scenes must have cloud cover strictly below this percentage
    pub max_cloud_cover: f64,
}

impl<'a> CatalogQuery<'a> {
    pub fn new(roi: &'a Roi, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            roi,
            start,
            end,
            max_cloud_cover: DEFAULT_MAX_CLOUD_COVER,
        }
    }

    pub fn max_cloud_cover(mut self, percent: f64) -> Self {
        self.max_cloud_cover = percent;
        self
    }

    /// STAC-style closed datetime interval covering `[start, end)`.
    ///
    /// The end bound is the last millisecond before `end`, the resolution
    /// catalogs report acquisition times at.
    pub fn datetime_range(&self) -> String {
        format!(
            "{}T00:00:00Z/{}T23:59:59.999Z",
            self.start.format("%Y-%m-%d"),
            self.end.pred_opt().unwrap_or(self.end).format("%Y-%m-%d")
        )
    }

    /// Whether a scene's cloud cover passes this query's threshold
    pub fn accepts_cloud_cover(&self, cloud_cover: Option<f64>) -> bool {
        cloud_cover.map_or(true, |cc| cc < self.max_cloud_cover)
    }
}

/// A source of multi-band scenes.
///
/// Implementations are created once by the caller and handed to the
/// pipeline by reference. They return every scene matching the query,
/// already cropped to the region and with all bands on one grid. An empty
/// vector means "no imagery" and is not an error.
///
/// Errors for which [`crate::Error::is_transient`] holds are absorbed per
/// window by the pipeline; anything else aborts the run.
pub trait ImageryCatalog {
    /// Short name used in log lines
    fn name(&self) -> &str;

    fn search(&self, query: &CatalogQuery<'_>) -> Result<Vec<MultiBandImage>>;
}

impl<C: ImageryCatalog + ?Sized> ImageryCatalog for &C {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn search(&self, query: &CatalogQuery<'_>) -> Result<Vec<MultiBandImage>> {
        (**self).search(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn datetime_range_excludes_end_day() {
        let roi = Roi::demo_farm();
        let q = CatalogQuery::new(&roi, date(2024, 1, 1), date(2024, 1, 6));
        assert_eq!(q.datetime_range(), "2024-01-01T00:00:00Z/2024-01-05T23:59:59.999Z");
    }

    #[test]
    fn datetime_range_keeps_last_second_of_the_day() {
        let roi = Roi::demo_farm();
        let q = CatalogQuery::new(&roi, date(2024, 1, 1), date(2024, 1, 6));
        let range = q.datetime_range();
        let (_, end) = range.split_once('/').unwrap();
        let end = chrono::DateTime::parse_from_rfc3339(end).unwrap();
        let late = chrono::DateTime::parse_from_rfc3339("2024-01-05T23:59:59.512Z").unwrap();
        let next_day = chrono::DateTime::parse_from_rfc3339("2024-01-06T00:00:00Z").unwrap();
        assert!(late <= end);
        assert!(next_day > end);
    }

    #[test]
    fn cloud_threshold_is_strict() {
        let roi = Roi::demo_farm();
        let q = CatalogQuery::new(&roi, date(2024, 1, 1), date(2024, 1, 6));
        assert!(q.accepts_cloud_cover(Some(29.9)));
        assert!(!q.accepts_cloud_cover(Some(30.0)));
        assert!(q.accepts_cloud_cover(None));
        assert!(!q.max_cloud_cover(10.0).accepts_cloud_cover(Some(12.0)));
    }
}

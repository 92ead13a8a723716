//! Pipeline driver: windows → catalog → composite → reduce → records

use chrono::NaiveDate;
use cropscan_algorithms::imagery::composite_indices;
use cropscan_algorithms::statistics::reduce_region;
use cropscan_core::{ImageryCatalog, Roi};
use tracing::{debug, info};

use crate::assembler::{assemble, empty_record};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::query::{query_window, WindowImagery};
use crate::record::{IndexRecord, WindowStatistic};
use crate::window::{windows, DateWindow, Windows};

/// Runs the index time series for a region against one catalog.
///
/// The catalog is borrowed for the pipeline's lifetime. Windows are processed
/// sequentially and records come out in window order.
///
/// # Example
///
/// ```ignore
/// let catalog = StacImageryCatalog::new(StacCatalogOptions::default())?;
/// let pipeline = IndexPipeline::new(&catalog, PipelineConfig::default())?;
/// let records = pipeline.run(&Roi::demo_farm(), start, end)?;
/// ```
pub struct IndexPipeline<'a, C: ImageryCatalog + ?Sized> {
    catalog: &'a C,
    config: PipelineConfig,
}

impl<'a, C: ImageryCatalog + ?Sized> IndexPipeline<'a, C> {
    /// Fails with [`crate::PipelineError::Config`] on invalid configuration.
    pub fn new(catalog: &'a C, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { catalog, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Windows this pipeline would process for `[start, end)`
    pub fn windows(&self, start: NaiveDate, end: NaiveDate) -> Windows {
        windows(start, end, self.config.step_days)
    }

    /// Produce the record for a single window.
    ///
    /// A window without usable imagery yields an all-null record.
    pub fn process_window(&self, roi: &Roi, window: &DateWindow) -> Result<IndexRecord> {
        let scenes = match query_window(self.catalog, roi, window, self.config.max_cloud_cover)? {
            WindowImagery::Found(scenes) => scenes,
            WindowImagery::Empty => {
                debug!("{}: no imagery", window);
                return Ok(empty_record(window));
            }
        };

        let composite = composite_indices(&scenes)?;
        let params = self.config.reduce_params();
        let statistics = composite
            .iter()
            .map(|(index, layer)| {
                reduce_region(layer, roi, &params).map(|stats| (index, WindowStatistic::from(stats)))
            })
            .collect::<cropscan_core::Result<Vec<_>>>()?;

        Ok(assemble(window, statistics))
    }

    /// Run every window of `[start, end)`.
    pub fn run(&self, roi: &Roi, start: NaiveDate, end: NaiveDate) -> Result<Vec<IndexRecord>> {
        self.run_with(roi, start, end, |_, _| {})
    }

    /// Like [`run`](Self::run), calling `on_record` after each window.
    pub fn run_with<F>(
        &self,
        roi: &Roi,
        start: NaiveDate,
        end: NaiveDate,
        mut on_record: F,
    ) -> Result<Vec<IndexRecord>>
    where
        F: FnMut(&DateWindow, &IndexRecord),
    {
        let windows = self.windows(start, end);
        info!(
            "Processing {} window(s) of {} day(s) from {} to {} via {}",
            windows.len(),
            self.config.step_days,
            start,
            end,
            self.catalog.name()
        );

        let mut records = Vec::with_capacity(windows.len());
        for window in windows {
            let record = self.process_window(roi, &window)?;
            on_record(&window, &record);
            records.push(record);
        }

        let filled = records.iter().filter(|r| !r.is_empty()).count();
        info!("{} record(s), {} with data", records.len(), filled);
        Ok(records)
    }
}

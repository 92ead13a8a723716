//! # cropscan timeseries
//!
//! Turns a region and a date range into an ordered series of per-window
//! spectral index records.
//!
//! The range is cut into fixed-width [`DateWindow`]s. For each window the
//! [`IndexPipeline`] asks an [`ImageryCatalog`](cropscan_core::ImageryCatalog)
//! for scenes, composites the six indices, reduces them over the region and
//! assembles an [`IndexRecord`]. Windows without imagery still produce a
//! record, with null statistics.
//!
//! Records can be written through a [`RecordSink`] as a flat CSV table or as
//! nested JSON lines. An existing table is extended with [`update_range`].

pub mod assembler;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod record;
pub mod sink;
pub mod update;
pub mod window;

pub use assembler::{assemble, empty_record};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::IndexPipeline;
pub use query::{query_window, WindowImagery};
pub use record::{FlatRow, IndexRecord, IndexSeries, SeriesPoint, WindowStatistic};
pub use sink::{latest_date, read_csv, CsvSink, JsonLinesSink, RecordSink};
pub use update::{default_start, trim_trailing_empty, update_range, DEFAULT_RANGE_DAYS};
pub use window::{windows, DateWindow, Windows};

//! Per-window index records and their flat and per-index views

use std::collections::BTreeMap;

use cropscan_algorithms::imagery::SpectralIndex;
use cropscan_algorithms::statistics::RegionStats;
use serde::{Deserialize, Serialize};

/// Mean/min/max of one index over the region for one window.
///
/// All three are `None` when the window had no usable pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowStatistic {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl WindowStatistic {
    pub fn is_empty(&self) -> bool {
        self.mean.is_none() && self.min.is_none() && self.max.is_none()
    }
}

impl From<RegionStats> for WindowStatistic {
    fn from(stats: RegionStats) -> Self {
        Self {
            mean: stats.mean,
            min: stats.min,
            max: stats.max,
        }
    }
}

/// One row of the time series.
///
/// Serialized as `{"date": "2024-01-01", "indices": {"NDVI": {...}, ...}}`.
/// Records built through [`IndexRecord::new`] always carry all six indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Window start, `YYYY-MM-DD`
    pub date: String,
    pub indices: BTreeMap<SpectralIndex, WindowStatistic>,
}

impl IndexRecord {
    /// A record with every index present and empty
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            indices: SpectralIndex::ALL
                .into_iter()
                .map(|index| (index, WindowStatistic::default()))
                .collect(),
        }
    }

    pub fn set(&mut self, index: SpectralIndex, stat: WindowStatistic) {
        self.indices.insert(index, stat);
    }

    /// Statistic for `index`, empty if absent
    pub fn get(&self, index: SpectralIndex) -> WindowStatistic {
        self.indices.get(&index).copied().unwrap_or_default()
    }

    /// Whether no index has any value
    pub fn is_empty(&self) -> bool {
        self.indices.values().all(WindowStatistic::is_empty)
    }
}

/// Table form of an [`IndexRecord`]: `date` plus `<index>_{mean,min,max}`
/// for all six indices. Empty cells are nulls.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlatRow {
    pub date: String,
    pub ndvi_mean: Option<f64>,
    pub ndvi_min: Option<f64>,
    pub ndvi_max: Option<f64>,
    pub gndvi_mean: Option<f64>,
    pub gndvi_min: Option<f64>,
    pub gndvi_max: Option<f64>,
    pub ndmi_mean: Option<f64>,
    pub ndmi_min: Option<f64>,
    pub ndmi_max: Option<f64>,
    pub dswi_mean: Option<f64>,
    pub dswi_min: Option<f64>,
    pub dswi_max: Option<f64>,
    pub ndni_mean: Option<f64>,
    pub ndni_min: Option<f64>,
    pub ndni_max: Option<f64>,
    pub evi2_mean: Option<f64>,
    pub evi2_min: Option<f64>,
    pub evi2_max: Option<f64>,
}

impl FlatRow {
    /// Column names in table order
    pub const COLUMNS: [&'static str; 19] = [
        "date",
        "ndvi_mean",
        "ndvi_min",
        "ndvi_max",
        "gndvi_mean",
        "gndvi_min",
        "gndvi_max",
        "ndmi_mean",
        "ndmi_min",
        "ndmi_max",
        "dswi_mean",
        "dswi_min",
        "dswi_max",
        "ndni_mean",
        "ndni_min",
        "ndni_max",
        "evi2_mean",
        "evi2_min",
        "evi2_max",
    ];

    fn slots_mut(&mut self, index: SpectralIndex) -> [&mut Option<f64>; 3] {
        match index {
            SpectralIndex::Ndvi => [&mut self.ndvi_mean, &mut self.ndvi_min, &mut self.ndvi_max],
            SpectralIndex::Gndvi => [&mut self.gndvi_mean, &mut self.gndvi_min, &mut self.gndvi_max],
            SpectralIndex::Ndmi => [&mut self.ndmi_mean, &mut self.ndmi_min, &mut self.ndmi_max],
            SpectralIndex::Dswi => [&mut self.dswi_mean, &mut self.dswi_min, &mut self.dswi_max],
            SpectralIndex::Ndni => [&mut self.ndni_mean, &mut self.ndni_min, &mut self.ndni_max],
            SpectralIndex::Evi2 => [&mut self.evi2_mean, &mut self.evi2_min, &mut self.evi2_max],
        }
    }

    pub fn statistic(&self, index: SpectralIndex) -> WindowStatistic {
        let (mean, min, max) = match index {
            SpectralIndex::Ndvi => (self.ndvi_mean, self.ndvi_min, self.ndvi_max),
            SpectralIndex::Gndvi => (self.gndvi_mean, self.gndvi_min, self.gndvi_max),
            SpectralIndex::Ndmi => (self.ndmi_mean, self.ndmi_min, self.ndmi_max),
            SpectralIndex::Dswi => (self.dswi_mean, self.dswi_min, self.dswi_max),
            SpectralIndex::Ndni => (self.ndni_mean, self.ndni_min, self.ndni_max),
            SpectralIndex::Evi2 => (self.evi2_mean, self.evi2_min, self.evi2_max),
        };
        WindowStatistic { mean, min, max }
    }
}

impl From<&IndexRecord> for FlatRow {
    fn from(record: &IndexRecord) -> Self {
        let mut row = FlatRow {
            date: record.date.clone(),
            ..Default::default()
        };
        for index in SpectralIndex::ALL {
            let stat = record.get(index);
            let [mean, min, max] = row.slots_mut(index);
            *mean = stat.mean;
            *min = stat.min;
            *max = stat.max;
        }
        row
    }
}

impl From<&FlatRow> for IndexRecord {
    fn from(row: &FlatRow) -> Self {
        let mut record = IndexRecord::new(row.date.clone());
        for index in SpectralIndex::ALL {
            record.set(index, row.statistic(index));
        }
        record
    }
}

/// One point of an [`IndexSeries`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: String,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// The sub-series of a single index, in record order (for charting)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSeries {
    pub index: SpectralIndex,
    pub points: Vec<SeriesPoint>,
}

impl IndexSeries {
    pub fn from_records(records: &[IndexRecord], index: SpectralIndex) -> Self {
        let points = records
            .iter()
            .map(|record| {
                let stat = record.get(index);
                SeriesPoint {
                    date: record.date.clone(),
                    mean: stat.mean,
                    min: stat.min,
                    max: stat.max,
                }
            })
            .collect();
        Self { index, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

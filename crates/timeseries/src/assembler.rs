//! Record assembly

use cropscan_algorithms::imagery::SpectralIndex;

use crate::record::{IndexRecord, WindowStatistic};
use crate::window::DateWindow;

/// Build the record for `window` from whatever statistics were produced.
///
/// Indices without a statistic are kept with all-null values.
pub fn assemble<I>(window: &DateWindow, statistics: I) -> IndexRecord
where
    I: IntoIterator<Item = (SpectralIndex, WindowStatistic)>,
{
    let mut record = IndexRecord::new(window.label());
    for (index, stat) in statistics {
        record.set(index, stat);
    }
    record
}

/// Record for a window without usable imagery
pub fn empty_record(window: &DateWindow) -> IndexRecord {
    IndexRecord::new(window.label())
}

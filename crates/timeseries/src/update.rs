//! Incremental extension of an existing table

use chrono::{Days, NaiveDate};

use crate::error::{PipelineError, Result};
use crate::record::{FlatRow, IndexRecord};
use crate::sink::latest_date;

/// Length of the range used when nothing narrower is known
pub const DEFAULT_RANGE_DAYS: u64 = 30;

/// `DEFAULT_RANGE_DAYS` before `end`
pub fn default_start(end: NaiveDate) -> Result<NaiveDate> {
    end.checked_sub_days(Days::new(DEFAULT_RANGE_DAYS))
        .ok_or_else(|| PipelineError::Config(format!("end date {} out of range", end)))
}

/// Range still missing from a table whose windows are `step_days` wide.
///
/// Starts one window after the latest stored date, or `DEFAULT_RANGE_DAYS`
/// before `end` for an empty table. `None` when the table is already
/// up to date.
pub fn update_range(
    rows: &[FlatRow],
    end: NaiveDate,
    step_days: u32,
) -> Result<Option<(NaiveDate, NaiveDate)>> {
    let start = match latest_date(rows)? {
        Some(latest) => latest
            .checked_add_days(Days::new(u64::from(step_days)))
            .ok_or_else(|| PipelineError::Config(format!("latest date {} out of range", latest)))?,
        None => default_start(end)?,
    };
    Ok((start < end).then_some((start, end)))
}

/// Drop empty records at the end of the series.
///
/// Recent windows may have no imagery only because it is not ingested yet;
/// leaving them out keeps them eligible for the next update. Empty windows
/// followed by data stay in place.
pub fn trim_trailing_empty(records: &mut Vec<IndexRecord>) {
    let keep = records
        .iter()
        .rposition(|record| !record.is_empty())
        .map_or(0, |last| last + 1);
    records.truncate(keep);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::WindowStatistic;
    use cropscan_algorithms::imagery::SpectralIndex;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(date: &str) -> FlatRow {
        FlatRow {
            date: date.into(),
            ..Default::default()
        }
    }

    fn record(date: &str, ndvi: Option<f64>) -> IndexRecord {
        let mut r = IndexRecord::new(date);
        r.set(
            SpectralIndex::Ndvi,
            WindowStatistic {
                mean: ndvi,
                min: ndvi,
                max: ndvi,
            },
        );
        r
    }

    #[test]
    fn resumes_one_window_after_latest() {
        let rows = vec![row("2024-01-01"), row("2024-01-06")];
        assert_eq!(
            update_range(&rows, date(2024, 1, 31), 5).unwrap(),
            Some((date(2024, 1, 11), date(2024, 1, 31)))
        );
    }

    #[test]
    fn empty_table_uses_default_range() {
        assert_eq!(
            update_range(&[], date(2024, 1, 31), 5).unwrap(),
            Some((date(2024, 1, 1), date(2024, 1, 31)))
        );
    }

    #[test]
    fn up_to_date_table_needs_nothing() {
        let rows = vec![row("2024-01-26")];
        assert_eq!(update_range(&rows, date(2024, 1, 31), 5).unwrap(), None);
        assert_eq!(update_range(&rows, date(2024, 1, 28), 5).unwrap(), None);
    }

    #[test]
    fn bad_table_date_is_an_error() {
        let rows = vec![row("26.01.2024")];
        assert!(matches!(
            update_range(&rows, date(2024, 1, 31), 5),
            Err(PipelineError::Sink(_))
        ));
    }

    #[test]
    fn trailing_empty_records_are_dropped() {
        let mut records = vec![
            record("2024-01-01", Some(0.6)),
            record("2024-01-06", None),
            record("2024-01-11", Some(0.5)),
            record("2024-01-16", None),
            record("2024-01-21", None),
        ];
        trim_trailing_empty(&mut records);
        let dates: Vec<_> = records.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, ["2024-01-01", "2024-01-06", "2024-01-11"]);
    }

    #[test]
    fn all_empty_records_leave_nothing() {
        let mut records = vec![record("2024-01-01", None), record("2024-01-06", None)];
        trim_trailing_empty(&mut records);
        assert!(records.is_empty());
    }
}

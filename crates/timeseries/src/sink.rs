//! Record sinks and reading back existing tables

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{PipelineError, Result};
use crate::record::{FlatRow, IndexRecord};

/// Destination for assembled records
pub trait RecordSink {
    /// Persist `records` after anything already written
    fn write(&mut self, records: &[IndexRecord]) -> Result<()>;
}

impl RecordSink for Vec<IndexRecord> {
    fn write(&mut self, records: &[IndexRecord]) -> Result<()> {
        self.extend_from_slice(records);
        Ok(())
    }
}

/// Appends flat rows to a CSV file.
///
/// The header is written only when the file is new or empty, so repeated
/// writes grow one table.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvSink {
    fn write(&mut self, records: &[IndexRecord]) -> Result<()> {
        let needs_header = std::fs::metadata(&self.path).map_or(true, |m| m.len() == 0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        for record in records {
            wtr.serialize(FlatRow::from(record))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Writes one nested JSON record per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write(&mut self, records: &[IndexRecord]) -> Result<()> {
        for record in records {
            serde_json::to_writer(&mut self.writer, record)?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Read every row of a flat CSV table
pub fn read_csv(path: &Path) -> Result<Vec<FlatRow>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let rows = rdr.deserialize().collect::<std::result::Result<Vec<FlatRow>, _>>()?;
    Ok(rows)
}

/// Latest `date` among `rows`.
///
/// Fails if any date is not `YYYY-MM-DD`.
pub fn latest_date(rows: &[FlatRow]) -> Result<Option<NaiveDate>> {
    let mut latest = None;
    for row in rows {
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
            PipelineError::Sink(format!("invalid date '{}' in table: {}", row.date, e))
        })?;
        latest = latest.max(Some(date));
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::WindowStatistic;
    use cropscan_algorithms::imagery::SpectralIndex;

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
    fn csv_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indices.csv");
        let mut sink = CsvSink::new(&path);

        sink.write(&[record("2024-01-01", Some(0.6667))]).unwrap();
        sink.write(&[record("2024-01-06", None)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(text.lines().filter(|l| l.starts_with("date,")).count(), 1);
    }

    #[test]
    fn csv_round_trip_preserves_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indices.csv");
        let records = vec![record("2024-01-01", Some(0.6667)), record("2024-01-06", None)];
        CsvSink::new(&path).write(&records).unwrap();

        let rows = read_csv(&path).unwrap();
        let back: Vec<IndexRecord> = rows.iter().map(IndexRecord::from).collect();
        assert_eq!(back, records);
        assert_eq!(rows[1].ndvi_mean, None);
    }

    #[test]
    fn empty_existing_file_gets_header() {
        let file = tempfile::NamedTempFile::new().unwrap();
        CsvSink::new(file.path())
            .write(&[record("2024-01-01", Some(0.5))])
            .unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.starts_with("date,ndvi_mean,"));
    }

    #[test]
    fn json_lines_one_record_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.write(&[record("2024-01-01", Some(0.5)), record("2024-01-06", None)])
            .unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: IndexRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.date, "2024-01-06");
        assert!(second.is_empty());
    }

    #[test]
    fn latest_date_of_table() {
        let rows = vec![
            FlatRow::from(&record("2024-01-06", None)),
            FlatRow::from(&record("2024-01-16", None)),
            FlatRow::from(&record("2024-01-11", None)),
        ];
        assert_eq!(
            latest_date(&rows).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 16)
        );
        assert_eq!(latest_date(&[]).unwrap(), None);

        let bad = vec![FlatRow {
            date: "16/01/2024".into(),
            ..Default::default()
        }];
        assert!(matches!(latest_date(&bad), Err(PipelineError::Sink(_))));
    }
}

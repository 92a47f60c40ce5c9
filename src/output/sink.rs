//! Record sinks and history reload.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::domain::StepRecord;
use crate::error::DriverError;
use crate::output::VariableLayout;

/// Append-only destination for committed records.
pub trait OutputSink {
    fn write(&mut self, record: &StepRecord) -> Result<(), DriverError>;

    /// Flush and close. Called once, after the last record.
    fn finish(&mut self) -> Result<(), DriverError>;
}

/// CSV file sink: one header row, one row per record.
pub struct CsvSink {
    path: PathBuf,
    width: usize,
    writer: Option<csv::Writer<File>>,
}

impl CsvSink {
    pub fn create(path: &Path, layout: &VariableLayout) -> Result<Self, DriverError> {
        let file = File::create(path)
            .map_err(|e| DriverError::Io(format!("failed to create '{}': {e}", path.display())))?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(layout.header())?;
        Ok(Self {
            path: path.to_path_buf(),
            width: layout.width(),
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for CsvSink {
    fn write(&mut self, record: &StepRecord) -> Result<(), DriverError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(DriverError::Io(format!("'{}' is already closed", self.path.display())));
        };
        let row = record.flattened();
        if row.len() != self.width {
            return Err(DriverError::Io(format!(
                "record has {} values, header has {}",
                row.len(),
                self.width
            )));
        }
        writer.write_record(row.iter().map(|v| v.to_string()))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), DriverError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// In-memory sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    header: Vec<String>,
    records: Vec<StepRecord>,
    finished: bool,
}

impl MemorySink {
    pub fn new(layout: &VariableLayout) -> Self {
        Self {
            header: layout.header(),
            records: Vec::new(),
            finished: false,
        }
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Snapshot as a column-addressable table.
    pub fn history(&self) -> History {
        History {
            header: self.header.clone(),
            rows: self.records.iter().map(StepRecord::flattened).collect(),
        }
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, record: &StepRecord) -> Result<(), DriverError> {
        if self.finished {
            return Err(DriverError::Io("write after finish".to_string()));
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), DriverError> {
        self.finished = true;
        Ok(())
    }
}

/// A reloaded output table.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    pub header: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl History {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// The final row, if any.
    pub fn last(&self, name: &str) -> Option<f64> {
        let idx = self.column_index(name)?;
        self.rows.last().map(|r| r[idx])
    }
}

/// Reload a CSV written by [`CsvSink`].
pub fn read_history_csv(path: &Path) -> Result<History, DriverError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| DriverError::Io(format!("failed to open '{}': {e}", path.display())))?;
    let header: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let row: Result<Vec<f64>, _> = record.iter().map(|v| v.trim().parse::<f64>()).collect();
        let row = row.map_err(|e| DriverError::Io(format!("row {}: {e}", line + 2)))?;
        if row.len() != header.len() {
            return Err(DriverError::Io(format!(
                "row {} has {} values, header has {}",
                line + 2,
                row.len(),
                header.len()
            )));
        }
        rows.push(row);
    }
    Ok(History { header, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DriverState, StepOutcome};
    use crate::material::LinearElastic;
    use crate::output::solid_record;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mps-sink-{}-{name}.csv", std::process::id()))
    }

    #[test]
    fn csv_sink_round_trips_through_reader() {
        let mat = LinearElastic::new(10.0, 5.0).unwrap();
        let layout = VariableLayout::solid(&mat);
        let path = temp_path("roundtrip");

        let mut state = DriverState::new(&mat);
        let mut sink = CsvSink::create(&path, &layout).unwrap();
        sink.write(&solid_record(&state, 0.0, 0, &StepOutcome::default())).unwrap();
        state.time = 0.5;
        state.stress[0] = 1.25e-3;
        state.step = 1;
        sink.write(&solid_record(&state, 0.5, 1, &StepOutcome::default())).unwrap();
        sink.finish().unwrap();

        let history = read_history_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(history.header, layout.header());
        assert_eq!(history.rows.len(), 2);
        assert_eq!(history.column("time").unwrap(), vec![0.0, 0.5]);
        assert_eq!(history.last("STRESS_XX"), Some(1.25e-3));
        assert_eq!(history.last("STEP_NUM"), Some(1.0));
    }

    #[test]
    fn closed_sinks_reject_writes() {
        let mat = LinearElastic::new(10.0, 5.0).unwrap();
        let layout = VariableLayout::solid(&mat);
        let record = solid_record(&DriverState::new(&mat), 0.0, 0, &StepOutcome::default());

        let mut mem = MemorySink::new(&layout);
        mem.write(&record).unwrap();
        mem.finish().unwrap();
        assert!(mem.is_finished());
        assert!(matches!(mem.write(&record), Err(DriverError::Io(_))));

        let path = temp_path("closed");
        let mut csv = CsvSink::create(&path, &layout).unwrap();
        csv.finish().unwrap();
        assert!(csv.write(&record).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn unreadable_history_is_an_io_error() {
        let err = read_history_csv(Path::new("/nonexistent/mps/history.csv")).unwrap_err();
        assert!(matches!(err, DriverError::Io(_)));
    }
}

//! Spreadsheet snapshot persistence for the shipment record list.
//!
//! Every save rewrites the whole workbook; there is no incremental update,
//! backup or atomic replace. Loading reads the first sheet by column position.

mod reader;
mod writer;

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use shipment_tracker_core::{Record, COLUMNS};

/// File the tracker reads and writes when no other path is configured.
pub const DEFAULT_FILE_NAME: &str = "inventory_data.xlsx";

pub const SHEET_NAME: &str = "Inventory Data";

#[derive(Debug, thiserror::Error)]
pub enum WorkbookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Excel parse error: {0}")]
    Calamine(#[from] calamine::Error),
    #[error("malformed row {row}, column {column}: {reason}")]
    Malformed { row: usize, column: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(Vec<Record>),
    /// No file at the configured path yet.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookFile {
    path: PathBuf,
}

impl WorkbookFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the workbook with `records`, header row first.
    ///
    /// # Errors
    /// Returns [`WorkbookError::Io`] when the path cannot be created or
    /// written, and [`WorkbookError::Zip`] when the package cannot be built.
    pub fn persist(&self, records: &[Record]) -> Result<(), WorkbookError> {
        let rows = records.iter().map(writer::record_cells).collect::<Vec<_>>();
        let file = File::create(&self.path)?;
        let mut out = writer::write_workbook(BufWriter::new(file), &COLUMNS, &rows)?;
        out.flush()?;

        tracing::debug!("wrote {} records to {}", records.len(), self.path.display());
        Ok(())
    }

    /// Read the snapshot back in file order.
    ///
    /// # Errors
    /// Returns [`WorkbookError::Calamine`] when the file is not a readable
    /// workbook and [`WorkbookError::Malformed`] when a data cell cannot be
    /// decoded for its column. A missing file is not an error.
    pub fn load(&self) -> Result<LoadOutcome, WorkbookError> {
        match fs::metadata(&self.path) {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("no workbook at {}", self.path.display());
                return Ok(LoadOutcome::Missing);
            }
            Err(err) => return Err(err.into()),
        }

        let records = reader::read_records(&self.path)?;
        tracing::debug!("read {} records from {}", records.len(), self.path.display());
        Ok(LoadOutcome::Loaded(records))
    }
}

impl Default for WorkbookFile {
    fn default() -> Self {
        Self::new(DEFAULT_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use calamine::{open_workbook_auto, Data, Reader};
    use proptest::prelude::*;
    use shipment_tracker_core::{DeliveryStatus, RecordStore, Timestamp, TrackerError};

    use super::*;
    use crate::writer::Cell;

    fn at(value: &str) -> Timestamp {
        Timestamp::parse(value).unwrap_or_else(|| panic!("invalid fixture timestamp {value}"))
    }

    fn sample_store() -> RecordStore {
        let mut store = RecordStore::new();
        for id in ["TRK1", "A&B <fragile>", "0042"] {
            if let Err(err) = store.add(id, at("2024-03-14 09:30:00")) {
                panic!("fixture add failed: {err}");
            }
        }
        if let Err(err) = store.mark_delivered(0, Some(12.5), Some(0.3), at("2024-03-15 17:05:42")) {
            panic!("fixture delivery failed: {err}");
        }
        if let Err(err) = store.mark_delivered(2, Some(0.1), None, at("2024-03-16 08:00:01")) {
            panic!("fixture delivery failed: {err}");
        }
        store
    }

    fn loaded(outcome: LoadOutcome) -> Vec<Record> {
        match outcome {
            LoadOutcome::Loaded(records) => records,
            LoadOutcome::Missing => panic!("expected a workbook to be present"),
        }
    }

    #[test]
    fn persist_then_load_reconstructs_records_field_for_field() -> Result<(), WorkbookError> {
        let dir = tempfile::tempdir()?;
        let file = WorkbookFile::new(dir.path().join("tracking.xlsx"));
        let store = sample_store();

        file.persist(store.records())?;
        let records = loaded(file.load()?);

        assert_eq!(records, store.records());
        Ok(())
    }

    #[test]
    fn missing_file_is_reported_not_failed() -> Result<(), WorkbookError> {
        let dir = tempfile::tempdir()?;
        let file = WorkbookFile::new(dir.path().join("absent.xlsx"));
        assert_eq!(file.load()?, LoadOutcome::Missing);
        Ok(())
    }

    #[test]
    fn persist_overwrites_previous_snapshot() -> Result<(), WorkbookError> {
        let dir = tempfile::tempdir()?;
        let file = WorkbookFile::new(dir.path().join("tracking.xlsx"));
        let store = sample_store();

        file.persist(store.records())?;
        file.persist(&store.records()[..1])?;

        let records = loaded(file.load()?);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tracking_id, "TRK1");

        file.persist(&[])?;
        assert!(loaded(file.load()?).is_empty());
        Ok(())
    }

    #[test]
    fn persist_into_missing_directory_is_an_io_error() -> Result<(), WorkbookError> {
        let dir = tempfile::tempdir()?;
        let file = WorkbookFile::new(dir.path().join("no-such-dir").join("tracking.xlsx"));
        assert!(matches!(file.persist(sample_store().records()), Err(WorkbookError::Io(_))));
        Ok(())
    }

    #[test]
    fn workbook_has_single_named_sheet_with_header_row() -> Result<(), WorkbookError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tracking.xlsx");
        WorkbookFile::new(&path).persist(sample_store().records())?;

        let mut workbook = open_workbook_auto(&path)?;
        assert_eq!(workbook.sheet_names(), vec![SHEET_NAME.to_string()]);
        let range = workbook.worksheet_range(SHEET_NAME)?;
        let header = range
            .rows()
            .next()
            .unwrap_or_else(|| panic!("sheet should have a header row"))
            .iter()
            .map(|cell| match cell {
                Data::String(text) => text.clone(),
                other => format!("{other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(header, COLUMNS.map(str::to_string).to_vec());
        assert_eq!(range.height(), 4);
        Ok(())
    }

    #[test]
    fn legacy_workbook_loads_by_position() -> Result<(), WorkbookError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("legacy.xlsx");
        let legacy_header =
            ["№", "Трек номер", "Статус", "Дата добавления", "Дата изменения", "Вес (кг)", "Куб. м³"];
        let rows = vec![
            vec![
                Cell::Number(1.0),
                Cell::Text("RU001".to_string()),
                Cell::Text("Доставлено".to_string()),
                Cell::Text("2023-11-02 10:00:00".to_string()),
                Cell::Text("2023-11-05 12:30:00".to_string()),
                Cell::Number(3.0),
                Cell::Text(String::new()),
            ],
            vec![
                Cell::Number(2.0),
                Cell::Text("RU002".to_string()),
                Cell::Text("Не доставлено".to_string()),
                Cell::Text("2023-11-03 11:00:00".to_string()),
                Cell::Empty,
                Cell::Empty,
                Cell::Empty,
            ],
        ];
        let bytes = writer::write_workbook(Cursor::new(Vec::new()), &legacy_header, &rows)?;
        fs::write(&path, bytes.into_inner())?;

        let records = loaded(WorkbookFile::new(&path).load()?);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, DeliveryStatus::Delivered);
        assert_eq!(records[0].weight_kg, Some(3.0));
        assert!(records[0].volume_m3.is_none());
        assert_eq!(records[1].status, DeliveryStatus::NotDelivered);
        assert!(records[1].changed_at.is_none());
        Ok(())
    }

    fn tracking_id() -> impl Strategy<Value = String> {
        prop_oneof!["\\PC{1,24}", "[ \\t\\r\\nA-Za-z0-9&<>\"'_]{1,24}"]
    }

    fn measurement() -> impl Strategy<Value = Option<f64>> {
        proptest::option::of(prop_oneof![0.0f64..1.0e6, Just(1.0e-12), Just(f64::MAX)])
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn property_persist_then_load_round_trips(
            entries in proptest::collection::vec(
                (tracking_id(), any::<bool>(), measurement(), measurement()),
                0..12,
            )
        ) {
            let mut store = RecordStore::new();
            for (id, delivered, weight_kg, volume_m3) in &entries {
                match store.add(id, at("2024-03-14 09:30:00")) {
                    Ok(_) => {}
                    Err(TrackerError::EmptyInput) => continue,
                    Err(err) => return Err(TestCaseError::fail(format!("add {id:?}: {err}"))),
                }
                if *delivered {
                    let index = store.len() - 1;
                    store.mark_delivered(index, *weight_kg, *volume_m3, at("2024-03-15 17:05:42"))?;
                }
            }

            let dir = tempfile::tempdir()?;
            let file = WorkbookFile::new(dir.path().join("tracking.xlsx"));
            file.persist(store.records())?;
            let records = loaded(file.load()?);

            prop_assert_eq!(records.as_slice(), store.records());
        }
    }
}

//! Application-facing tracker: the in-memory record list plus the workbook
//! it is mirrored to. Every mutation is followed by a full save before the
//! call returns.

mod capture;
mod form;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use shipment_tracker_core::{
    EditableField, Record, RecordStore, StatusFilter, Timestamp, TrackerError,
};
use shipment_tracker_store_xlsx::{LoadOutcome, WorkbookFile};

pub use capture::{DeliveryCapture, DeliveryPrompt};
pub use form::EditForm;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum LoadNotice {
    Loaded { path: PathBuf, count: usize },
    StartedEmpty { path: PathBuf },
}

impl LoadNotice {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Loaded { path, count } => {
                format!("Loaded {count} records from {}.", path.display())
            }
            Self::StartedEmpty { path } => {
                format!("Workbook {} not found; starting a new tracking list.", path.display())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveNotice {
    pub path: PathBuf,
    pub count: usize,
}

impl SaveNotice {
    #[must_use]
    pub fn message(&self) -> String {
        format!("Saved {} records to {}.", self.count, self.path.display())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum Delivery {
    Delivered(Record),
    /// Informational: the record was delivered earlier and nothing changed.
    AlreadyDelivered(Record),
}

#[derive(Debug)]
pub struct Tracker {
    store: RecordStore,
    file: WorkbookFile,
    last_save: Option<SaveNotice>,
}

impl Tracker {
    /// Load the workbook at `path`, starting empty when it does not exist yet.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or decoded.
    pub fn open(path: impl Into<PathBuf>) -> Result<(Self, LoadNotice)> {
        let file = WorkbookFile::new(path);
        let outcome = file
            .load()
            .with_context(|| format!("failed to load workbook {}", file.path().display()))?;

        let (store, notice) = match outcome {
            LoadOutcome::Loaded(records) => {
                let notice =
                    LoadNotice::Loaded { path: file.path().to_path_buf(), count: records.len() };
                (RecordStore::from_records(records), notice)
            }
            LoadOutcome::Missing => {
                tracing::warn!("workbook {} not found, starting empty", file.path().display());
                (RecordStore::new(), LoadNotice::StartedEmpty { path: file.path().to_path_buf() })
            }
        };

        tracing::info!("{}", notice.message());
        Ok((Self { store, file, last_save: None }, notice))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        self.store.records()
    }

    /// Zero-based position of the record carrying `sequence_number`.
    ///
    /// # Errors
    /// Returns an error when no record has that sequence number.
    pub fn record_index(&self, sequence_number: u32) -> Result<usize> {
        self.store
            .records()
            .iter()
            .position(|record| record.sequence_number == sequence_number)
            .ok_or_else(|| anyhow!("no record with sequence number {sequence_number}"))
    }

    /// Append a tracking number and save. Blank input is silently ignored.
    ///
    /// # Errors
    /// Returns an error when the workbook cannot be written; the record stays
    /// in memory.
    pub fn add(&mut self, tracking_id: &str) -> Result<Option<Record>> {
        let record = match self.store.add(tracking_id, Timestamp::now()).cloned() {
            Ok(record) => record,
            Err(TrackerError::EmptyInput) => {
                tracing::debug!("ignoring blank tracking number");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!("added #{} {}", record.sequence_number, record.tracking_id);
        self.persist()?;
        Ok(Some(record))
    }

    /// Mark one record delivered with whatever measurements were captured.
    ///
    /// # Errors
    /// Returns an error for an unknown sequence number, an invalid
    /// measurement, or a failed save.
    pub fn mark_delivered(
        &mut self,
        sequence_number: u32,
        weight_kg: Option<f64>,
        volume_m3: Option<f64>,
    ) -> Result<Delivery> {
        let index = self.record_index(sequence_number)?;
        let outcome =
            self.store.mark_delivered(index, weight_kg, volume_m3, Timestamp::now()).cloned();
        let record = match outcome {
            Ok(record) => record,
            Err(TrackerError::AlreadyDelivered { .. }) => {
                tracing::info!("record #{sequence_number} is already delivered");
                let record = self
                    .store
                    .get(index)
                    .cloned()
                    .ok_or_else(|| anyhow!("no record with sequence number {sequence_number}"))?;
                return Ok(Delivery::AlreadyDelivered(record));
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            "delivered #{} {} (weight_kg={:?}, volume_m3={:?})",
            record.sequence_number,
            record.tracking_id,
            record.weight_kg,
            record.volume_m3
        );
        self.persist()?;
        Ok(Delivery::Delivered(record))
    }

    /// Finish a delivery whose measurements were gathered through the prompt protocol.
    ///
    /// # Errors
    /// See [`Tracker::mark_delivered`].
    pub fn deliver_captured(
        &mut self,
        sequence_number: u32,
        capture: DeliveryCapture,
    ) -> Result<Delivery> {
        let (weight_kg, volume_m3) = capture.finish();
        self.mark_delivered(sequence_number, weight_kg, volume_m3)
    }

    /// Open an edit form pre-filled from the record carrying `sequence_number`.
    ///
    /// # Errors
    /// Returns an error when no record has that sequence number.
    pub fn edit_form(&self, sequence_number: u32) -> Result<EditForm> {
        let index = self.record_index(sequence_number)?;
        self.store
            .get(index)
            .map(EditForm::for_record)
            .ok_or_else(|| anyhow!("no record with sequence number {sequence_number}"))
    }

    /// Apply a confirmed edit form and save.
    ///
    /// # Errors
    /// See [`Tracker::edit`].
    pub fn submit(&mut self, form: &EditForm) -> Result<Record> {
        self.edit(form.sequence_number(), &form.changes())
    }

    /// Overwrite fields of one record atomically and save.
    ///
    /// # Errors
    /// Returns an error for an unknown sequence number, any value that does
    /// not parse for its field (nothing is applied), or a failed save.
    pub fn edit(
        &mut self,
        sequence_number: u32,
        changes: &BTreeMap<EditableField, String>,
    ) -> Result<Record> {
        let index = self.record_index(sequence_number)?;
        let record = self.store.edit(index, changes)?.clone();

        tracing::info!(
            "edited #{} ({})",
            record.sequence_number,
            changes.keys().map(|field| field.as_str()).collect::<Vec<_>>().join(", ")
        );
        self.persist()?;
        Ok(record)
    }

    /// Case-insensitive lookup by tracking number.
    ///
    /// # Errors
    /// Returns [`TrackerError::EmptyInput`] when the query is blank.
    pub fn find(&self, tracking_id: &str) -> Result<Vec<&Record>> {
        Ok(self.store.find(tracking_id)?)
    }

    #[must_use]
    pub fn list(&self, filter: StatusFilter) -> Vec<&Record> {
        self.store.list(filter)
    }

    /// Notice of the most recent successful save, cleared once taken. A
    /// mutation that wrote nothing leaves it empty.
    pub fn take_save_notice(&mut self) -> Option<SaveNotice> {
        self.last_save.take()
    }

    /// Overwrite the workbook with the current record list.
    ///
    /// # Errors
    /// Returns an error when the workbook cannot be written.
    pub fn persist(&mut self) -> Result<SaveNotice> {
        self.last_save = None;
        self.file
            .persist(self.store.records())
            .with_context(|| format!("failed to save workbook {}", self.file.path().display()))?;

        let notice = SaveNotice { path: self.file.path().to_path_buf(), count: self.store.len() };
        tracing::info!("{}", notice.message());
        self.last_save = Some(notice.clone());
        Ok(notice)
    }
}

#[cfg(test)]
mod tests {
    use shipment_tracker_core::DeliveryStatus;

    use super::*;

    fn workbook_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("inventory_data.xlsx")
    }

    fn delivered(delivery: Delivery) -> Record {
        match delivery {
            Delivery::Delivered(record) => record,
            Delivery::AlreadyDelivered(record) => {
                panic!("record #{} was already delivered", record.sequence_number)
            }
        }
    }

    #[test]
    fn add_deliver_persist_and_reload_scenario() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = workbook_path(&dir);

        let (mut tracker, notice) = Tracker::open(&path)?;
        assert_eq!(notice, LoadNotice::StartedEmpty { path: path.clone() });
        assert!(tracker.records().is_empty());

        let added = tracker.add("TRK1")?.ok_or_else(|| anyhow!("record should be added"))?;
        assert_eq!(added.sequence_number, 1);
        assert_eq!(added.status, DeliveryStatus::NotDelivered);
        assert!(path.exists());

        let record = delivered(tracker.mark_delivered(1, Some(5.0), Some(0.1))?);
        assert_eq!(record.status, DeliveryStatus::Delivered);
        assert_eq!(record.weight_kg, Some(5.0));
        assert_eq!(record.volume_m3, Some(0.1));
        assert!(record.changed_at.is_some());

        let (reloaded, notice) = Tracker::open(&path)?;
        assert_eq!(notice, LoadNotice::Loaded { path, count: 1 });
        assert_eq!(reloaded.records(), tracker.records());
        Ok(())
    }

    #[test]
    fn blank_add_is_a_silent_no_op() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = workbook_path(&dir);
        let (mut tracker, _) = Tracker::open(&path)?;

        assert_eq!(tracker.add("   ")?, None);
        assert!(tracker.records().is_empty());
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn save_notice_follows_each_write() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = workbook_path(&dir);
        let (mut tracker, _) = Tracker::open(&path)?;

        tracker.add("TRK1")?;
        let notice = tracker.take_save_notice().ok_or_else(|| anyhow!("add should save"))?;
        assert_eq!(notice, SaveNotice { path: path.clone(), count: 1 });
        assert_eq!(notice.message(), format!("Saved 1 records to {}.", path.display()));
        assert!(tracker.take_save_notice().is_none());

        assert_eq!(tracker.add(" ")?, None);
        assert!(tracker.take_save_notice().is_none());

        tracker.mark_delivered(1, None, None)?;
        assert!(tracker.take_save_notice().is_some());
        tracker.mark_delivered(1, None, None)?;
        assert!(tracker.take_save_notice().is_none());
        Ok(())
    }

    #[test]
    fn second_delivery_is_informational() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (mut tracker, _) = Tracker::open(workbook_path(&dir))?;
        tracker.add("TRK1")?;
        let first = delivered(tracker.mark_delivered(1, Some(1.5), None)?);

        match tracker.mark_delivered(1, Some(9.0), Some(9.0))? {
            Delivery::AlreadyDelivered(record) => assert_eq!(record, first),
            Delivery::Delivered(_) => panic!("second delivery must not change the record"),
        }
        Ok(())
    }

    #[test]
    fn captured_delivery_commits_partial_measurements() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (mut tracker, _) = Tracker::open(workbook_path(&dir))?;
        tracker.add("TRK1")?;

        let mut capture = DeliveryCapture::new();
        capture.answer_text("12.5")?;
        capture.answer_text("")?;
        let record = delivered(tracker.deliver_captured(1, capture)?);

        assert_eq!(record.weight_kg, Some(12.5));
        assert!(record.volume_m3.is_none());
        Ok(())
    }

    #[test]
    fn edit_form_round_trips_through_the_workbook() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = workbook_path(&dir);
        let (mut tracker, _) = Tracker::open(&path)?;
        tracker.add("TRK1")?;
        tracker.add("TRK2")?;

        let mut form = tracker.edit_form(2)?;
        form.set(EditableField::TrackingId, "TRK2-B");
        form.set(EditableField::VolumeM3, "0.25");
        let record = tracker.submit(&form)?;
        assert_eq!(record.tracking_id, "TRK2-B");
        assert_eq!(record.volume_m3, Some(0.25));

        let (reloaded, _) = Tracker::open(&path)?;
        assert_eq!(reloaded.records(), tracker.records());
        assert_eq!(reloaded.find("trk2-b")?.len(), 1);
        Ok(())
    }

    #[test]
    fn invalid_edit_changes_nothing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (mut tracker, _) = Tracker::open(workbook_path(&dir))?;
        tracker.add("TRK1")?;
        let before = tracker.records().to_vec();

        let mut form = tracker.edit_form(1)?;
        form.set(EditableField::TrackingId, "RENAMED");
        form.set(EditableField::AddedAt, "last tuesday");
        assert!(tracker.submit(&form).is_err());
        assert_eq!(tracker.records(), before.as_slice());
        Ok(())
    }

    #[test]
    fn unknown_sequence_number_is_reported() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (mut tracker, _) = Tracker::open(workbook_path(&dir))?;
        tracker.add("TRK1")?;

        assert!(tracker.mark_delivered(7, None, None).is_err());
        assert!(tracker.edit_form(0).is_err());
        Ok(())
    }

    #[test]
    fn failed_save_keeps_the_in_memory_mutation() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing-dir").join("inventory_data.xlsx");
        let (mut tracker, notice) = Tracker::open(&path)?;
        assert!(matches!(notice, LoadNotice::StartedEmpty { .. }));

        let err = tracker.add("TRK1").err().ok_or_else(|| anyhow!("save should fail"))?;
        assert!(err.to_string().contains("failed to save workbook"));
        assert_eq!(tracker.records().len(), 1);
        Ok(())
    }

    #[test]
    fn list_and_find_follow_status_and_case_rules() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (mut tracker, _) = Tracker::open(workbook_path(&dir))?;
        for id in ["ABC123", "XYZ9", "abc123"] {
            tracker.add(id)?;
        }
        tracker.mark_delivered(2, None, None)?;

        assert_eq!(tracker.list(StatusFilter::All).len(), 3);
        assert_eq!(tracker.list(StatusFilter::Delivered).len(), 1);
        assert_eq!(tracker.list(StatusFilter::NotDelivered).len(), 2);
        assert_eq!(tracker.find("ABC123")?, tracker.find("abc123")?);
        assert!(tracker.find("nope")?.is_empty());
        assert!(tracker.find(" ").is_err());
        Ok(())
    }

    #[test]
    fn delivery_outcome_serializes_with_tag() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (mut tracker, _) = Tracker::open(workbook_path(&dir))?;
        tracker.add("TRK1")?;
        let delivery = tracker.mark_delivered(1, None, None)?;

        let json = serde_json::to_value(&delivery)?;
        assert_eq!(json["outcome"], "delivered");
        assert_eq!(json["record"]["status"], "delivered");
        assert_eq!(json["record"]["weight_kg"], serde_json::Value::Null);
        Ok(())
    }
}

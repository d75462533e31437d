use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Sheet column headers, in the fixed order every snapshot is written.
pub const COLUMNS: [&str; 7] = [
    "sequence_number",
    "tracking_id",
    "status",
    "added_at",
    "changed_at",
    "weight_kg",
    "volume_m3",
];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum TrackerError {
    #[error("tracking number MUST be non-empty")]
    EmptyInput,
    #[error("record #{sequence_number} is already delivered")]
    AlreadyDelivered { sequence_number: u32 },
    #[error("no record at index {index} (store holds {len})")]
    NoSuchRecord { index: usize, len: usize },
    #[error("invalid value {value:?} for {field}: {reason}")]
    InvalidField { field: &'static str, value: String, reason: String },
    #[error("field {0} is not editable")]
    FieldNotEditable(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// Local wall-clock time truncated to whole seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(into = "String", try_from = "String")]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    #[must_use]
    pub fn from_datetime(value: NaiveDateTime) -> Self {
        Self(value.with_nanosecond(0).unwrap_or(value))
    }

    /// Parse `YYYY-MM-DD HH:MM:SS`, falling back to ISO 8601 with a `T` separator.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(value, ISO_TIMESTAMP_FORMAT))
            .ok()
            .map(Self::from_datetime)
    }

    #[must_use]
    pub fn as_datetime(self) -> NaiveDateTime {
        self.0
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| TrackerError::InvalidField {
            field: "timestamp",
            reason: format!("expected {TIMESTAMP_FORMAT}"),
            value,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    NotDelivered,
    Delivered,
}

impl DeliveryStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotDelivered => "not_delivered",
            Self::Delivered => "delivered",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::NotDelivered => "Not delivered",
            Self::Delivered => "Delivered",
        }
    }

    /// Accepts machine names, display labels (any case) and the labels older
    /// workbooks were written with.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase();
        match normalized.as_str() {
            "not_delivered" | "not delivered" | "не доставлено" => Some(Self::NotDelivered),
            "delivered" | "доставлено" => Some(Self::Delivered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    NotDelivered,
    Delivered,
}

impl StatusFilter {
    #[must_use]
    pub fn matches(self, status: DeliveryStatus) -> bool {
        match self {
            Self::All => true,
            Self::NotDelivered => status == DeliveryStatus::NotDelivered,
            Self::Delivered => status == DeliveryStatus::Delivered,
        }
    }
}

/// Record fields a user may overwrite; `sequence_number` is never one of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EditableField {
    TrackingId,
    Status,
    AddedAt,
    ChangedAt,
    WeightKg,
    VolumeM3,
}

impl EditableField {
    pub const ALL: [Self; 6] = [
        Self::TrackingId,
        Self::Status,
        Self::AddedAt,
        Self::ChangedAt,
        Self::WeightKg,
        Self::VolumeM3,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrackingId => "tracking_id",
            Self::Status => "status",
            Self::AddedAt => "added_at",
            Self::ChangedAt => "changed_at",
            Self::WeightKg => "weight_kg",
            Self::VolumeM3 => "volume_m3",
        }
    }

    /// Resolve a column name to an editable field.
    ///
    /// # Errors
    /// Returns [`TrackerError::FieldNotEditable`] for `sequence_number` and
    /// [`TrackerError::UnknownField`] for anything that is not a column.
    pub fn parse(value: &str) -> Result<Self, TrackerError> {
        let name = value.trim();
        match name {
            "tracking_id" => Ok(Self::TrackingId),
            "status" => Ok(Self::Status),
            "added_at" => Ok(Self::AddedAt),
            "changed_at" => Ok(Self::ChangedAt),
            "weight_kg" => Ok(Self::WeightKg),
            "volume_m3" => Ok(Self::VolumeM3),
            "sequence_number" => Err(TrackerError::FieldNotEditable(name.to_string())),
            _ => Err(TrackerError::UnknownField(name.to_string())),
        }
    }
}

impl Display for EditableField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub sequence_number: u32,
    pub tracking_id: String,
    pub status: DeliveryStatus,
    pub added_at: Timestamp,
    pub changed_at: Option<Timestamp>,
    pub weight_kg: Option<f64>,
    pub volume_m3: Option<f64>,
}

impl Record {
    #[must_use]
    pub fn new(sequence_number: u32, tracking_id: String, added_at: Timestamp) -> Self {
        Self {
            sequence_number,
            tracking_id,
            status: DeliveryStatus::NotDelivered,
            added_at,
            changed_at: None,
            weight_kg: None,
            volume_m3: None,
        }
    }

    /// Current value of `field` as the text an edit form would show.
    #[must_use]
    pub fn field_text(&self, field: EditableField) -> String {
        match field {
            EditableField::TrackingId => self.tracking_id.clone(),
            EditableField::Status => self.status.label().to_string(),
            EditableField::AddedAt => self.added_at.to_string(),
            EditableField::ChangedAt => self.changed_at.map(|at| at.to_string()).unwrap_or_default(),
            EditableField::WeightKg => self.weight_kg.map(|v| v.to_string()).unwrap_or_default(),
            EditableField::VolumeM3 => self.volume_m3.map(|v| v.to_string()).unwrap_or_default(),
        }
    }

    fn apply(&mut self, field: EditableField, raw: &str) -> Result<(), TrackerError> {
        match field {
            EditableField::TrackingId => {
                let tracking_id = raw.trim();
                if tracking_id.is_empty() {
                    return Err(invalid(field, raw, "tracking number MUST be non-empty"));
                }
                self.tracking_id = checked_tracking_id(tracking_id)?;
            }
            EditableField::Status => {
                self.status = DeliveryStatus::parse(raw)
                    .ok_or_else(|| invalid(field, raw, "expected not_delivered or delivered"))?;
            }
            EditableField::AddedAt => {
                self.added_at = Timestamp::parse(raw)
                    .ok_or_else(|| invalid(field, raw, "expected YYYY-MM-DD HH:MM:SS"))?;
            }
            EditableField::ChangedAt => {
                self.changed_at = if raw.trim().is_empty() {
                    None
                } else {
                    Some(
                        Timestamp::parse(raw)
                            .ok_or_else(|| invalid(field, raw, "expected YYYY-MM-DD HH:MM:SS"))?,
                    )
                };
            }
            EditableField::WeightKg => self.weight_kg = parse_measurement(field, raw)?,
            EditableField::VolumeM3 => self.volume_m3 = parse_measurement(field, raw)?,
        }
        Ok(())
    }
}

fn invalid(field: EditableField, value: &str, reason: &str) -> TrackerError {
    TrackerError::InvalidField {
        field: field.as_str(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Control characters other than tab and line breaks have no representation
/// in a workbook cell.
fn checked_tracking_id(tracking_id: &str) -> Result<String, TrackerError> {
    let storable = tracking_id.chars().all(|ch| {
        !matches!(
            ch,
            '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}'
        )
    });
    if !storable {
        return Err(invalid(
            EditableField::TrackingId,
            tracking_id,
            "tracking number MUST NOT contain control characters",
        ));
    }
    Ok(tracking_id.to_string())
}

/// Parse an optional weight or volume. Blank text means "unset".
///
/// # Errors
/// Returns [`TrackerError::InvalidField`] for text that is not a finite,
/// non-negative number.
pub fn parse_measurement(field: EditableField, raw: &str) -> Result<Option<f64>, TrackerError> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let value = text
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| invalid(field, raw, "expected a decimal number"))?;
    check_measurement(field, value).map(Some)
}

fn check_measurement(field: EditableField, value: f64) -> Result<f64, TrackerError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(field, &value.to_string(), "MUST be a finite, non-negative number"));
    }
    Ok(value)
}

/// Ordered, append-only collection of shipment records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot, keeping the snapshot's order.
    #[must_use]
    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Append a new `NotDelivered` record.
    ///
    /// # Errors
    /// Returns [`TrackerError::EmptyInput`] when `tracking_id` is blank and
    /// [`TrackerError::InvalidField`] when it holds a control character; the
    /// store is left unchanged.
    pub fn add(&mut self, tracking_id: &str, at: Timestamp) -> Result<&Record, TrackerError> {
        let tracking_id = tracking_id.trim();
        if tracking_id.is_empty() {
            return Err(TrackerError::EmptyInput);
        }

        let tracking_id = checked_tracking_id(tracking_id)?;

        let sequence_number =
            u32::try_from(self.records.len()).unwrap_or(u32::MAX).saturating_add(1);
        self.records.push(Record::new(sequence_number, tracking_id, at));
        Ok(&self.records[self.records.len() - 1])
    }

    /// Transition one record to `Delivered`, capturing optional measurements.
    ///
    /// The volume is only kept when a weight was captured as well.
    ///
    /// # Errors
    /// Returns [`TrackerError::NoSuchRecord`] for an out-of-range index,
    /// [`TrackerError::AlreadyDelivered`] when the record was delivered
    /// before, and [`TrackerError::InvalidField`] for a negative or
    /// non-finite measurement. No error path mutates the record.
    pub fn mark_delivered(
        &mut self,
        index: usize,
        weight_kg: Option<f64>,
        volume_m3: Option<f64>,
        at: Timestamp,
    ) -> Result<&Record, TrackerError> {
        let len = self.records.len();
        let record =
            self.records.get_mut(index).ok_or(TrackerError::NoSuchRecord { index, len })?;
        if record.status == DeliveryStatus::Delivered {
            return Err(TrackerError::AlreadyDelivered { sequence_number: record.sequence_number });
        }

        let weight_kg =
            weight_kg.map(|value| check_measurement(EditableField::WeightKg, value)).transpose()?;
        let volume_m3 = match weight_kg {
            Some(_) => volume_m3
                .map(|value| check_measurement(EditableField::VolumeM3, value))
                .transpose()?,
            None => None,
        };

        record.status = DeliveryStatus::Delivered;
        record.changed_at = Some(at);
        if weight_kg.is_some() {
            record.weight_kg = weight_kg;
            if volume_m3.is_some() {
                record.volume_m3 = volume_m3;
            }
        }
        Ok(&*record)
    }

    /// Overwrite the given fields of one record, all or nothing.
    ///
    /// # Errors
    /// Returns [`TrackerError::NoSuchRecord`] for an out-of-range index and
    /// [`TrackerError::InvalidField`] when any value fails to parse, in which
    /// case no field is changed.
    pub fn edit(
        &mut self,
        index: usize,
        changes: &BTreeMap<EditableField, String>,
    ) -> Result<&Record, TrackerError> {
        let len = self.records.len();
        let slot = self.records.get_mut(index).ok_or(TrackerError::NoSuchRecord { index, len })?;

        let mut updated = slot.clone();
        for (field, value) in changes {
            updated.apply(*field, value)?;
        }
        *slot = updated;
        Ok(&*slot)
    }

    /// Case-insensitive exact match on the tracking number.
    ///
    /// # Errors
    /// Returns [`TrackerError::EmptyInput`] when the query is blank.
    pub fn find(&self, tracking_id: &str) -> Result<Vec<&Record>, TrackerError> {
        let query = tracking_id.trim();
        if query.is_empty() {
            return Err(TrackerError::EmptyInput);
        }
        let needle = query.to_lowercase();
        Ok(self.records.iter().filter(|record| record.tracking_id.to_lowercase() == needle).collect())
    }

    #[must_use]
    pub fn list(&self, filter: StatusFilter) -> Vec<&Record> {
        self.records.iter().filter(|record| filter.matches(record.status)).collect()
    }
}

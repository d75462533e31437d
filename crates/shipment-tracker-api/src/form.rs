//! Edit form: every editable field pre-filled with its current text.
//!
//! Only values that differ from the pre-filled text are submitted, and they
//! are applied together. Dropping the form discards all edits.

use std::collections::BTreeMap;

use shipment_tracker_core::{EditableField, Record, TrackerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    sequence_number: u32,
    original: BTreeMap<EditableField, String>,
    values: BTreeMap<EditableField, String>,
}

impl EditForm {
    #[must_use]
    pub fn for_record(record: &Record) -> Self {
        let original = EditableField::ALL
            .iter()
            .map(|field| (*field, record.field_text(*field)))
            .collect::<BTreeMap<_, _>>();
        Self { sequence_number: record.sequence_number, values: original.clone(), original }
    }

    #[must_use]
    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    #[must_use]
    pub fn value(&self, field: EditableField) -> &str {
        self.values.get(&field).map_or("", String::as_str)
    }

    pub fn set(&mut self, field: EditableField, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    /// Set a field addressed by its column name.
    ///
    /// # Errors
    /// Returns the [`EditableField::parse`] error for `sequence_number` or an
    /// unknown column.
    pub fn set_named(&mut self, name: &str, value: impl Into<String>) -> Result<(), TrackerError> {
        let field = EditableField::parse(name)?;
        self.set(field, value);
        Ok(())
    }

    #[must_use]
    pub fn changes(&self) -> BTreeMap<EditableField, String> {
        self.values
            .iter()
            .filter(|(field, value)| self.original.get(*field) != Some(*value))
            .map(|(field, value)| (*field, value.clone()))
            .collect()
    }
}

//! Positional row decoding for snapshot workbooks.
//!
//! Row 1 is skipped without inspecting it and columns are taken in the fixed
//! snapshot order. Decoding is lenient about cell types, since a workbook
//! opened and re-saved in a spreadsheet application may turn text into
//! numbers or dates, but a cell that cannot mean anything for its column
//! fails the whole load.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use shipment_tracker_core::{DeliveryStatus, Record, Timestamp, COLUMNS};

use crate::WorkbookError;

pub(crate) fn read_records(path: &Path) -> Result<Vec<Record>, WorkbookError> {
    let mut workbook = open_workbook_auto(path)?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Ok(Vec::new());
    };
    let range = range?;
    let first_row = range.start().map_or(0, |(row, _)| usize::try_from(row).unwrap_or(0));

    let mut records = Vec::new();
    for (offset, row) in range.rows().enumerate().skip(1) {
        if row.iter().all(is_blank) {
            continue;
        }
        records.push(decode_row(row, first_row + offset + 1)?);
    }
    Ok(records)
}

/// Decode one data row; `row_number` is the 1-based sheet row for errors.
pub(crate) fn decode_row(row: &[Data], row_number: usize) -> Result<Record, WorkbookError> {
    let malformed = |column: usize, reason: String| WorkbookError::Malformed {
        row: row_number,
        column: COLUMNS[column],
        reason,
    };
    let cell = |column: usize| row.get(column);

    let sequence_number = decode_sequence_number(cell(0)).ok_or_else(|| {
        malformed(0, format!("expected a positive integer, found {}", describe(cell(0))))
    })?;
    let tracking_id = cell_text(cell(1))
        .ok_or_else(|| malformed(1, "tracking number is empty".to_string()))?;
    let status = cell_text(cell(2))
        .and_then(|text| DeliveryStatus::parse(&text))
        .ok_or_else(|| malformed(2, format!("unknown status {}", describe(cell(2)))))?;
    let added_at = decode_timestamp(cell(3))
        .ok_or_else(|| malformed(3, format!("expected a timestamp, found {}", describe(cell(3)))))?;
    let changed_at = decode_optional(cell(4), decode_timestamp)
        .ok_or_else(|| malformed(4, format!("expected a timestamp, found {}", describe(cell(4)))))?;
    let weight_kg = decode_optional(cell(5), decode_number)
        .ok_or_else(|| malformed(5, format!("expected a number, found {}", describe(cell(5)))))?;
    let volume_m3 = decode_optional(cell(6), decode_number)
        .ok_or_else(|| malformed(6, format!("expected a number, found {}", describe(cell(6)))))?;

    Ok(Record {
        sequence_number,
        tracking_id,
        status,
        added_at,
        changed_at,
        weight_kg,
        volume_m3,
    })
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// `Some(None)` for an unset cell, `Some(Some(_))` for a decoded value and
/// `None` when the cell holds something `decode` rejects.
fn decode_optional<T>(
    cell: Option<&Data>,
    decode: fn(Option<&Data>) -> Option<T>,
) -> Option<Option<T>> {
    match cell {
        None => Some(None),
        Some(value) if is_unset(value) => Some(None),
        Some(_) => decode(cell).map(Some),
    }
}

/// Blank cells, spreadsheet errors and the `nan` marker older exports left
/// behind all mean "not captured".
fn is_unset(cell: &Data) -> bool {
    match cell {
        Data::Empty | Data::Error(_) => true,
        Data::String(text) => {
            let text = text.trim();
            text.is_empty() || text.eq_ignore_ascii_case("nan")
        }
        Data::Float(value) => value.is_nan(),
        _ => false,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn decode_sequence_number(cell: Option<&Data>) -> Option<u32> {
    match cell? {
        Data::Float(value)
            if value.fract() == 0.0 && *value >= 1.0 && *value <= f64::from(u32::MAX) =>
        {
            Some(*value as u32)
        }
        Data::Int(value) => u32::try_from(*value).ok().filter(|number| *number >= 1),
        Data::String(text) => text.trim().parse::<u32>().ok().filter(|number| *number >= 1),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn decode_number(cell: Option<&Data>) -> Option<f64> {
    let value = match cell? {
        Data::Float(value) => *value,
        Data::Int(value) => *value as f64,
        Data::String(text) => text.trim().replace(',', ".").parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn decode_timestamp(cell: Option<&Data>) -> Option<Timestamp> {
    match cell? {
        Data::String(text) | Data::DateTimeIso(text) => Timestamp::parse(text),
        Data::DateTime(value) => value.as_datetime().map(Timestamp::from_datetime),
        _ => None,
    }
}

/// Cell content as trimmed text; numbers keep their shortest form so a
/// numeric tracking number like `123456` does not turn into `123456.0`.
fn cell_text(cell: Option<&Data>) -> Option<String> {
    let text = match cell? {
        Data::Empty | Data::Error(_) => return None,
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            text.trim().to_string()
        }
        Data::Float(value) => {
            if value.fract() == 0.0 {
                format!("{value:.0}")
            } else {
                value.to_string()
            }
        }
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => value.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn describe(cell: Option<&Data>) -> String {
    match cell {
        None | Some(Data::Empty) => "an empty cell".to_string(),
        Some(Data::String(text)) => format!("{text:?}"),
        Some(other) => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Data {
        Data::String(value.to_string())
    }

    #[test]
    fn decodes_row_written_by_current_format() -> Result<(), WorkbookError> {
        let row = [
            Data::Float(3.0),
            text("TRK3"),
            text("delivered"),
            text("2024-03-14 09:30:00"),
            text("2024-03-15 17:05:42"),
            Data::Float(12.5),
            Data::Float(0.3),
        ];
        let record = decode_row(&row, 4)?;

        assert_eq!(record.sequence_number, 3);
        assert_eq!(record.tracking_id, "TRK3");
        assert_eq!(record.status, DeliveryStatus::Delivered);
        assert_eq!(record.added_at.to_string(), "2024-03-14 09:30:00");
        assert_eq!(
            record.changed_at.map(|at| at.to_string()).as_deref(),
            Some("2024-03-15 17:05:42")
        );
        assert_eq!(record.weight_kg, Some(12.5));
        assert_eq!(record.volume_m3, Some(0.3));
        Ok(())
    }

    #[test]
    fn short_rows_and_legacy_markers_leave_optional_fields_unset() -> Result<(), WorkbookError> {
        let row = [
            Data::Int(1),
            Data::Float(40_012_345.0),
            text("Не доставлено"),
            text("2024-01-02 03:04:05"),
            text("nan"),
        ];
        let record = decode_row(&row, 2)?;

        assert_eq!(record.tracking_id, "40012345");
        assert_eq!(record.status, DeliveryStatus::NotDelivered);
        assert!(record.changed_at.is_none());
        assert!(record.weight_kg.is_none());
        assert!(record.volume_m3.is_none());
        Ok(())
    }

    #[test]
    fn undecodable_cell_names_row_and_column() {
        let row = [Data::Float(1.0), text("TRK1"), text("not_delivered"), text("yesterday")];
        match decode_row(&row, 2) {
            Err(WorkbookError::Malformed { row, column, reason }) => {
                assert_eq!(row, 2);
                assert_eq!(column, "added_at");
                assert!(reason.contains("yesterday"));
            }
            other => panic!("expected malformed row error, got {other:?}"),
        }

        let row = [Data::Float(1.5), text("TRK1")];
        assert!(matches!(
            decode_row(&row, 7),
            Err(WorkbookError::Malformed { row: 7, column: "sequence_number", .. })
        ));
    }
}

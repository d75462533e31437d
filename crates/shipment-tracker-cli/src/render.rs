//! Plain-text rendering of record tables and informational lines.

use shipment_tracker_core::{EditableField, Record, COLUMNS};

const SEPARATOR: &str = "  ";

/// Render records as a left-aligned table headed by the column names.
#[must_use]
pub fn table(records: &[&Record]) -> String {
    let rows = records.iter().map(|record| row(record)).collect::<Vec<_>>();

    let mut widths = COLUMNS.map(|column| column.chars().count());
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    push_line(&mut output, &COLUMNS.map(str::to_string), &widths);
    for cells in &rows {
        push_line(&mut output, cells, &widths);
    }
    output
}

fn row(record: &Record) -> [String; 7] {
    [
        record.sequence_number.to_string(),
        record.field_text(EditableField::TrackingId),
        record.status.as_str().to_string(),
        record.field_text(EditableField::AddedAt),
        record.field_text(EditableField::ChangedAt),
        record.field_text(EditableField::WeightKg),
        record.field_text(EditableField::VolumeM3),
    ]
}

fn push_line(output: &mut String, cells: &[String; 7], widths: &[usize; 7]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    output.push_str(line.trim_end());
    output.push('\n');
}

#[must_use]
pub fn not_found_message(tracking_id: &str) -> String {
    format!("Tracking number '{tracking_id}' not found.")
}

#[must_use]
pub fn already_delivered_message(record: &Record) -> String {
    format!(
        "Record #{} ({}) is already delivered; nothing changed.",
        record.sequence_number, record.tracking_id
    )
}

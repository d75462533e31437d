//! SpreadsheetML package writer.
//!
//! Emits the smallest package Excel, LibreOffice and calamine all accept:
//! content types, two relationship parts, the workbook, one worksheet and a
//! stylesheet. Strings are written inline so no shared-string table is needed.

use std::io::{Seek, Write};

use shipment_tracker_core::Record;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::{WorkbookError, SHEET_NAME};

/// Style index every cell is written with (centered, thin border, 14 pt).
const CELL_STYLE: u32 = 1;

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><sz val="14"/><name val="Palatino Linotype"/></font></fonts>
<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
<borders count="2"><border><left/><right/><top/><bottom/><diagonal/></border><border><left style="thin"><color auto="1"/></left><right style="thin"><color auto="1"/></right><top style="thin"><color auto="1"/></top><bottom style="thin"><color auto="1"/></bottom><diagonal/></border></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="1" xfId="0" applyFont="1" applyBorder="1" applyAlignment="1"><alignment horizontal="center" vertical="center"/></xf></cellXfs>
<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    fn optional_number(value: Option<f64>) -> Self {
        value.map_or(Self::Empty, Self::Number)
    }
}

pub(crate) fn record_cells(record: &Record) -> Vec<Cell> {
    vec![
        Cell::Number(f64::from(record.sequence_number)),
        Cell::Text(record.tracking_id.clone()),
        Cell::Text(record.status.as_str().to_string()),
        Cell::Text(record.added_at.to_string()),
        record.changed_at.map_or(Cell::Empty, |at| Cell::Text(at.to_string())),
        Cell::optional_number(record.weight_kg),
        Cell::optional_number(record.volume_m3),
    ]
}

/// Write a complete single-sheet package: `header` as row 1, then `rows`.
pub(crate) fn write_workbook<W: Write + Seek>(
    out: W,
    header: &[&str],
    rows: &[Vec<Cell>],
) -> Result<W, WorkbookError> {
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let workbook_xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
        escape_xml(SHEET_NAME)
    );

    let header_cells =
        header.iter().map(|name| Cell::Text((*name).to_string())).collect::<Vec<_>>();
    let sheet_xml = sheet_xml(std::iter::once(&header_cells).chain(rows.iter()), header.len());

    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", ROOT_RELS_XML),
        ("xl/workbook.xml", workbook_xml.as_str()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML),
        ("xl/styles.xml", STYLES_XML),
        ("xl/worksheets/sheet1.xml", sheet_xml.as_str()),
    ] {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }

    Ok(zip.finish()?)
}

fn sheet_xml<'a>(rows: impl Iterator<Item = &'a Vec<Cell>>, width: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );
    if width > 0 {
        xml.push_str(&format!(
            r#"<cols><col min="1" max="{width}" width="22" customWidth="1"/></cols>"#
        ));
    }
    xml.push_str("<sheetData>");

    for (offset, cells) in rows.enumerate() {
        let row = offset + 1;
        xml.push_str(&format!(r#"<row r="{row}">"#));
        for (column, cell) in cells.iter().enumerate() {
            let reference = format!("{}{row}", column_name(column));
            match cell {
                Cell::Number(value) => xml.push_str(&format!(
                    r#"<c r="{reference}" s="{CELL_STYLE}"><v>{value}</v></c>"#
                )),
                Cell::Text(text) => xml.push_str(&format!(
                    r#"<c r="{reference}" s="{CELL_STYLE}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                    escape_xml(text)
                )),
                Cell::Empty => {
                    xml.push_str(&format!(r#"<c r="{reference}" s="{CELL_STYLE}"/>"#));
                }
            }
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Zero-based column index to its letter name (`0 -> A`, `26 -> AA`).
fn column_name(index: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = index;
    loop {
        let offset = u8::try_from(remaining % 26).unwrap_or(0);
        letters.push(char::from(b'A' + offset));
        if remaining < 26 {
            break;
        }
        remaining = remaining / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            // XML 1.0 forbids the remaining C0 controls.
            c if c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r') => {}
            c => escaped.push(c),
        }
    }
    escaped
}

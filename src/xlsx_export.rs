//! Spreadsheet writers for flattened records: `.xlsx`, `.csv`, and the blank
//! upload template.

use crate::error::{GcmmError, Result};
use crate::flatten::Record;
use crate::schema::Schema;
use crate::sheet::{format_number, Cell};
use rust_xlsxwriter::{Format, FormatAlign, Workbook};

pub const EXPORT_FILENAME: &str = "GCMM_Export.xlsx";
pub const TEMPLATE_FILENAME: &str = "GCMM_Template.xlsx";
pub const SHEET_NAME: &str = "GCMM";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Write records as a single-sheet workbook, header row first.
pub fn write_xlsx(schema: &Schema, records: &[Record]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_fmt = Format::new().set_bold().set_align(FormatAlign::Center);
    let wrap_fmt = Format::new().set_text_wrap().set_align(FormatAlign::Top);

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in schema.header_names().iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *name, &header_fmt)?;
        sheet.set_column_width(col, column_width(name))?;
    }
    sheet.set_freeze_panes(1, 0)?;

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, cell) in record.cells(schema).into_iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Empty => {}
                Cell::Number(n) => {
                    sheet.write_number(row, col, n)?;
                }
                Cell::Text(s) => {
                    sheet.write_string_with_format(row, col, &s, &wrap_fmt)?;
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(row, col, b)?;
                }
            }
        }
    }

    if !records.is_empty() {
        let last_col = (schema.columns.len() - 1) as u16;
        sheet.autofilter(0, 0, records.len() as u32, last_col)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Blank workbook carrying only the schema's header row.
pub fn template_xlsx(schema: &Schema) -> Result<Vec<u8>> {
    write_xlsx(schema, &[])
}

/// Write records as CSV with the schema's header row.
pub fn write_csv(schema: &Schema, records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let io_err = |e: csv::Error| GcmmError::Internal(format!("failed to write CSV: {e}"));
    writer.write_record(schema.header_names()).map_err(io_err)?;
    for record in records {
        let fields: Vec<String> = record
            .cells(schema)
            .iter()
            .map(|c| match c {
                Cell::Number(n) => format_number(*n),
                other => other.as_text().unwrap_or_default(),
            })
            .collect();
        writer.write_record(&fields).map_err(io_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| GcmmError::Internal(format!("failed to flush CSV: {e}")))
}

fn column_width(name: &str) -> f64 {
    if name.starts_with("Level")
        || name.starts_with("Niveau")
        || name.contains("Recommendation")
        || name.contains("Description")
    {
        40.0
    } else {
        (name.len() as f64 + 4.0).max(10.0)
    }
}

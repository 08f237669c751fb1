//! Tabular input: decoding uploaded `.xlsx` / `.csv` bytes into a grid of
//! loosely typed [`Cell`]s.
//!
//! The workbook reader only covers what a GCMM upload needs: the first
//! worksheet, shared and inline strings, booleans and numbers. Styles,
//! formulas and dates are read back as their cached values or text.

use crate::error::{GcmmError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// A single spreadsheet cell as read from the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

pub(crate) static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    /// Infer a cell from raw text: blank → `Empty`, finite number → `Number`.
    pub fn infer(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(raw.to_string()),
        }
    }

    /// Empty, or text that is only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Blank, numeric zero or `false`.
    ///
    /// Rows whose first cell is falsy are treated as empty rows, so an axis
    /// id of `0` drops the whole row.
    pub fn is_falsy(&self) -> bool {
        match self {
            Cell::Number(n) => *n == 0.0,
            Cell::Bool(b) => !*b,
            other => other.is_blank(),
        }
    }

    /// Text form of the cell; `None` when blank.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) if s.trim().is_empty() => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(format_number(*n)),
            Cell::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        }
    }
}

/// Render a number the way a spreadsheet shows it: integral values without
/// a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Convert a 0-based column index to a column letter (A, B, ..., Z, AA, ...).
pub fn col_letter(idx: usize) -> String {
    let mut result = String::new();
    let mut n = idx;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert a column letter to its 0-based index. Inverse of [`col_letter`].
pub fn col_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n = 0usize;
    for ch in letters.chars() {
        if !ch.is_ascii_uppercase() {
            return None;
        }
        n = n.checked_mul(26)?.checked_add((ch as u8 - b'A') as usize + 1)?;
    }
    Some(n - 1)
}

/// Worksheet limits of the `.xlsx` format.
pub const MAX_XLSX_ROWS: usize = 1_048_576;
pub const MAX_XLSX_COLS: usize = 16_384;

/// A 2-D grid of cells; row 0 is the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Build a table from string literals, inferring numbers.
    pub fn from_strings(rows: &[Vec<&str>]) -> Self {
        Self::new(
            rows.iter()
                .map(|r| r.iter().map(|s| Cell::infer(s)).collect())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header(&self) -> &[Cell] {
        self.rows.first().map(|r| r.as_slice()).unwrap_or(&[])
    }

    /// Rows after the header.
    pub fn data_rows(&self) -> &[Vec<Cell>] {
        if self.rows.is_empty() {
            &[]
        } else {
            &self.rows[1..]
        }
    }

    /// Widest row in the table.
    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }
}

/// Look up a cell in a row, treating missing trailing cells as empty.
pub fn cell_at(row: &[Cell], col: usize) -> &Cell {
    row.get(col).unwrap_or(&EMPTY_CELL)
}

/// Decode an uploaded file by extension.
pub fn read_table(filename: &str, bytes: &[u8]) -> Result<Table> {
    let lower = filename.trim().to_lowercase();
    let table = if lower.ends_with(".xlsx") || lower.ends_with(".xlsm") {
        read_xlsx(bytes)?
    } else if lower.ends_with(".csv") {
        read_csv(bytes)?
    } else if lower.ends_with(".xls") {
        return Err(GcmmError::Format(format!(
            "{filename}. Legacy .xls workbooks are not supported, save it as .xlsx"
        )));
    } else {
        return Err(GcmmError::Format(format!(
            "{filename}. Please upload an Excel file (.xlsx) or a CSV file"
        )));
    };
    log::debug!(
        "Read {}: {} rows x {} columns",
        filename,
        table.rows.len(),
        table.width()
    );
    Ok(table)
}

/// Read a CSV file with no header interpretation; every record is a row.
pub fn read_csv(bytes: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| GcmmError::Format(format!("CSV record {} unreadable ({e})", i + 1)))?;
        rows.push(record.iter().map(Cell::infer).collect());
    }
    Ok(Table::new(rows))
}

// ─── XLSX ───────────────────────────────────────────────────────────────────

lazy_static! {
    static ref SHEET_RE: Regex =
        Regex::new(r#"<sheet\b[^>]*?\br:id="([^"]+)""#).expect("invalid regex");
    static ref REL_RE: Regex = Regex::new(r#"<Relationship\b([^>]*?)/?>"#).expect("invalid regex");
    static ref ATTR_RE: Regex = Regex::new(r#"\b([A-Za-z:]+)="([^"]*)""#).expect("invalid regex");
    static ref SI_RE: Regex = Regex::new(r"(?s)<si>(.*?)</si>").expect("invalid regex");
    static ref RPH_RE: Regex = Regex::new(r"(?s)<rPh\b.*?</rPh>").expect("invalid regex");
    static ref T_RE: Regex = Regex::new(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>").expect("invalid regex");
    static ref SHEET_DATA_RE: Regex =
        Regex::new(r"(?s)<sheetData>(.*?)</sheetData>").expect("invalid regex");
    static ref ROW_RE: Regex =
        Regex::new(r"(?s)<row\b([^>]*?)(?:/>|>(.*?)</row>)").expect("invalid regex");
    static ref CELL_RE: Regex =
        Regex::new(r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)").expect("invalid regex");
    static ref V_RE: Regex = Regex::new(r"(?s)<v>(.*?)</v>").expect("invalid regex");
    static ref CELL_REF_RE: Regex = Regex::new(r"^([A-Z]+)(\d+)$").expect("invalid regex");
    static ref OOXML_ESCAPE_RE: Regex =
        Regex::new(r"_x([0-9A-Fa-f]{4})_").expect("invalid regex");
    static ref ENTITY_RE: Regex =
        Regex::new(r"&(lt|gt|amp|quot|apos|#[0-9]+|#x[0-9A-Fa-f]+);").expect("invalid regex");
}

fn attrs(tag_attrs: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(tag_attrs)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// Resolve the five predefined XML entities and numeric character references.
pub fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    ENTITY_RE
        .replace_all(s, |caps: &regex::Captures| {
            let ent = &caps[1];
            match ent {
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "amp" => "&".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                _ => {
                    let code = if let Some(hex) = ent.strip_prefix("#x") {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        ent[1..].parse::<u32>().ok()
                    };
                    code.and_then(char::from_u32)
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| caps[0].to_string())
                }
            }
        })
        .into_owned()
}

/// Decode cell text: XML entities, then the `_xHHHH_` escapes Excel uses
/// for control characters (`_x005F_` protects a literal `_`).
pub fn unescape_text(s: &str) -> String {
    let s = unescape_xml(s);
    if !s.contains("_x") {
        return s;
    }
    OOXML_ESCAPE_RE
        .replace_all(&s, |caps: &regex::Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn read_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut data = String::new();
    entry
        .read_to_string(&mut data)
        .map_err(|e| GcmmError::Format(format!("cannot read {name} ({e})")))?;
    Ok(Some(data))
}

/// Path of the first worksheet, following the workbook relationships.
fn first_sheet_path(archive: &mut zip::ZipArchive<Cursor<&[u8]>>) -> Result<String> {
    let fallback = "xl/worksheets/sheet1.xml".to_string();
    let workbook = match read_entry(archive, "xl/workbook.xml")? {
        Some(xml) => xml,
        None => {
            return Err(GcmmError::Format(
                "no xl/workbook.xml in archive, not an Excel workbook".to_string(),
            ))
        }
    };
    let rid = match SHEET_RE.captures(&workbook) {
        Some(caps) => caps[1].to_string(),
        None => return Ok(fallback),
    };
    let rels = match read_entry(archive, "xl/_rels/workbook.xml.rels")? {
        Some(xml) => xml,
        None => return Ok(fallback),
    };
    for caps in REL_RE.captures_iter(&rels) {
        let a = attrs(&caps[1]);
        if a.get("Id").map(String::as_str) == Some(rid.as_str()) {
            if let Some(target) = a.get("Target") {
                return Ok(match target.strip_prefix('/') {
                    Some(abs) => abs.to_string(),
                    None => format!("xl/{}", target),
                });
            }
        }
    }
    Ok(fallback)
}

fn parse_shared_strings(xml: &str) -> Vec<String> {
    SI_RE
        .captures_iter(xml)
        .map(|si| {
            let body = RPH_RE.replace_all(&si[1], "");
            T_RE.captures_iter(&body)
                .map(|t| unescape_text(&t[1]))
                .collect::<String>()
        })
        .collect()
}

fn parse_cell(attrs: &HashMap<String, String>, body: &str, shared: &[String]) -> Result<Cell> {
    let value = V_RE.captures(body).map(|c| unescape_xml(&c[1]));
    let kind = attrs.get("t").map(String::as_str).unwrap_or("n");
    let cell = match kind {
        "s" => match value {
            Some(v) => {
                let idx: usize = v.trim().parse().map_err(|_| {
                    GcmmError::Format(format!("bad shared string index '{v}'"))
                })?;
                let s = shared.get(idx).ok_or_else(|| {
                    GcmmError::Format(format!("shared string index {idx} out of range"))
                })?;
                Cell::Text(s.clone())
            }
            None => Cell::Empty,
        },
        "inlineStr" => {
            let text: String = T_RE
                .captures_iter(body)
                .map(|t| unescape_text(&t[1]))
                .collect();
            Cell::Text(text)
        }
        "b" => match value {
            Some(v) => Cell::Bool(v.trim() == "1"),
            None => Cell::Empty,
        },
        "str" | "d" => match value {
            Some(v) => Cell::Text(unescape_text(&v)),
            None => Cell::Empty,
        },
        "e" => Cell::Empty,
        _ => match value {
            Some(v) => match v.trim().parse::<f64>() {
                Ok(n) => Cell::Number(n),
                Err(_) => Cell::Text(v),
            },
            None => Cell::Empty,
        },
    };
    Ok(cell)
}

/// 0-based column of an `A1`-style reference, within the format limits.
fn cell_ref_col(reference: &str) -> Result<usize> {
    CELL_REF_RE
        .captures(reference.trim())
        .and_then(|c| col_index(&c[1]))
        .filter(|col| *col < MAX_XLSX_COLS)
        .ok_or_else(|| GcmmError::Format(format!("bad cell reference '{reference}'")))
}

/// Read the first worksheet of an `.xlsx` archive.
pub fn read_xlsx(bytes: &[u8]) -> Result<Table> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let sheet_path = first_sheet_path(&mut archive)?;
    let shared = read_entry(&mut archive, "xl/sharedStrings.xml")?
        .map(|xml| parse_shared_strings(&xml))
        .unwrap_or_default();
    let sheet = read_entry(&mut archive, &sheet_path)?
        .ok_or_else(|| GcmmError::Format(format!("worksheet {sheet_path} missing")))?;

    let data = match SHEET_DATA_RE.captures(&sheet) {
        Some(caps) => caps[1].to_string(),
        None => return Ok(Table::default()),
    };

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let mut next_row = 0usize;
    for row_caps in ROW_RE.captures_iter(&data) {
        let row_attrs = attrs(&row_caps[1]);
        let row_idx = match row_attrs.get("r") {
            Some(r) => match r.trim().parse::<usize>() {
                Ok(n) if (1..=MAX_XLSX_ROWS).contains(&n) => n - 1,
                _ => return Err(GcmmError::Format(format!("bad row reference '{r}'"))),
            },
            None => next_row,
        };
        if row_idx >= MAX_XLSX_ROWS {
            return Err(GcmmError::Format(format!(
                "worksheet has more than {MAX_XLSX_ROWS} rows"
            )));
        }
        next_row = row_idx + 1;

        let mut cells: Vec<Cell> = Vec::new();
        if let Some(body) = row_caps.get(2) {
            for cell_caps in CELL_RE.captures_iter(body.as_str()) {
                let cell_attrs = attrs(&cell_caps[1]);
                let col = match cell_attrs.get("r") {
                    Some(r) => cell_ref_col(r)?,
                    None => cells.len(),
                };
                if col >= MAX_XLSX_COLS {
                    return Err(GcmmError::Format(format!(
                        "worksheet has more than {MAX_XLSX_COLS} columns"
                    )));
                }
                let cell_body = cell_caps.get(2).map(|m| m.as_str()).unwrap_or("");
                let cell = parse_cell(&cell_attrs, cell_body, &shared)?;
                if cells.len() <= col {
                    cells.resize(col + 1, Cell::Empty);
                }
                cells[col] = cell;
            }
        }

        if rows.len() <= row_idx {
            rows.resize(row_idx + 1, Vec::new());
        }
        rows[row_idx] = cells;
    }

    // Trailing styled-but-empty rows carry no data.
    while rows
        .last()
        .map(|r| r.iter().all(Cell::is_blank))
        .unwrap_or(false)
    {
        rows.pop();
    }

    Ok(Table::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_letter_and_index() {
        assert_eq!(col_letter(0), "A");
        assert_eq!(col_letter(25), "Z");
        assert_eq!(col_letter(26), "AA");
        assert_eq!(col_letter(52), "BA");
        for i in [0usize, 1, 25, 26, 27, 51, 52, 701, 702] {
            assert_eq!(col_index(&col_letter(i)), Some(i));
        }
        assert_eq!(col_index(""), None);
        assert_eq!(col_index("a1"), None);
    }

    #[test]
    fn test_cell_falsy() {
        assert!(Cell::Empty.is_falsy());
        assert!(Cell::Text("  ".into()).is_falsy());
        assert!(Cell::Number(0.0).is_falsy());
        assert!(Cell::Bool(false).is_falsy());
        assert!(!Cell::Number(1.0).is_falsy());
        assert!(!Cell::Text("0".into()).is_falsy());
    }

    #[test]
    fn test_infer_and_text() {
        assert_eq!(Cell::infer(""), Cell::Empty);
        assert_eq!(Cell::infer(" 3 "), Cell::Number(3.0));
        assert_eq!(Cell::infer("1.2.01"), Cell::Text("1.2.01".into()));
        assert_eq!(Cell::infer("NaN"), Cell::Text("NaN".into()));
        assert_eq!(Cell::Number(3.0).as_text(), Some("3".into()));
        assert_eq!(Cell::Number(1.1).as_text(), Some("1.1".into()));
        assert_eq!(Cell::Text(" ".into()).as_text(), None);
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(unescape_xml("&#233;t&#xE9;"), "été");
        assert_eq!(unescape_xml("plain"), "plain");
    }

    #[test]
    fn test_unescape_text_control_chars() {
        assert_eq!(unescape_text("a_x000B_b"), "a\u{0B}b");
        assert_eq!(unescape_text("_x005F_x000B_"), "_x000B_");
        assert_eq!(unescape_text("x_1_y &amp; z"), "x_1_y & z");
    }

    fn xlsx_with_sheet_data(rows: &str) -> Vec<u8> {
        use std::io::Write;
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = zip::write::SimpleFileOptions::default();
        zip.start_file("xl/workbook.xml", opts).unwrap();
        zip.write_all(b"<workbook/>").unwrap();
        zip.start_file("xl/worksheets/sheet1.xml", opts).unwrap();
        zip.write_all(format!("<worksheet><sheetData>{rows}</sheetData></worksheet>").as_bytes())
            .unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_xlsx_rejects_bad_references() {
        for rows in [
            r#"<row r="1"><c r="ZZZZZZZZZZZZZZZ1"><v>1</v></c></row>"#,
            r#"<row r="1"><c r="XFE1"><v>1</v></c></row>"#,
            r#"<row r="1"><c r="1A"><v>1</v></c></row>"#,
            r#"<row r="99999999999"><c r="A1"><v>1</v></c></row>"#,
            r#"<row r="1048577"><c r="A1"><v>1</v></c></row>"#,
        ] {
            let err = read_xlsx(&xlsx_with_sheet_data(rows)).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Format, "{rows}");
        }
        assert_eq!(col_index("ZZZZZZZZZZZZZZZ"), None);

        let table = read_xlsx(&xlsx_with_sheet_data(
            r#"<row r="1"><c r="XFD1"><v>7</v></c></row>"#,
        ))
        .unwrap();
        assert_eq!(table.width(), MAX_XLSX_COLS);
        assert_eq!(table.header()[MAX_XLSX_COLS - 1], Cell::Number(7.0));
    }

    #[test]
    fn test_read_csv_ragged_rows() {
        let table = read_csv(b"#Axis,Axis,Comment\n1,Legal\n,,\n2,Tech,ok\n").unwrap();
        assert_eq!(table.rows().len(), 4);
        assert_eq!(table.width(), 3);
        assert_eq!(table.data_rows()[0][0], Cell::Number(1.0));
        assert_eq!(cell_at(&table.data_rows()[0], 2), &Cell::Empty);
        assert!(table.data_rows()[1][0].is_falsy());
    }

    #[test]
    fn test_read_table_rejects_other_extensions() {
        let err = read_table("model.xls", b"").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
        let err = read_table("model.pdf", b"").unwrap_err();
        assert!(err.to_string().contains("model.pdf"));
    }

    #[test]
    fn test_read_xlsx_rejects_garbage() {
        let err = read_table("model.xlsx", b"not a zip").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
    }

    #[test]
    fn test_read_xlsx_from_writer() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "#Axis").unwrap();
        sheet.write_string(0, 1, "Axis & Co").unwrap();
        sheet.write_number(1, 0, 1.0).unwrap();
        sheet.write_string(1, 1, "Legal").unwrap();
        sheet.write_boolean(1, 2, true).unwrap();
        sheet.write_number(3, 0, 2.5).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = read_table("upload.xlsx", &bytes).unwrap();
        assert_eq!(table.rows().len(), 4);
        assert_eq!(table.header()[1], Cell::Text("Axis & Co".into()));
        assert_eq!(table.data_rows()[0][0], Cell::Number(1.0));
        assert_eq!(table.data_rows()[0][1], Cell::Text("Legal".into()));
        assert_eq!(table.data_rows()[0][2], Cell::Bool(true));
        assert!(table.data_rows()[1].is_empty());
        assert_eq!(table.data_rows()[2][0], Cell::Number(2.5));
    }

    #[test]
    fn test_read_xlsx_control_characters_survive() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "a\u{0B}b").unwrap();
        sheet.write_string(0, 1, "tab\there").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = read_xlsx(&bytes).unwrap();
        assert_eq!(table.header()[0], Cell::Text("a\u{0B}b".into()));
        assert_eq!(table.header()[1], Cell::Text("tab\there".into()));
    }
}

//! Row Parser: schema validation and typed decoding of spreadsheet rows.
//!
//! Header matching is order-independent: a schema column is present when any
//! header cell, trimmed and lower-cased, contains the column name as a
//! substring. Data cells are then read by their fixed position.

use crate::error::{GcmmError, Result};
use crate::model::Assessment;
use crate::schema::{ColumnRole, Metric, Schema, LEVEL_COUNT};
use crate::sheet::{cell_at, col_letter, Cell, Table, EMPTY_CELL};

/// Text of one maturity level as read from a row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLevel {
    pub description: String,
    pub actionable: String,
    pub strategic: String,
}

/// A decoded data row. Nullable fields are `None` when the cell was blank.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based sheet row number (the header is row 1)
    pub row: usize,
    pub axis_id: Option<i64>,
    pub axis_name: String,
    pub domain_id: Option<String>,
    pub domain_name: Option<String>,
    pub domain_description: Option<String>,
    pub objective_id: Option<String>,
    pub objective_name: Option<String>,
    pub description: String,
    pub levels: [RawLevel; LEVEL_COUNT],
    pub assessment: Assessment,
    pub comment: String,
}

/// Check the header row against the schema's required columns.
///
/// Every missing column is reported, not just the first.
pub fn validate(schema: &Schema, table: &Table) -> Result<()> {
    let expected = schema.required_len();
    let found = table.width();
    if found < expected {
        return Err(GcmmError::InsufficientColumns { expected, found });
    }

    let headers: Vec<String> = table
        .header()
        .iter()
        .map(|c| c.as_text().unwrap_or_default().trim().to_lowercase())
        .collect();

    let missing: Vec<String> = schema
        .required()
        .filter(|col| {
            let wanted = col.name.to_lowercase();
            !headers.iter().any(|h| h.contains(&wanted))
        })
        .map(|col| col.name.clone())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(GcmmError::MissingColumns(missing))
    }
}

/// Decode every data row whose first cell is truthy.
///
/// Rows with an empty, `0` or `false` first cell are skipped.
pub fn decode(schema: &Schema, table: &Table) -> Result<Vec<RawRow>> {
    let mut rows = Vec::new();
    for (i, cells) in table.data_rows().iter().enumerate() {
        let row_no = i + 2;
        if cell_at(cells, 0).is_falsy() {
            log::debug!("Skipping row {}: empty first cell", row_no);
            continue;
        }
        rows.push(decode_row(schema, cells, row_no)?);
    }
    Ok(rows)
}

/// Largest magnitude a float cell can carry as an exact integer (2^53 - 1).
const MAX_EXACT_INT: f64 = 9_007_199_254_740_991.0;

/// Truncate a float cell to an integer; `None` when it is not finite or
/// outside the exactly representable range.
fn float_to_int(n: f64) -> Option<i64> {
    let t = n.trunc();
    if t.is_finite() && t.abs() <= MAX_EXACT_INT {
        Some(t as i64)
    } else {
        None
    }
}

struct RowReader<'a> {
    schema: &'a Schema,
    cells: &'a [Cell],
    row_no: usize,
}

impl<'a> RowReader<'a> {
    fn cell(&self, role: ColumnRole) -> &'a Cell {
        match self.schema.position(role) {
            Some(pos) => cell_at(self.cells, pos),
            None => &EMPTY_CELL,
        }
    }

    fn location(&self, role: ColumnRole) -> String {
        match self.schema.columns.iter().find(|c| c.role == role) {
            Some(col) => format!(
                "row {}, column {} ('{}')",
                self.row_no,
                col_letter(col.position),
                col.name
            ),
            None => format!("row {}", self.row_no),
        }
    }

    fn text(&self, role: ColumnRole) -> String {
        self.cell(role).as_text().unwrap_or_default()
    }

    fn opt_text(&self, role: ColumnRole) -> Option<String> {
        self.cell(role).as_text()
    }

    fn id(&self, role: ColumnRole) -> Option<String> {
        self.cell(role).as_text().map(|s| s.trim().to_string())
    }

    fn int(&self, role: ColumnRole) -> Result<Option<i64>> {
        let cell = self.cell(role);
        let bad = |value: String| GcmmError::data(self.location(role), value, "expected an integer");
        match cell {
            Cell::Empty => Ok(None),
            Cell::Bool(b) => Ok(Some(i64::from(*b))),
            Cell::Number(n) => float_to_int(*n).map(Some).ok_or_else(|| bad(n.to_string())),
            Cell::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    return Ok(None);
                }
                if let Ok(v) = t.parse::<i64>() {
                    return Ok(Some(v));
                }
                t.parse::<f64>()
                    .ok()
                    .and_then(float_to_int)
                    .map(Some)
                    .ok_or_else(|| bad(s.clone()))
            }
        }
    }

    /// Float score, 0 when blank.
    fn score(&self, role: ColumnRole) -> Result<f64> {
        match self.cell(role) {
            Cell::Empty => Ok(0.0),
            Cell::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Cell::Number(n) => Ok(*n),
            Cell::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    return Ok(0.0);
                }
                t.parse::<f64>().map_err(|_| {
                    GcmmError::data(self.location(role), s.clone(), "expected a number")
                })
            }
        }
    }

    /// Maturity level 0..=5; `None` when blank.
    fn level(&self, role: ColumnRole) -> Result<Option<u8>> {
        match self.int(role)? {
            None => Ok(None),
            Some(v) if (0..=5).contains(&v) => Ok(Some(v as u8)),
            Some(v) => Err(GcmmError::data(
                self.location(role),
                v.to_string(),
                "maturity level must be between 0 and 5",
            )),
        }
    }

    fn assessment(&self) -> Result<Assessment> {
        match self.schema.metric() {
            Metric::Evaluation => Ok(Assessment::Score {
                evaluation: self.score(ColumnRole::Evaluation)?,
            }),
            Metric::Profile => {
                let profile = self.level(ColumnRole::Profile)?.unwrap_or(0);
                let target_profile = self.level(ColumnRole::TargetProfile)?.unwrap_or(profile);
                Ok(Assessment::Profile {
                    profile,
                    target_profile,
                })
            }
        }
    }
}

fn decode_row(schema: &Schema, cells: &[Cell], row_no: usize) -> Result<RawRow> {
    let r = RowReader {
        schema,
        cells,
        row_no,
    };
    let levels: [RawLevel; LEVEL_COUNT] = std::array::from_fn(|i| RawLevel {
        description: r.text(ColumnRole::Level(i)),
        actionable: r.text(ColumnRole::Actionable(i)),
        strategic: r.text(ColumnRole::Strategic(i)),
    });
    Ok(RawRow {
        row: row_no,
        axis_id: r.int(ColumnRole::AxisId)?,
        axis_name: r.text(ColumnRole::AxisName),
        domain_id: r.id(ColumnRole::DomainId),
        domain_name: r.opt_text(ColumnRole::DomainName),
        domain_description: r.opt_text(ColumnRole::DomainDescription),
        objective_id: r.id(ColumnRole::ObjectiveId),
        objective_name: r.opt_text(ColumnRole::ObjectiveName),
        description: r.text(ColumnRole::Description),
        levels,
        assessment: r.assessment()?,
        comment: r.text(ColumnRole::Comment),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::SchemaVariant;

    fn header(schema: &Schema) -> Vec<String> {
        schema.header_names().iter().map(|s| s.to_string()).collect()
    }

    fn table(rows: Vec<Vec<String>>) -> Table {
        let refs: Vec<Vec<&str>> = rows
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect();
        Table::from_strings(&refs)
    }

    fn profile_row(axis: &str, obj: &str, profile: &str, target: &str) -> Vec<String> {
        let mut row: Vec<String> = vec![
            axis, "Legal", "1.1", "Laws", "Legal basis", obj, "Access", "Desc", "L1", "L2", "L3",
            "L4", "L5", profile, target, "note",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        for i in 1..=5 {
            row.push(format!("act {i}"));
        }
        for i in 1..=5 {
            row.push(format!("strat {i}"));
        }
        row
    }

    #[test]
    fn test_validate_accepts_reordered_and_decorated_headers() {
        let schema = Schema::for_variant(SchemaVariant::Profile);
        let mut names = header(&schema);
        names.truncate(16);
        names.reverse();
        let names: Vec<String> = names.iter().map(|n| format!("  {} *", n.to_uppercase())).collect();
        assert!(validate(&schema, &table(vec![names])).is_ok());
    }

    #[test]
    fn test_validate_reports_all_missing_columns() {
        let schema = Schema::for_variant(SchemaVariant::Profile);
        let mut names = header(&schema);
        names.truncate(16);
        // "Domain Description" would also satisfy "Description" by substring.
        names[4] = "Domain Notes".into();
        names[7] = "Notes".into();
        names[15] = "Remarks".into();
        let err = validate(&schema, &table(vec![names])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        match err {
            GcmmError::MissingColumns(missing) => {
                assert_eq!(
                missing,
                vec![
                    "Domain Description".to_string(),
                    "Description".to_string(),
                    "Comment".to_string()
                ]
            )
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_validate_rejects_narrow_tables() {
        let schema = Schema::for_variant(SchemaVariant::Evaluation);
        let err = validate(&schema, &table(vec![vec!["#Axis".into(), "Axis".into()]])).unwrap_err();
        assert!(matches!(
            err,
            GcmmError::InsufficientColumns {
                expected: 15,
                found: 2
            }
        ));
    }

    #[test]
    fn test_decode_profile_rows() {
        let schema = Schema::for_variant(SchemaVariant::Profile);
        let t = table(vec![
            header(&schema),
            profile_row("1", "1.1.01", "2", "4"),
            profile_row("", "1.1.02", "2", "4"),
            profile_row("0", "1.1.03", "2", "4"),
            profile_row("2", "2.1.01", "", ""),
        ]);
        let rows = decode(&schema, &t).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.row, 2);
        assert_eq!(first.axis_id, Some(1));
        assert_eq!(first.domain_id.as_deref(), Some("1.1"));
        assert_eq!(first.domain_description.as_deref(), Some("Legal basis"));
        assert_eq!(first.objective_id.as_deref(), Some("1.1.01"));
        assert_eq!(first.levels[2].description, "L3");
        assert_eq!(first.levels[2].actionable, "act 3");
        assert_eq!(first.levels[4].strategic, "strat 5");
        assert_eq!(
            first.assessment,
            Assessment::Profile {
                profile: 2,
                target_profile: 4
            }
        );
        assert_eq!(first.comment, "note");

        assert_eq!(rows[1].row, 5);
        assert_eq!(
            rows[1].assessment,
            Assessment::Profile {
                profile: 0,
                target_profile: 0
            }
        );
    }

    #[test]
    fn test_decode_tolerates_missing_recommendation_blocks() {
        let schema = Schema::for_variant(SchemaVariant::Evaluation);
        let mut row: Vec<String> = vec![
            "3", "Org", "3.2", "Committees", "", "3.2.65", "Exec", "", "a", "b", "c", "d", "e",
            "", "",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        let t = table(vec![header(&schema)[..15].to_vec(), row.clone()]);
        let rows = decode(&schema, &t).unwrap();
        assert_eq!(rows[0].assessment, Assessment::Score { evaluation: 0.0 });
        assert_eq!(rows[0].levels[0].actionable, "");
        assert_eq!(rows[0].domain_description, None);
        assert_eq!(rows[0].comment, "");

        row[13] = "3.5".into();
        let t = table(vec![header(&schema)[..15].to_vec(), row]);
        let rows = decode(&schema, &t).unwrap();
        assert_eq!(rows[0].assessment, Assessment::Score { evaluation: 3.5 });
    }

    #[test]
    fn test_decode_reports_bad_axis_id() {
        let schema = Schema::for_variant(SchemaVariant::Profile);
        let t = table(vec![header(&schema), profile_row("Legal", "1.1.01", "1", "2")]);
        let err = decode(&schema, &t).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
        let msg = err.to_string();
        assert!(msg.contains("'Legal'"), "{msg}");
        assert!(msg.contains("row 2, column A ('#Axis')"), "{msg}");
    }

    #[test]
    fn test_decode_rejects_huge_axis_ids() {
        let schema = Schema::for_variant(SchemaVariant::Profile);
        for axis in ["1e30", "-1e300", "9007199254740993"] {
            let t = table(vec![header(&schema), profile_row(axis, "1.1.01", "1", "2")]);
            let err = decode(&schema, &t).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Data, "{axis}");
            assert!(err.to_string().contains("expected an integer"), "{err}");
        }
    }

    #[test]
    fn test_decode_extreme_integer_axis_id_text() {
        let schema = Schema::for_variant(SchemaVariant::Profile);
        let mut cells: Vec<Cell> = profile_row("1", "1.1.01", "1", "2")
            .iter()
            .map(|s| Cell::infer(s))
            .collect();
        cells[0] = Cell::Text("-9223372036854775808".into());
        let t = Table::new(vec![
            header(&schema).iter().map(|h| Cell::Text(h.clone())).collect(),
            cells,
        ]);
        let rows = decode(&schema, &t).unwrap();
        assert_eq!(rows[0].axis_id, Some(i64::MIN));
        let ds = crate::hierarchy::build(&rows, &crate::config::ToolkitConfig::default());
        assert_eq!(ds.axes[0].id, i64::MIN);
    }

    #[test]
    fn test_decode_rejects_out_of_range_profile() {
        let schema = Schema::for_variant(SchemaVariant::Profile);
        let t = table(vec![header(&schema), profile_row("1", "1.1.01", "7", "7")]);
        let err = decode(&schema, &t).unwrap_err();
        assert!(err.to_string().contains("'Profil'"));
    }

    #[test]
    fn test_decode_numeric_ids_are_stringified() {
        let schema = Schema::for_variant(SchemaVariant::Profile);
        let mut row = profile_row("1.0", "7", "1", "1");
        row[2] = "1.5".into();
        let t = table(vec![header(&schema), row]);
        let rows = decode(&schema, &t).unwrap();
        assert_eq!(rows[0].axis_id, Some(1));
        assert_eq!(rows[0].domain_id.as_deref(), Some("1.5"));
        assert_eq!(rows[0].objective_id.as_deref(), Some("7"));
    }
}

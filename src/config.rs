//! Toolkit configuration.

use crate::schema::{Schema, SchemaVariant};

/// Axis palette, assigned by `(axis_id - 1) mod 5`.
pub const AXIS_COLORS: [&str; 5] = [
    "#3366CC", // blue
    "#DC3912", // red
    "#FF9900", // orange
    "#109618", // green
    "#990099", // purple
];

pub const DEFAULT_REPORT_TITLE: &str = "GCMM Maturity Assessment Report";

/// Settings shared by the ingest, aggregation and export stages.
#[derive(Debug, Clone)]
pub struct ToolkitConfig {
    /// Spreadsheet layout expected on upload and produced on export
    pub variant: SchemaVariant,
    /// Axis colours, cycled by axis id
    pub palette: Vec<String>,
    /// Title of the DOCX report
    pub report_title: String,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            variant: SchemaVariant::default(),
            palette: AXIS_COLORS.iter().map(|c| c.to_string()).collect(),
            report_title: DEFAULT_REPORT_TITLE.to_string(),
        }
    }
}

impl ToolkitConfig {
    pub fn with_variant(mut self, variant: SchemaVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Replace the palette. An empty palette keeps the default.
    pub fn with_palette(mut self, palette: Vec<String>) -> Self {
        if !palette.is_empty() {
            self.palette = palette;
        }
        self
    }

    pub fn with_report_title(mut self, title: impl Into<String>) -> Self {
        self.report_title = title.into();
        self
    }

    pub fn schema(&self) -> Schema {
        Schema::for_variant(self.variant)
    }

    /// Palette colour for an axis id: `palette[(id - 1) mod len]`.
    pub fn axis_color(&self, axis_id: i64) -> String {
        let len = self.palette.len() as i128;
        let idx = (i128::from(axis_id) - 1).rem_euclid(len) as usize;
        self.palette[idx].clone()
    }
}

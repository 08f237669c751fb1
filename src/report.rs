//! DOCX narrative report.
//!
//! Same tree walk as the flattener, rendered as headings and paragraphs:
//! one section per axis, a subsection per domain, and per objective its
//! current/target level with the recommendations selected by
//! [`recommendation_levels`].

use crate::config::ToolkitConfig;
use crate::error::{GcmmError, Result};
use crate::flatten::recommendation_levels;
use crate::model::{Assessment, Dataset, Objective};
use crate::schema::LEVEL_LABELS;
use std::io::{Cursor, Write};

pub const REPORT_FILENAME: &str = "GCMM_Report.docx";
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:pPr><w:spacing w:after="120"/></w:pPr><w:rPr><w:sz w:val="22"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:pPr><w:spacing w:after="240"/></w:pPr><w:rPr><w:b/><w:sz w:val="48"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="360"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:color w:val="1F3864"/><w:sz w:val="36"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240"/><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:b/><w:color w:val="2F5496"/><w:sz w:val="28"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="200"/><w:outlineLvl w:val="2"/></w:pPr><w:rPr><w:b/><w:sz w:val="24"/></w:rPr></w:style></w:styles>"#;

/// Characters XML 1.0 allows in a document.
fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r') || (ch >= ' ' && ch != '\u{FFFE}' && ch != '\u{FFFF}')
}

/// Escape text for XML character data and attribute values. Characters
/// XML 1.0 forbids (most C0 controls) are dropped.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars().filter(|c| is_xml_char(*c)) {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn run(text: &str, bold: bool) -> String {
    let props = if bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
    format!(
        r#"<w:r>{}<w:t xml:space="preserve">{}</w:t></w:r>"#,
        props,
        escape_xml(text)
    )
}

/// Accumulates `<w:p>` elements for the document body.
#[derive(Default)]
struct Body {
    xml: String,
    paragraphs: usize,
}

impl Body {
    fn styled(&mut self, style: &str, text: &str) {
        self.xml.push_str(&format!(
            r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr>{}</w:p>"#,
            style,
            run(text, false)
        ));
        self.paragraphs += 1;
    }

    fn heading(&mut self, level: u8, text: &str) {
        self.styled(&format!("Heading{level}"), text);
    }

    fn paragraph(&mut self, text: &str) {
        self.xml.push_str(&format!("<w:p>{}</w:p>", run(text, false)));
        self.paragraphs += 1;
    }

    /// Bold label followed by plain text.
    fn labeled(&mut self, label: &str, text: &str) {
        self.xml.push_str(&format!(
            "<w:p>{}{}</w:p>",
            run(&format!("{label}: "), true),
            run(text, false)
        ));
        self.paragraphs += 1;
    }
}

fn level_name(level: u8) -> String {
    match level {
        1..=5 => format!("Level {} ({})", level, LEVEL_LABELS[level as usize - 1]),
        _ => "Not assessed".to_string(),
    }
}

fn render_objective(body: &mut Body, objective: &Objective) {
    body.heading(3, &format!("{} {}", objective.id, objective.name));
    if !objective.description.is_empty() {
        body.paragraph(&objective.description);
    }

    match objective.assessment {
        Assessment::Score { evaluation } => {
            body.labeled("Evaluation", &format!("{:.1} / 5", evaluation));
        }
        Assessment::Profile {
            profile,
            target_profile,
        } => {
            body.labeled("Current level", &level_name(profile));
            body.labeled("Target level", &level_name(target_profile));

            let selected = recommendation_levels(profile, target_profile);
            if !selected.is_empty() {
                body.labeled("Recommendations", "");
            }
            for i in selected {
                let Some(level) = objective.levels.get(i) else {
                    continue;
                };
                body.labeled(&level_name(level.level), &level.description);
                if !level.actionable.is_empty() {
                    body.labeled("Actionable", &level.actionable);
                }
                if !level.strategic.is_empty() {
                    body.labeled("Strategic", &level.strategic);
                }
            }
        }
    }

    if !objective.comment.is_empty() {
        body.labeled("Comment", &objective.comment);
    }
}

/// Render `word/document.xml` for a dataset.
pub fn render_document_xml(dataset: &Dataset, config: &ToolkitConfig, generated: &str) -> String {
    let mut body = Body::default();
    body.styled("Title", &config.report_title);
    body.labeled("Generated", generated);
    body.labeled("Global score", &format!("{:.1} / 5", dataset.global_score));

    body.heading(1, "Summary");
    for axis in &dataset.axes {
        body.labeled(
            &format!("Axe {}: {}", axis.id, axis.name),
            &format!("{:.2} / 5", axis.score),
        );
    }

    for axis in &dataset.axes {
        body.heading(1, &format!("Axe {}: {}", axis.id, axis.name));
        body.labeled("Score", &format!("{:.2} / 5", axis.score));
        if let Some(description) = axis.description.as_deref().filter(|d| !d.is_empty()) {
            body.paragraph(description);
        }

        for domain in dataset.domains_of(axis.id) {
            body.heading(2, &format!("{} {}", domain.id, domain.name));
            body.labeled("Score", &format!("{:.2} / 5", domain.score));
            if let Some(description) = domain.description.as_deref().filter(|d| !d.is_empty()) {
                body.paragraph(description);
            }
            for objective in dataset.objectives_of(domain) {
                render_objective(&mut body, objective);
            }
        }
    }

    log::debug!("Report body: {} paragraphs", body.paragraphs);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#,
        body.xml
    )
}

fn core_properties(title: &str, created: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{}</dc:title><dcterms:created xsi:type="dcterms:W3CDTF">{}</dcterms:created></cp:coreProperties>"#,
        escape_xml(title),
        created
    )
}

/// Build the DOCX report with an explicit timestamp.
pub fn write_docx_at(
    dataset: &Dataset,
    config: &ToolkitConfig,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<u8>> {
    let document = render_document_xml(dataset, config, &now.format("%Y-%m-%d %H:%M UTC").to_string());
    let core = core_properties(&config.report_title, &now.format("%Y-%m-%dT%H:%M:%SZ").to_string());

    let entries: [(&str, &[u8]); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("docProps/core.xml", core.as_bytes()),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS.as_bytes()),
        ("word/styles.xml", STYLES.as_bytes()),
        ("word/document.xml", document.as_bytes()),
    ];

    let zip_err = |e: zip::result::ZipError| GcmmError::Internal(format!("failed to write DOCX: {e}"));
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let deflated =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in entries {
        zip.start_file(name, deflated).map_err(zip_err)?;
        zip.write_all(data)
            .map_err(|e| GcmmError::Internal(format!("failed to write DOCX entry {name}: {e}")))?;
    }
    let cursor = zip.finish().map_err(zip_err)?;
    Ok(cursor.into_inner())
}

/// Build the DOCX report stamped with the current time.
pub fn write_docx(dataset: &Dataset, config: &ToolkitConfig) -> Result<Vec<u8>> {
    write_docx_at(dataset, config, chrono::Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::recompute;
    use crate::hierarchy::build;
    use crate::hierarchy::tests::raw_row;
    use std::io::Read;

    fn dataset() -> Dataset {
        let mut rows = vec![
            raw_row(
                1,
                "1.1",
                "1.1.01",
                Assessment::Profile {
                    profile: 2,
                    target_profile: 4,
                },
            ),
            raw_row(
                1,
                "1.1",
                "1.1.02",
                Assessment::Profile {
                    profile: 3,
                    target_profile: 3,
                },
            ),
        ];
        rows[0].domain_description = Some("Laws & <rules>".into());
        rows[0].comment = "Reviewed".into();
        let mut ds = build(&rows, &ToolkitConfig::default());
        recompute(&mut ds);
        ds
    }

    #[test]
    fn test_document_narrative() {
        let xml = render_document_xml(&dataset(), &ToolkitConfig::default(), "2026-01-01");
        assert!(xml.contains("GCMM Maturity Assessment Report"));
        assert!(xml.contains("Axe 1: Axis 1"));
        assert!(xml.contains("Laws &amp; &lt;rules&gt;"));
        assert!(xml.contains("Level 2 (Initiated)"));
        assert!(xml.contains("Level 4 (Managed)"));
        // Levels 2..=4 for profile 2 → 4; nothing for the 3 → 3 objective.
        assert!(xml.contains("act 2"));
        assert!(xml.contains("act 3"));
        assert!(xml.contains("act 4"));
        assert!(!xml.contains("act 1"));
        assert!(!xml.contains("act 5"));
        assert_eq!(xml.matches("Recommendations: ").count(), 1);
        assert!(xml.contains("Reviewed"));
        assert!(xml.contains("2.50 / 5"));
    }

    #[test]
    fn test_docx_archive_layout() {
        let bytes = write_docx(&dataset(), &ToolkitConfig::default()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "word/document.xml",
            "word/styles.xml",
            "docProps/core.xml",
        ] {
            assert!(archive.by_name(name).is_ok(), "missing {name}");
        }
        let mut doc = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut doc)
            .unwrap();
        assert!(doc.starts_with("<?xml"));
        assert!(doc.contains("1.1.01 Objective 1.1.01"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&quot;c&apos;");
        assert_eq!(escape_xml("a\u{0B}b\u{0}c\u{1F}"), "abc");
        assert_eq!(escape_xml("tab\tline\nend\r"), "tab\tline\nend\r");
        assert_eq!(escape_xml("x\u{FFFE}y"), "xy");
    }

    #[test]
    fn test_control_characters_do_not_reach_document() {
        let mut ds = dataset();
        ds.objectives[0].comment = "needs\u{0B}review".into();
        ds.axes[0].name = "Axis\u{7}1".into();
        let xml = render_document_xml(&ds, &ToolkitConfig::default(), "2026-01-01");
        assert!(!xml.chars().any(|c| c < ' ' && !matches!(c, '\t' | '\n' | '\r')));
        assert!(xml.contains("needsreview"));
        assert!(xml.contains("Axe 1: Axis1"));
    }
}

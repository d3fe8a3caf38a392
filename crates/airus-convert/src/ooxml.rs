//! Helpers shared by the Office Open XML (DOCX/XLSX) codecs

use crate::error::ConvertError;

pub const XML_DECLARATION: &str =
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

pub const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
pub const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const DOCUMENT_RELS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Escape text for use in XML character data and attribute values.
///
/// Characters not allowed in XML 1.0 (most C0 controls) are dropped.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

/// Package-level relationships pointing at the main part.
pub fn root_relationships(main_part: &str) -> String {
    format!(
        r#"{decl}<Relationships xmlns="{ns}"><Relationship Id="rId1" Type="{rel}" Target="{target}"/></Relationships>"#,
        decl = XML_DECLARATION,
        ns = RELATIONSHIPS_NS,
        rel = OFFICE_DOCUMENT_REL,
        target = main_part,
    )
}

/// Parse a package part, naming the part in errors.
pub fn parse_part<'a>(part: &str, xml: &'a str) -> Result<roxmltree::Document<'a>, ConvertError> {
    roxmltree::Document::parse(xml).map_err(|e| ConvertError::Xml {
        part: part.to_string(),
        message: e.to_string(),
    })
}

//! Minimal WordprocessingML (DOCX) reader and writer
//!
//! Only plain text survives: one `<w:p>` per paragraph, runs concatenated.
//! Styling, tables and images are not represented.

use crate::archive::{open_archive, read_entry_text, ArchiveBuilder};
use crate::error::ConvertError;
use crate::ooxml::{escape_xml, parse_part, root_relationships, OFFICE_DOCUMENT_REL, XML_DECLARATION};
use roxmltree::Node;

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const DEFAULT_MAIN_PART: &str = "word/document.xml";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

/// Build a DOCX package with one paragraph per entry of `paragraphs`.
pub fn write_docx(paragraphs: &[String]) -> Result<Vec<u8>, ConvertError> {
    let mut body = String::new();
    for paragraph in paragraphs {
        if paragraph.is_empty() {
            body.push_str("<w:p/>");
        } else {
            body.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
            body.push_str(&escape_xml(paragraph));
            body.push_str("</w:t></w:r></w:p>");
        }
    }

    let document = format!(
        r#"{}<w:document xmlns:w="{}"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        XML_DECLARATION, W_NS, body
    );

    let mut archive = ArchiveBuilder::new();
    archive.add_file("[Content_Types].xml", CONTENT_TYPES.as_bytes())?;
    archive.add_file("_rels/.rels", root_relationships(DEFAULT_MAIN_PART).as_bytes())?;
    archive.add_file(DEFAULT_MAIN_PART, document.as_bytes())?;
    archive.finish()
}

/// Extract the raw text of a DOCX package, one entry per paragraph.
///
/// Explicit line breaks inside a paragraph (`<w:br/>`, `<w:cr/>`) start a new
/// entry; tabs become `'\t'`.
pub fn read_paragraphs(bytes: &[u8]) -> Result<Vec<String>, ConvertError> {
    let mut archive = open_archive(bytes)?;

    let main_part = match read_entry_text(&mut archive, "_rels/.rels")? {
        Some(rels) => main_part_from_rels(&rels)?.unwrap_or_else(|| DEFAULT_MAIN_PART.to_string()),
        None => DEFAULT_MAIN_PART.to_string(),
    };

    let xml = read_entry_text(&mut archive, &main_part)?.ok_or_else(|| {
        ConvertError::InvalidDocument(format!("Package has no main document part ({})", main_part))
    })?;
    let doc = parse_part(&main_part, &xml)?;

    let body = doc
        .descendants()
        .find(|n| n.has_tag_name((W_NS, "body")))
        .ok_or_else(|| ConvertError::InvalidDocument("Document has no body".into()))?;

    let mut paragraphs = Vec::new();
    for paragraph in body.descendants().filter(|n| n.has_tag_name((W_NS, "p"))) {
        let text = paragraph_text(paragraph);
        paragraphs.extend(text.split('\n').map(str::to_string));
    }

    Ok(paragraphs)
}

fn main_part_from_rels(rels: &str) -> Result<Option<String>, ConvertError> {
    let doc = parse_part("_rels/.rels", rels)?;
    Ok(doc
        .descendants()
        .filter(|n| n.tag_name().name() == "Relationship")
        .find(|n| n.attribute("Type") == Some(OFFICE_DOCUMENT_REL))
        .and_then(|n| n.attribute("Target"))
        .map(|target| target.trim_start_matches('/').to_string()))
}

/// Text of one paragraph, skipping paragraphs nested inside it (text boxes),
/// which are visited on their own.
fn paragraph_text(paragraph: Node) -> String {
    let mut text = String::new();

    for node in paragraph.descendants().skip(1) {
        let owner = node.ancestors().find(|a| a.has_tag_name((W_NS, "p")));
        if owner != Some(paragraph) {
            continue;
        }

        if node.has_tag_name((W_NS, "t")) {
            text.push_str(node.text().unwrap_or_default());
        } else if node.has_tag_name((W_NS, "tab")) {
            text.push('\t');
        } else if node.has_tag_name((W_NS, "br")) || node.has_tag_name((W_NS, "cr")) {
            text.push('\n');
        }
    }

    text
}

//! Render plain-text paragraphs into a PDF

use crate::document::save_document;
use crate::error::ConvertError;
use crate::font::PdfFont;
use crate::layout::{layout_pages, PageSetup};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};

const FONT_RESOURCE: &[u8] = b"F1";

/// Lay out `paragraphs` with `font` and write one PDF page per layout page.
///
/// Fails with [`ConvertError::UnsupportedText`] when the font is Helvetica
/// and the text has characters outside WinAnsiEncoding.
pub fn render_paragraphs(
    paragraphs: &[String],
    font: &PdfFont,
    setup: &PageSetup,
) -> Result<Vec<u8>, ConvertError> {
    font.check_coverage(paragraphs.iter().map(String::as_str))?;
    let pages = layout_pages(paragraphs, font, setup);

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = font.add_to_document(&mut doc, paragraphs.iter().map(String::as_str));
    let resources_id = doc.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![(
            FONT_RESOURCE.to_vec(),
            Object::Reference(font_id),
        )])),
    )]));

    let mut page_ids = Vec::with_capacity(pages.len());
    for lines in &pages {
        let mut operations = Vec::new();
        for line in lines.iter().filter(|line| !line.text.is_empty()) {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![
                    Object::Name(FONT_RESOURCE.to_vec()),
                    Object::Real(setup.font_size as f32),
                ],
            ));
            operations.push(Operation::new(
                "Td",
                vec![Object::Real(line.x as f32), Object::Real(line.y as f32)],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(font.encode(&line.text)?, font.string_format())],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations }
            .encode()
            .map_err(|e| ConvertError::OperationError(format!("Content encoding failed: {}", e)))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(setup.width as f32),
                    Object::Real(setup.height as f32),
                ]),
            ),
            ("Resources", Object::Reference(resources_id)),
            ("Contents", Object::Reference(content_id)),
        ]);
        page_ids.push(doc.add_object(page));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(page_ids.len() as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    doc.compress();
    save_document(&mut doc)
}

//! Document codecs for the AiRus conversion tools
//!
//! Everything here works on in-memory byte buffers and is synchronous; callers
//! that live on an async runtime are expected to run these on a blocking pool.
//!
//! - PDF: merge, split into a ZIP of single pages, unlock (RC4 and AES
//!   security handlers), text extraction
//! - Text to PDF: line layout with font metrics and lopdf rendering
//! - DOCX / XLSX: minimal Office Open XML readers and writers
//! - CSV: plain comma splitting on input, standard quoting on output

pub mod archive;
pub mod document;
pub mod docx;
pub mod error;
pub mod extract;
pub mod font;
pub mod layout;
pub mod merge;
pub mod ooxml;
pub mod render;
pub(crate) mod security;
pub mod split;
pub mod table;
pub mod unlock;
pub mod xlsx;

pub use archive::ArchiveBuilder;
pub use docx::{read_paragraphs, write_docx, DOCX_MIME};
pub use error::ConvertError;
pub use extract::{extract_lines, extract_text};
pub use font::PdfFont;
pub use layout::PageSetup;
pub use merge::merge_documents;
pub use render::render_paragraphs;
pub use split::{split_to_archive, MIN_SPLIT_PAGES};
pub use table::{parse_plain_csv, write_csv};
pub use unlock::unlock_document;
pub use xlsx::{read_first_sheet, write_xlsx, XLSX_MIME};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, ConvertError> {
    let doc = document::load_unrestricted(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

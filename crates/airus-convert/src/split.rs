//! PDF Split algorithm
//!
//! Each page is cut out of a copy of the source by deleting every other page
//! and pruning unreachable objects; the one-page documents are bundled into a
//! ZIP archive.

use crate::archive::ArchiveBuilder;
use crate::document::{load_unrestricted, save_document};
use crate::error::ConvertError;
use lopdf::Document;
use tracing::debug;

/// Minimum page count for a document to be worth splitting.
pub const MIN_SPLIT_PAGES: usize = 2;

/// Split every page into its own single-page PDF, returned as a ZIP archive
/// with entries `page_1.pdf`, `page_2.pdf`, ... in page order.
pub fn split_to_archive(bytes: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let doc = load_unrestricted(bytes)?;
    let page_count = doc.get_pages().len();

    if page_count < MIN_SPLIT_PAGES {
        return Err(ConvertError::InsufficientPages(page_count));
    }

    let mut archive = ArchiveBuilder::new();
    for page in 1..=page_count as u32 {
        let single = extract_page(&doc, page, page_count as u32)?;
        archive.add_file(&format!("page_{}.pdf", page), &single)?;
    }
    debug!(pages = page_count, "Split document into single pages");

    archive.finish()
}

/// Keep `page` (1-indexed) of a copy of `doc` and drop everything no longer
/// reachable from it.
fn extract_page(doc: &Document, page: u32, page_count: u32) -> Result<Vec<u8>, ConvertError> {
    let mut single = doc.clone();

    let others: Vec<u32> = (1..=page_count).filter(|&p| p != page).collect();
    if !others.is_empty() {
        single.delete_pages(&others);
    }

    single.prune_objects();
    single.compress();

    save_document(&mut single)
}

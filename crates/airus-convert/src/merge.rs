//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single new document.

use crate::document::{load_unrestricted, save_document};
use crate::error::ConvertError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Merge PDFs into one, preserving file order and page order within each file
///
/// The algorithm:
/// 1. If empty, return error
/// 2. Create a new destination document with its own page tree
/// 3. For each source document:
///    a. Materialize inherited page attributes onto each page
///    b. Import all objects with IDs offset past the destination's max ID
///    c. Re-parent its pages under the destination page tree
/// 4. Drop the orphaned source catalogs, compress and return the result
pub fn merge_documents(documents: &[Vec<u8>]) -> Result<Vec<u8>, ConvertError> {
    if documents.is_empty() {
        return Err(ConvertError::OperationError("No documents to merge".into()));
    }

    let mut dest = Document::with_version("1.7");
    let pages_id = dest.new_object_id();
    let mut page_refs: Vec<ObjectId> = Vec::new();

    for (i, doc_bytes) in documents.iter().enumerate() {
        let mut source = load_unrestricted(doc_bytes).map_err(|e| match e {
            ConvertError::PasswordRequired | ConvertError::UnsupportedEncryption(_) => e,
            other => ConvertError::InvalidDocument(format!(
                "Failed to load document {}: {}",
                i + 1,
                other
            )),
        })?;
        materialize_inherited_attributes(&mut source);

        // Pages in page-number order, captured before the objects move
        let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();
        debug!(document = i + 1, pages = source_pages.len(), "Importing pages");

        let id_offset = dest.max_id;
        for (old_id, object) in std::mem::take(&mut source.objects) {
            let new_id = (old_id.0 + id_offset, old_id.1);
            dest.objects.insert(new_id, remap_object_refs(object, id_offset));
        }
        page_refs.extend(
            source_pages
                .into_iter()
                .map(|old_page_ref| (old_page_ref.0 + id_offset, old_page_ref.1)),
        );

        dest.max_id = (source.max_id + id_offset).max(dest.max_id);
    }

    for page_ref in &page_refs {
        if let Some(Object::Dictionary(page)) = dest.objects.get_mut(page_ref) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(page_refs.len() as i64)),
        (
            "Kids",
            Object::Array(page_refs.iter().map(|&id| Object::Reference(id)).collect()),
        ),
    ]);
    dest.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = dest.add_object(catalog);
    dest.trailer.set("Root", Object::Reference(catalog_id));

    dest.prune_objects();
    dest.compress();

    save_document(&mut dest)
}

/// Copy attributes a page inherits from its parents onto the page itself, so
/// the page renders identically once re-parented into another tree.
pub(crate) fn materialize_inherited_attributes(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    for page_id in page_ids {
        let mut inherited = Vec::new();
        if let Ok(page) = doc.get_dictionary(page_id) {
            for key in INHERITABLE_KEYS {
                if page.has(key) {
                    continue;
                }
                if let Some(value) = find_inherited(doc, page, key) {
                    inherited.push((key, value));
                }
            }
        }

        if inherited.is_empty() {
            continue;
        }
        if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            for (key, value) in inherited {
                page.set(key, value);
            }
        }
    }
}

fn find_inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    // Guard against cyclic Parent chains in broken files
    let mut depth = 0;

    while let Some(node_id) = parent {
        let node = doc.get_dictionary(node_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        depth += 1;
        if depth > 64 {
            return None;
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

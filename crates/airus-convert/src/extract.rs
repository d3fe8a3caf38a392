//! PDF text extraction
//!
//! Wraps `pdf-extract`, which is known to panic on some malformed inputs.
//! Panics are caught and reported as [`ConvertError::ExtractionFailed`].
//! Encrypted documents are decrypted first, since the extractor only opens
//! RC4 security handlers.

use crate::document::save_document;
use crate::error::ConvertError;
use crate::security::remove_security;
use lopdf::Document;
use pdf_extract::extract_text_from_mem;
use std::panic::{self, AssertUnwindSafe};

/// Extract the plain text of a PDF.
pub fn extract_text(pdf_bytes: &[u8]) -> Result<String, ConvertError> {
    let decrypted = decrypted_copy(pdf_bytes)?;
    let bytes = decrypted.as_deref().unwrap_or(pdf_bytes);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| extract_text_from_mem(bytes)));

    match outcome {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ConvertError::ExtractionFailed(e.to_string())),
        Err(_) => Err(ConvertError::ExtractionFailed(
            "PDF text extractor aborted on this document".into(),
        )),
    }
}

/// The document saved without its security handler, or `None` when it is
/// not encrypted. Parse failures are left for the extractor to report.
fn decrypted_copy(pdf_bytes: &[u8]) -> Result<Option<Vec<u8>>, ConvertError> {
    let Ok(mut doc) = Document::load_mem(pdf_bytes) else {
        return Ok(None);
    };
    if !doc.trailer.has(b"Encrypt") {
        return Ok(None);
    }
    remove_security(&mut doc)?;
    save_document(&mut doc).map(Some)
}

/// Extract text and split it into lines, one entry per line break
/// (`\n` or `\r\n`).
pub fn extract_lines(pdf_bytes: &[u8]) -> Result<Vec<String>, ConvertError> {
    let text = extract_text(pdf_bytes)?;
    Ok(text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect())
}

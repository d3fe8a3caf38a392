//! Loading and saving lopdf documents
//!
//! Uploaded PDFs frequently carry owner-password restrictions (no printing,
//! no copying). Every tool loads sources through [`load_unrestricted`], which
//! opens the file with the empty user password and strips the security
//! handler (see [`crate::security`]) so later saves are written in the clear.

use crate::error::ConvertError;
use crate::security::remove_security;
use lopdf::Document;
use tracing::debug;

/// Parse PDF bytes, decrypting with the empty user password when needed.
///
/// Documents that require a real user password fail with
/// [`ConvertError::PasswordRequired`]; encryption schemes other than the
/// standard RC4/AES handlers fail with [`ConvertError::UnsupportedEncryption`].
pub fn load_unrestricted(bytes: &[u8]) -> Result<Document, ConvertError> {
    let mut doc =
        Document::load_mem(bytes).map_err(|e| ConvertError::ParseError(e.to_string()))?;

    if doc.trailer.has(b"Encrypt") {
        debug!("Source PDF is encrypted, trying empty user password");
        remove_security(&mut doc)?;
    }

    Ok(doc)
}

/// Serialize a document to a fresh buffer.
pub fn save_document(doc: &mut Document) -> Result<Vec<u8>, ConvertError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ConvertError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

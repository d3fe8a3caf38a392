//! Remove usage restrictions from a PDF
//!
//! Only owner-password restrictions can be lifted; documents that need a user
//! password to open are rejected with [`ConvertError::PasswordRequired`]. The
//! document information dictionary is carried over, decrypted.

use crate::document::{load_unrestricted, save_document};
use crate::error::ConvertError;

pub fn unlock_document(bytes: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let mut doc = load_unrestricted(bytes).map_err(|e| match e {
        ConvertError::ParseError(msg) => ConvertError::InvalidDocument(msg),
        other => other,
    })?;

    save_document(&mut doc)
}

//! In-memory ZIP archives
//!
//! Used for split output and as the container format of DOCX/XLSX packages.

use crate::error::ConvertError;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub struct ArchiveBuilder {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: FileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    pub fn add_file(&mut self, name: &str, contents: &[u8]) -> Result<(), ConvertError> {
        self.zip.start_file(name, self.options)?;
        self.zip.write_all(contents)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<u8>, ConvertError> {
        let cursor = self.zip.finish()?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Read one entry of an archive as UTF-8 text, `None` when the entry is absent.
pub fn read_entry_text(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, ConvertError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    Ok(Some(text))
}

/// Open a ZIP container held in memory.
pub fn open_archive(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, ConvertError> {
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ConvertError::InvalidDocument(format!("Not a ZIP package: {}", e)))
}

//! Transient storage for uploaded files
//!
//! Uploads are written under a uuid-based name inside the upload directory and
//! removed again when their [`TransientFile`] handle is dropped, whatever way
//! the request ends.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TransientStore {
    dir: PathBuf,
}

impl TransientStore {
    /// Use `dir` for uploads, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an upload to disk and hand back the owning handle.
    pub async fn persist(
        &self,
        original_name: impl Into<String>,
        content_type: Option<String>,
        bytes: &[u8],
    ) -> io::Result<TransientFile> {
        let path = self.dir.join(Uuid::new_v4().to_string());
        tokio::fs::write(&path, bytes).await?;

        let file = TransientFile {
            path,
            original_name: original_name.into(),
            content_type,
            len: bytes.len() as u64,
        };
        debug!(
            "Stored upload '{}' ({} bytes) at {}",
            file.original_name,
            file.len,
            file.path.display()
        );
        Ok(file)
    }
}

/// An uploaded file on disk, deleted when dropped
#[derive(Debug)]
pub struct TransientFile {
    path: PathBuf,
    original_name: String,
    content_type: Option<String>,
    len: u64,
}

impl TransientFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// MIME type reported by the client, if any
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Size of the stored upload in bytes
    pub fn size(&self) -> u64 {
        self.len
    }

    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(
                "Failed to remove transient file {} ({}): {}",
                self.path.display(),
                self.original_name,
                e
            );
        }
    }
}

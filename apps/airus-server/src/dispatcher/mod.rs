//! File-conversion dispatcher
//!
//! Validates a conversion request against the tool registry, runs the tool's
//! pipeline over the uploaded files and names the result. Uploaded files are
//! owned by the dispatcher for the duration of the call and are deleted when
//! it returns, on success and on failure.

pub mod pipelines;
pub mod registry;

use std::path::Path;

use airus_convert::ConvertError;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::store::TransientFile;
use pipelines::{Artifact, FontSource, InputDocument};
use registry::{Registry, ToolDescriptor};

/// Why a conversion did not produce a result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionErrorKind {
    #[error("No file uploaded.")]
    NoFileProvided,

    #[error("Tool is not implemented yet.")]
    NotImplemented,

    #[error("This tool needs at least {min} files (got {found}).")]
    InsufficientInputs { min: usize, found: usize },

    #[error("This tool accepts at most {max} file(s) (got {found}).")]
    TooManyFiles { max: usize, found: usize },

    #[error("'{file_name}' is not a supported input (expected {accept}).")]
    UnsupportedInput { file_name: String, accept: String },

    #[error("PDF must have at least 2 pages to split (found {0}).")]
    InsufficientPages(usize),

    #[error("{0}")]
    InvalidDocument(String),

    #[error("{0}")]
    ExtractionFailed(String),

    #[error("Could not load the required font: {0}")]
    AssetUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ConversionErrorKind {
    /// Input problems the caller can fix, as opposed to pipeline failures
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NoFileProvided
                | Self::InsufficientInputs { .. }
                | Self::TooManyFiles { .. }
                | Self::UnsupportedInput { .. }
                | Self::InsufficientPages(_)
        )
    }
}

impl From<ConvertError> for ConversionErrorKind {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::InsufficientPages(found) => Self::InsufficientPages(found),
            ConvertError::ExtractionFailed(_) => Self::ExtractionFailed(err.to_string()),
            ConvertError::InvalidFont(_) => Self::AssetUnavailable(err.to_string()),
            ConvertError::ParseError(_)
            | ConvertError::InvalidDocument(_)
            | ConvertError::Archive(_)
            | ConvertError::Xml { .. }
            | ConvertError::Csv(_)
            | ConvertError::PasswordRequired
            | ConvertError::UnsupportedEncryption(_)
            | ConvertError::UnsupportedText { .. } => Self::InvalidDocument(err.to_string()),
            ConvertError::OperationError(_) | ConvertError::Io(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{tool}: {kind}")]
pub struct ConversionError {
    pub tool: String,
    pub kind: ConversionErrorKind,
}

impl ConversionError {
    fn new(tool: &str, kind: ConversionErrorKind) -> Self {
        Self {
            tool: tool.to_string(),
            kind,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.kind.is_client_error()
    }

    /// Message shown to the user
    pub fn user_message(&self) -> String {
        match &self.kind {
            ConversionErrorKind::NotImplemented => {
                format!("Tool '{}' is not implemented yet.", self.tool)
            }
            kind if kind.is_client_error() => kind.to_string(),
            kind => format!("An error occurred during conversion: {}", kind),
        }
    }
}

/// The single output of a conversion
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: &'static str,
}

pub struct Dispatcher {
    registry: Registry,
}

impl Dispatcher {
    pub fn new(fonts: FontSource) -> Self {
        Self {
            registry: Registry::new(fonts),
        }
    }

    pub fn tools(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.registry.descriptors()
    }

    /// Run `tool` over `files`.
    ///
    /// Files are consumed; their transient copies are gone when this returns.
    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn convert(
        &self,
        tool: &str,
        files: Vec<TransientFile>,
    ) -> Result<ConversionResult, ConversionError> {
        let fail = |kind| ConversionError::new(tool, kind);

        if files.is_empty() {
            return Err(fail(ConversionErrorKind::NoFileProvided));
        }

        let registered = self
            .registry
            .get(tool)
            .ok_or_else(|| fail(ConversionErrorKind::NotImplemented))?;
        let descriptor = &registered.descriptor;

        validate_inputs(descriptor, &files).map_err(fail)?;

        let mut inputs = Vec::with_capacity(files.len());
        for file in &files {
            let bytes = file.read().await.map_err(|e| {
                fail(ConversionErrorKind::Internal(format!(
                    "Could not read upload '{}': {}",
                    file.original_name(),
                    e
                )))
            })?;
            inputs.push(InputDocument {
                name: file.original_name().to_string(),
                bytes,
            });
        }

        let Artifact { bytes, mime_type } = registered.pipeline.run(inputs).await.map_err(|kind| {
            if !kind.is_client_error() {
                warn!("Conversion {} failed: {}", tool, kind);
            }
            fail(kind)
        })?;

        let file_name = result_name(
            files[0].original_name(),
            descriptor.result_suffix,
            descriptor.result_extension,
        );
        let input_bytes: u64 = files.iter().map(TransientFile::size).sum();
        info!(
            "Converted {} file(s) ({} bytes) with {} into {} ({} bytes)",
            files.len(),
            input_bytes,
            tool,
            file_name,
            bytes.len()
        );

        Ok(ConversionResult {
            bytes,
            file_name,
            mime_type,
        })
    }
}

fn validate_inputs(
    descriptor: &ToolDescriptor,
    files: &[TransientFile],
) -> Result<(), ConversionErrorKind> {
    let found = files.len();
    if found < descriptor.min_files {
        return Err(ConversionErrorKind::InsufficientInputs {
            min: descriptor.min_files,
            found,
        });
    }
    if found > descriptor.max_files {
        return Err(ConversionErrorKind::TooManyFiles {
            max: descriptor.max_files,
            found,
        });
    }

    if let Some(file) = files
        .iter()
        .find(|f| !descriptor.accepts(f.original_name(), f.content_type()))
    {
        return Err(ConversionErrorKind::UnsupportedInput {
            file_name: file.original_name().to_string(),
            accept: descriptor.accept_list(),
        });
    }

    Ok(())
}

/// `{base}{suffix}.{extension}`, where `base` is the upload's file name without
/// its last extension.
pub fn result_name(original_name: &str, suffix: &str, extension: &str) -> String {
    let file_name = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let base = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("document");
    format!("{}{}.{}", base, suffix, extension)
}

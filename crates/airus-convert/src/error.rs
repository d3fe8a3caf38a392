use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("PDF must have at least 2 pages to split (found {0})")]
    InsufficientPages(usize),

    #[error("Could not extract text: {0}")]
    ExtractionFailed(String),

    #[error("Unusable font: {0}")]
    InvalidFont(String),

    #[error("Font {font} cannot draw these characters: {chars}")]
    UnsupportedText { font: String, chars: String },

    #[error("Document is protected by a user password")]
    PasswordRequired,

    #[error("Unsupported PDF encryption: {0}")]
    UnsupportedEncryption(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Malformed XML in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

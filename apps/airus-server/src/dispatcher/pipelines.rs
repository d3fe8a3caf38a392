//! One pipeline per conversion tool
//!
//! Codec work is CPU-bound and runs on the blocking pool; a panic inside a
//! codec surfaces as an `Internal` error instead of taking the request down.

use airus_convert::{
    extract_lines, merge_documents, parse_plain_csv, read_first_sheet, read_paragraphs,
    render_paragraphs, split_to_archive, unlock_document, write_csv, write_docx, write_xlsx,
    ConvertError, PageSetup, PdfFont, DOCX_MIME, XLSX_MIME,
};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use super::ConversionErrorKind;

const PDF_MIME: &str = "application/pdf";
const CSV_MIME: &str = "text/csv";
const ZIP_MIME: &str = "application/zip";
const JSON_MIME: &str = "application/json";

const SHEET_NAME: &str = "Sheet1";

/// An uploaded file, read into memory
#[derive(Debug, Clone)]
pub struct InputDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Bytes and MIME type produced by one pipeline run
#[derive(Debug)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Inputs have already been checked against the tool's count and type rules.
    async fn run(&self, inputs: Vec<InputDocument>) -> Result<Artifact, ConversionErrorKind>;
}

async fn run_blocking<F>(mime_type: &'static str, job: F) -> Result<Artifact, ConversionErrorKind>
where
    F: FnOnce() -> Result<Vec<u8>, ConvertError> + Send + 'static,
{
    let bytes = tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ConversionErrorKind::Internal(format!("Conversion task failed: {}", e)))??;
    Ok(Artifact { bytes, mime_type })
}

fn first(inputs: Vec<InputDocument>) -> Result<InputDocument, ConversionErrorKind> {
    inputs
        .into_iter()
        .next()
        .ok_or(ConversionErrorKind::NoFileProvided)
}

pub struct PdfToDocx;

#[async_trait]
impl Pipeline for PdfToDocx {
    async fn run(&self, inputs: Vec<InputDocument>) -> Result<Artifact, ConversionErrorKind> {
        let input = first(inputs)?;
        run_blocking(DOCX_MIME, move || {
            let lines = extract_lines(&input.bytes)?;
            debug!("Extracted {} lines from {}", lines.len(), input.name);
            write_docx(&lines)
        })
        .await
    }
}

/// Where the Word to PDF pipeline gets its font
#[derive(Debug, Clone)]
pub enum FontSource {
    /// Standard Helvetica, no download
    Builtin,
    /// A TrueType file fetched for every conversion
    Remote { url: String, client: reqwest::Client },
}

impl FontSource {
    pub fn remote(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self::Remote {
            url: url.into(),
            client,
        }
    }

    pub async fn load(&self) -> Result<PdfFont, ConversionErrorKind> {
        let (url, client) = match self {
            Self::Builtin => return Ok(PdfFont::helvetica()),
            Self::Remote { url, client } => (url, client),
        };

        let unavailable = |e: reqwest::Error| {
            ConversionErrorKind::AssetUnavailable(format!("download from {} failed: {}", url, e))
        };
        let response = client
            .get(url.as_str())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?;
        let data = response.bytes().await.map_err(unavailable)?;
        debug!("Fetched font {} ({} bytes)", url, data.len());

        let name = font_name_from_url(url);
        PdfFont::from_truetype(data.to_vec(), &name).map_err(ConversionErrorKind::from)
    }
}

fn font_name_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .and_then(|file| file.split('.').next())
        .unwrap_or_default()
        .to_string()
}

pub struct DocxToPdf {
    fonts: FontSource,
}

impl DocxToPdf {
    pub fn new(fonts: FontSource) -> Self {
        Self { fonts }
    }
}

#[async_trait]
impl Pipeline for DocxToPdf {
    async fn run(&self, inputs: Vec<InputDocument>) -> Result<Artifact, ConversionErrorKind> {
        let input = first(inputs)?;
        let font = self.fonts.load().await?;
        info!("Rendering {} with font {}", input.name, font.base_font());

        run_blocking(PDF_MIME, move || {
            let paragraphs = read_paragraphs(&input.bytes)?;
            render_paragraphs(&paragraphs, &font, &PageSetup::default())
        })
        .await
    }
}

pub struct XlsxToCsv;

#[async_trait]
impl Pipeline for XlsxToCsv {
    async fn run(&self, inputs: Vec<InputDocument>) -> Result<Artifact, ConversionErrorKind> {
        let input = first(inputs)?;
        run_blocking(CSV_MIME, move || {
            let rows = read_first_sheet(&input.bytes)?;
            write_csv(&rows)
        })
        .await
    }
}

pub struct CsvToXlsx;

#[async_trait]
impl Pipeline for CsvToXlsx {
    async fn run(&self, inputs: Vec<InputDocument>) -> Result<Artifact, ConversionErrorKind> {
        let input = first(inputs)?;
        run_blocking(XLSX_MIME, move || {
            let text = String::from_utf8_lossy(&input.bytes);
            let rows = parse_plain_csv(&text)?;
            write_xlsx(SHEET_NAME, &rows)
        })
        .await
    }
}

pub struct PdfMerge;

#[async_trait]
impl Pipeline for PdfMerge {
    async fn run(&self, inputs: Vec<InputDocument>) -> Result<Artifact, ConversionErrorKind> {
        if inputs.len() < 2 {
            return Err(ConversionErrorKind::InsufficientInputs {
                min: 2,
                found: inputs.len(),
            });
        }

        run_blocking(PDF_MIME, move || {
            let documents: Vec<Vec<u8>> = inputs.into_iter().map(|input| input.bytes).collect();
            merge_documents(&documents)
        })
        .await
    }
}

pub struct PdfSplit;

#[async_trait]
impl Pipeline for PdfSplit {
    async fn run(&self, inputs: Vec<InputDocument>) -> Result<Artifact, ConversionErrorKind> {
        let input = first(inputs)?;
        run_blocking(ZIP_MIME, move || split_to_archive(&input.bytes)).await
    }
}

pub struct PdfUnlock;

#[async_trait]
impl Pipeline for PdfUnlock {
    async fn run(&self, inputs: Vec<InputDocument>) -> Result<Artifact, ConversionErrorKind> {
        let input = first(inputs)?;
        run_blocking(PDF_MIME, move || unlock_document(&input.bytes)).await
    }
}

#[derive(Serialize)]
struct TextDocument<'a> {
    name: &'a str,
    content: &'a str,
}

pub struct TxtToJson;

#[async_trait]
impl Pipeline for TxtToJson {
    async fn run(&self, inputs: Vec<InputDocument>) -> Result<Artifact, ConversionErrorKind> {
        let input = first(inputs)?;
        let content = String::from_utf8_lossy(&input.bytes);
        let bytes = serde_json::to_vec_pretty(&TextDocument {
            name: &input.name,
            content: &content,
        })
        .map_err(|e| ConversionErrorKind::Internal(e.to_string()))?;

        Ok(Artifact {
            bytes,
            mime_type: JSON_MIME,
        })
    }
}

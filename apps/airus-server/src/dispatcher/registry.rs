//! The fixed set of conversion tools

use std::path::Path;

use airus_convert::{DOCX_MIME, XLSX_MIME};
use serde::Serialize;

use super::pipelines::{
    CsvToXlsx, DocxToPdf, FontSource, Pipeline, PdfMerge, PdfSplit, PdfToDocx, PdfUnlock,
    TxtToJson, XlsxToCsv,
};

/// Static description of one conversion tool
#[derive(Debug, Clone, Copy)]
pub struct ToolDescriptor {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    /// Accepted file extensions, lowercase, with the leading dot
    pub extensions: &'static [&'static str],
    pub mime_types: &'static [&'static str],
    pub min_files: usize,
    pub max_files: usize,
    /// Appended to the first input's base name, e.g. `_merged`
    pub result_suffix: &'static str,
    pub result_extension: &'static str,
}

impl ToolDescriptor {
    /// Whether an upload matches by extension or by MIME type.
    pub fn accepts(&self, file_name: &str, content_type: Option<&str>) -> bool {
        let by_extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .is_some_and(|ext| self.extensions.contains(&ext.as_str()));

        let by_mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .is_some_and(|ct| self.mime_types.contains(&ct.as_str()));

        by_extension || by_mime
    }

    /// The accept list as offered to file pickers, e.g. `.pdf,application/pdf`
    pub fn accept_list(&self) -> String {
        self.extensions
            .iter()
            .chain(self.mime_types.iter())
            .copied()
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Tool listing as served by `GET /api/tools`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub accept: String,
    pub min_files: usize,
    pub max_files: usize,
}

impl From<&ToolDescriptor> for ToolInfo {
    fn from(tool: &ToolDescriptor) -> Self {
        Self {
            id: tool.id,
            label: tool.label,
            description: tool.description,
            accept: tool.accept_list(),
            min_files: tool.min_files,
            max_files: tool.max_files,
        }
    }
}

const PDF: &[&str] = &[".pdf"];
const PDF_MIME: &[&str] = &["application/pdf"];

pub const TOOLS: [ToolDescriptor; 8] = [
    ToolDescriptor {
        id: "pdf-to-docx",
        label: "PDF to Word",
        description: "Convert PDF to editable DOCX.",
        extensions: PDF,
        mime_types: PDF_MIME,
        min_files: 1,
        max_files: 1,
        result_suffix: "_converted",
        result_extension: "docx",
    },
    ToolDescriptor {
        id: "docx-to-pdf",
        label: "Word to PDF",
        description: "Convert DOCX to PDF.",
        extensions: &[".docx"],
        mime_types: &[DOCX_MIME],
        min_files: 1,
        max_files: 1,
        result_suffix: "_converted",
        result_extension: "pdf",
    },
    ToolDescriptor {
        id: "xlsx-to-csv",
        label: "Excel to CSV",
        description: "Convert XLSX to CSV.",
        extensions: &[".xlsx"],
        mime_types: &[XLSX_MIME],
        min_files: 1,
        max_files: 1,
        result_suffix: "_converted",
        result_extension: "csv",
    },
    ToolDescriptor {
        id: "csv-to-xlsx",
        label: "CSV to Excel",
        description: "Convert CSV to XLSX.",
        extensions: &[".csv"],
        mime_types: &["text/csv"],
        min_files: 1,
        max_files: 1,
        result_suffix: "_converted",
        result_extension: "xlsx",
    },
    ToolDescriptor {
        id: "pdf-merge",
        label: "Merge PDF",
        description: "Combine multiple PDFs.",
        extensions: PDF,
        mime_types: PDF_MIME,
        min_files: 2,
        max_files: 10,
        result_suffix: "_merged",
        result_extension: "pdf",
    },
    ToolDescriptor {
        id: "pdf-split",
        label: "Split PDF",
        description: "Split a PDF into pages.",
        extensions: PDF,
        mime_types: PDF_MIME,
        min_files: 1,
        max_files: 1,
        result_suffix: "_split",
        result_extension: "zip",
    },
    ToolDescriptor {
        id: "pdf-unlock",
        label: "Unlock PDF",
        description: "Remove PDF restrictions.",
        extensions: PDF,
        mime_types: PDF_MIME,
        min_files: 1,
        max_files: 1,
        result_suffix: "_unlocked",
        result_extension: "pdf",
    },
    ToolDescriptor {
        id: "txt-to-json",
        label: "Text to JSON",
        description: "Convert TXT to JSON.",
        extensions: &[".txt"],
        mime_types: &["text/plain"],
        min_files: 1,
        max_files: 1,
        result_suffix: "_converted",
        result_extension: "json",
    },
];

/// Largest `max_files` of any tool; the upload handler stops accepting files beyond it
pub const MAX_FILES_PER_REQUEST: usize = 10;

pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub pipeline: Box<dyn Pipeline>,
}

/// Tool id to pipeline mapping, built once at startup
pub struct Registry {
    tools: Vec<RegisteredTool>,
}

impl Registry {
    pub fn new(fonts: FontSource) -> Self {
        // Same order as TOOLS
        let pipelines: [Box<dyn Pipeline>; 8] = [
            Box::new(PdfToDocx),
            Box::new(DocxToPdf::new(fonts)),
            Box::new(XlsxToCsv),
            Box::new(CsvToXlsx),
            Box::new(PdfMerge),
            Box::new(PdfSplit),
            Box::new(PdfUnlock),
            Box::new(TxtToJson),
        ];

        let tools = TOOLS
            .into_iter()
            .zip(pipelines)
            .map(|(descriptor, pipeline)| RegisteredTool {
                descriptor,
                pipeline,
            })
            .collect();
        Self { tools }
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|tool| tool.descriptor.id == id)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter().map(|tool| &tool.descriptor)
    }
}

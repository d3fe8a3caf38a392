//! Minimal SpreadsheetML (XLSX) reader and writer
//!
//! Cells are handled as text. The writer emits inline strings only; the reader
//! understands shared strings, inline strings, booleans and raw values.

use crate::archive::{open_archive, read_entry_text, ArchiveBuilder};
use crate::error::ConvertError;
use crate::ooxml::{
    escape_xml, parse_part, root_relationships, DOCUMENT_RELS_NS, OFFICE_DOCUMENT_REL,
    RELATIONSHIPS_NS, XML_DECLARATION,
};
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::debug;
use zip::ZipArchive;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const SHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const WORKSHEET_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// Sheet dimensions of the format itself
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

/// Padding allowed per non-empty cell before rows are left ragged
const PADDING_PER_CELL: usize = 64;
const MIN_CELL_BUDGET: usize = 1 << 16;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

/// Build a workbook with a single sheet holding `rows`.
pub fn write_xlsx(sheet_name: &str, rows: &[Vec<String>]) -> Result<Vec<u8>, ConvertError> {
    let workbook = format!(
        r#"{}<workbook xmlns="{}" xmlns:r="{}"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        XML_DECLARATION,
        SHEET_NS,
        DOCUMENT_RELS_NS,
        escape_xml(sheet_name)
    );
    let workbook_rels = format!(
        r#"{}<Relationships xmlns="{}"><Relationship Id="rId1" Type="{}" Target="worksheets/sheet1.xml"/></Relationships>"#,
        XML_DECLARATION, RELATIONSHIPS_NS, WORKSHEET_REL
    );

    let mut sheet_data = String::new();
    for (row_idx, row) in rows.iter().enumerate() {
        let row_number = row_idx + 1;
        sheet_data.push_str(&format!(r#"<row r="{}">"#, row_number));
        for (col_idx, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            sheet_data.push_str(&format!(
                r#"<c r="{}{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                column_name(col_idx),
                row_number,
                escape_xml(value)
            ));
        }
        sheet_data.push_str("</row>");
    }
    let sheet = format!(
        r#"{}<worksheet xmlns="{}"><sheetData>{}</sheetData></worksheet>"#,
        XML_DECLARATION, SHEET_NS, sheet_data
    );

    let mut archive = ArchiveBuilder::new();
    archive.add_file("[Content_Types].xml", CONTENT_TYPES.as_bytes())?;
    archive.add_file("_rels/.rels", root_relationships(DEFAULT_WORKBOOK_PART).as_bytes())?;
    archive.add_file(DEFAULT_WORKBOOK_PART, workbook.as_bytes())?;
    archive.add_file("xl/_rels/workbook.xml.rels", workbook_rels.as_bytes())?;
    archive.add_file("xl/worksheets/sheet1.xml", sheet.as_bytes())?;
    archive.finish()
}

/// Read the first sheet (in workbook order) as a rectangular grid of strings.
///
/// A workbook without sheets, or a sheet without cells, yields no rows. Very
/// sparse sheets come back with ragged rows instead of a padded rectangle.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Vec<Vec<String>>, ConvertError> {
    let mut archive = open_archive(bytes)?;

    let workbook_part = match read_entry_text(&mut archive, "_rels/.rels")? {
        Some(rels) => find_target(&rels, "_rels/.rels", |n| {
            n.attribute("Type") == Some(OFFICE_DOCUMENT_REL)
        })?
        .map(|target| target.trim_start_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string()),
        None => DEFAULT_WORKBOOK_PART.to_string(),
    };

    let workbook_xml = read_entry_text(&mut archive, &workbook_part)?.ok_or_else(|| {
        ConvertError::InvalidDocument(format!("Package has no workbook ({})", workbook_part))
    })?;
    let workbook = parse_part(&workbook_part, &workbook_xml)?;

    let first_sheet_rel = workbook
        .descendants()
        .find(|n| n.has_tag_name((SHEET_NS, "sheet")))
        .and_then(|n| n.attribute((DOCUMENT_RELS_NS, "id")).map(str::to_string));
    let Some(sheet_rel) = first_sheet_rel else {
        debug!("Workbook has no sheets");
        return Ok(Vec::new());
    };

    let (base_dir, rels_part) = rels_part_for(&workbook_part);
    let rels_xml = read_entry_text(&mut archive, &rels_part)?.ok_or_else(|| {
        ConvertError::InvalidDocument(format!("Workbook relationships missing ({})", rels_part))
    })?;

    let sheet_target = find_target(&rels_xml, &rels_part, |n| n.attribute("Id") == Some(sheet_rel.as_str()))?
        .ok_or_else(|| ConvertError::InvalidDocument(format!("No target for sheet {}", sheet_rel)))?;
    let shared_target = find_target(&rels_xml, &rels_part, |n| {
        n.attribute("Type").is_some_and(|t| t.ends_with("/sharedStrings"))
    })?;

    let shared_strings = match shared_target {
        Some(target) => read_shared_strings(&mut archive, &resolve(&base_dir, &target))?,
        None => Vec::new(),
    };

    let sheet_part = resolve(&base_dir, &sheet_target);
    let sheet_xml = read_entry_text(&mut archive, &sheet_part)?
        .ok_or_else(|| ConvertError::InvalidDocument(format!("Sheet part missing ({})", sheet_part)))?;

    read_sheet_grid(&sheet_part, &sheet_xml, &shared_strings)
}

fn read_sheet_grid(
    part: &str,
    xml: &str,
    shared_strings: &[String],
) -> Result<Vec<Vec<String>>, ConvertError> {
    let sheet = parse_part(part, xml)?;
    let mut cells: BTreeMap<(usize, usize), String> = BTreeMap::new();

    let mut next_row = 0;
    for row in sheet.descendants().filter(|n| n.has_tag_name((SHEET_NS, "row"))) {
        let row_idx = row
            .attribute("r")
            .and_then(|r| r.parse::<usize>().ok())
            .and_then(|r| r.checked_sub(1))
            .unwrap_or(next_row);
        next_row = row_idx + 1;

        let mut next_col = 0;
        for cell in row.children().filter(|n| n.has_tag_name((SHEET_NS, "c"))) {
            let col_idx = cell
                .attribute("r")
                .and_then(parse_column)
                .unwrap_or(next_col);
            next_col = col_idx + 1;

            let value = cell_value(cell, shared_strings);
            if !value.is_empty() {
                cells.insert((row_idx, col_idx), value);
            }
        }
    }

    if let Some(&(r, c)) = cells.keys().find(|(r, c)| *r >= MAX_ROWS || *c >= MAX_COLUMNS) {
        return Err(ConvertError::InvalidDocument(format!(
            "Cell {}{} is outside the sheet",
            column_name(c.min(MAX_COLUMNS - 1)),
            r.saturating_add(1)
        )));
    }

    let Some(height) = cells.keys().map(|(r, _)| r + 1).max() else {
        return Ok(Vec::new());
    };
    let width = cells.keys().map(|(_, c)| c + 1).max().unwrap_or(0);

    // Pad to a rectangle only when that costs a bounded multiple of the real
    // cell count; otherwise each row stops at its own last cell.
    let budget = cells
        .len()
        .saturating_mul(PADDING_PER_CELL)
        .max(MIN_CELL_BUDGET);
    let mut row_widths = vec![0usize; height];
    for &(r, c) in cells.keys() {
        row_widths[r] = row_widths[r].max(c + 1);
    }
    if height.saturating_mul(width) <= budget {
        row_widths.iter_mut().for_each(|w| *w = width);
    } else {
        let ragged: usize = row_widths.iter().sum();
        if ragged > budget {
            return Err(ConvertError::InvalidDocument(format!(
                "Sheet is too sparse to convert ({} cells spread over {} rows x {} columns)",
                cells.len(),
                height,
                width
            )));
        }
        debug!(height, width, "Sparse sheet, leaving rows ragged");
    }

    let mut grid: Vec<Vec<String>> = row_widths
        .into_iter()
        .map(|w| vec![String::new(); w])
        .collect();
    for ((r, c), value) in cells {
        grid[r][c] = value;
    }
    Ok(grid)
}

fn cell_value(cell: roxmltree::Node, shared_strings: &[String]) -> String {
    let raw = || {
        cell.children()
            .find(|n| n.has_tag_name((SHEET_NS, "v")))
            .and_then(|v| v.text())
            .unwrap_or_default()
            .to_string()
    };

    match cell.attribute("t") {
        Some("s") => raw()
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared_strings.get(i).cloned())
            .unwrap_or_default(),
        Some("inlineStr") => cell
            .children()
            .find(|n| n.has_tag_name((SHEET_NS, "is")))
            .map(rich_text)
            .unwrap_or_default(),
        Some("b") => match raw().trim() {
            "1" => "TRUE".to_string(),
            _ => "FALSE".to_string(),
        },
        _ => raw(),
    }
}

/// Concatenate the `<t>` runs of a string item, skipping phonetic hints.
fn rich_text(item: roxmltree::Node) -> String {
    item.descendants()
        .filter(|n| n.has_tag_name((SHEET_NS, "t")))
        .filter(|n| !n.ancestors().any(|a| a.has_tag_name((SHEET_NS, "rPh"))))
        .filter_map(|n| n.text())
        .collect()
}

fn read_shared_strings(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    part: &str,
) -> Result<Vec<String>, ConvertError> {
    let Some(xml) = read_entry_text(archive, part)? else {
        return Ok(Vec::new());
    };
    let doc = parse_part(part, &xml)?;
    Ok(doc
        .root_element()
        .children()
        .filter(|n| n.has_tag_name((SHEET_NS, "si")))
        .map(rich_text)
        .collect())
}

fn find_target<P>(rels_xml: &str, part: &str, predicate: P) -> Result<Option<String>, ConvertError>
where
    P: Fn(&roxmltree::Node) -> bool,
{
    let doc = parse_part(part, rels_xml)?;
    Ok(doc
        .descendants()
        .filter(|n| n.tag_name().name() == "Relationship")
        .find(|n| predicate(n))
        .and_then(|n| n.attribute("Target"))
        .map(str::to_string))
}

/// Directory of a part and the path of its relationships part.
fn rels_part_for(part: &str) -> (String, String) {
    match part.rsplit_once('/') {
        Some((dir, file)) => (dir.to_string(), format!("{}/_rels/{}.rels", dir, file)),
        None => (String::new(), format!("_rels/{}.rels", part)),
    }
}

/// Resolve a relationship target against the directory of its source part.
fn resolve(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Zero-based column index of a cell reference such as `"AB12"`.
fn parse_column(cell_ref: &str) -> Option<usize> {
    let letters: String = cell_ref
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let number = letters.chars().fold(0usize, |acc, c| {
        acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1)
    });
    Some(number - 1)
}

/// Column letters for a zero-based index (0 -> "A", 26 -> "AA").
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

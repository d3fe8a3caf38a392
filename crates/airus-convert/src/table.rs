//! CSV reading and writing for the spreadsheet tools

use crate::error::ConvertError;
use csv::{ReaderBuilder, Terminator, WriterBuilder};

/// Split text into rows on line breaks and cells on commas.
///
/// Quotes carry no meaning: a quoted field containing a comma is split like
/// any other. Rows may have different lengths and blank lines are skipped.
pub fn parse_plain_csv(text: &str) -> Result<Vec<Vec<String>>, ConvertError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Serialize rows as CSV with standard quoting, one `\n`-terminated line per row.
pub fn write_csv(rows: &[Vec<String>]) -> Result<Vec<u8>, ConvertError> {
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ConvertError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xlsx::{read_first_sheet, write_xlsx};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_parse_splits_lines_and_commas() {
        let rows = parse_plain_csv("name,score\r\nAda,97\nLinus,88\n").unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["name".to_string(), "score".to_string()],
                vec!["Ada".to_string(), "97".to_string()],
                vec!["Linus".to_string(), "88".to_string()],
            ]
        );
    }

    #[test]
    fn test_parse_ignores_quotes() {
        let rows = parse_plain_csv("\"Smith, J\",42\n").unwrap();
        assert_eq!(rows, vec![vec!["\"Smith".to_string(), " J\"".to_string(), "42".to_string()]]);
    }

    #[test]
    fn test_parse_tolerates_ragged_rows_and_blank_lines() {
        let rows = parse_plain_csv("a,b,c\n\nd\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[1], vec!["d".to_string()]);
    }

    #[test]
    fn test_write_quotes_when_needed() {
        let rows = vec![vec!["plain".to_string(), "with, comma".to_string(), "say \"hi\"".to_string()]];
        let out = String::from_utf8(write_csv(&rows).unwrap()).unwrap();
        assert_eq!(out, "plain,\"with, comma\",\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn test_write_empty_is_empty() {
        assert!(write_csv(&[]).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_csv_xlsx_csv_preserves_grid(
            width in 1usize..6,
            cells in prop::collection::vec("[A-Za-z0-9][A-Za-z0-9._-]{0,11}", 1..40),
        ) {
            let rows: Vec<Vec<String>> = cells
                .chunks(width)
                .filter(|chunk| chunk.len() == width)
                .map(|chunk| chunk.to_vec())
                .collect();
            prop_assume!(!rows.is_empty());

            let mut text = rows.iter().map(|r| r.join(",")).collect::<Vec<_>>().join("\n");
            text.push('\n');

            let parsed = parse_plain_csv(&text).unwrap();
            prop_assert_eq!(&parsed, &rows);

            let xlsx = write_xlsx("Sheet1", &parsed).unwrap();
            let back = read_first_sheet(&xlsx).unwrap();
            let csv = String::from_utf8(write_csv(&back).unwrap()).unwrap();
            prop_assert_eq!(csv, text);
        }
    }
}

//! Format-specific file readers feeding table imports.
//!
//! Every reader produces the same shape -- a header row and text-valued
//! records -- so the store's bulk-load path is format-agnostic. Cells
//! are imported as TEXT (missing cells as NULL); the engine's dynamic
//! typing and the text-equality semantics of union/join make that
//! sufficient, matching the schema-less row sets of the source files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use fusion_core::format::FileFormat;

use crate::error::StoreError;

/// Parsed file contents ready for bulk load.
#[derive(Debug)]
pub struct ImportedData {
    /// Column names, from the file's header row.
    pub columns: Vec<String>,
    /// Records, padded or truncated to the header width.
    pub rows: Vec<Vec<Option<String>>>,
}

/// Reads a file into [`ImportedData`] according to its detected format.
pub fn read_file(path: &Path, format: FileFormat) -> Result<ImportedData, StoreError> {
    match format {
        FileFormat::Csv => read_csv(path),
        FileFormat::Xls | FileFormat::Xlsx => read_spreadsheet(path),
        FileFormat::Unknown => read_raw(path),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Substitutes a positional name for blank headers.
fn header_name(raw: &str, index: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        format!("column_{}", index + 1)
    } else {
        trimmed.to_string()
    }
}

fn read_csv(path: &Path) -> Result<ImportedData, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| header_name(h, i))
        .collect();
    if columns.is_empty() {
        return Err(StoreError::EmptyImport {
            file: file_name(path),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row: Vec<Option<String>> = record
            .iter()
            .take(columns.len())
            .map(|cell| Some(cell.to_string()))
            .collect();
        row.resize(columns.len(), None);
        rows.push(row);
    }

    Ok(ImportedData { columns, rows })
}

fn read_spreadsheet(path: &Path) -> Result<ImportedData, StoreError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| StoreError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| StoreError::Spreadsheet(format!("{}: workbook has no sheets", file_name(path))))?
        .map_err(|e| StoreError::Spreadsheet(e.to_string()))?;

    let mut row_iter = range.rows();
    let header = row_iter.next().ok_or_else(|| StoreError::EmptyImport {
        file: file_name(path),
    })?;

    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| header_name(&cell_to_string(cell).unwrap_or_default(), i))
        .collect();
    if columns.is_empty() {
        return Err(StoreError::EmptyImport {
            file: file_name(path),
        });
    }

    let mut rows = Vec::new();
    for record in row_iter {
        let mut row: Vec<Option<String>> = record
            .iter()
            .take(columns.len())
            .map(cell_to_string)
            .collect();
        row.resize(columns.len(), None);
        rows.push(row);
    }

    Ok(ImportedData { columns, rows })
}

/// Opaque fallback: one TEXT column, one row per line.
fn read_raw(path: &Path) -> Result<ImportedData, StoreError> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for line in reader.lines() {
        rows.push(vec![Some(line?)]);
    }
    Ok(ImportedData {
        columns: vec!["value".to_string()],
        rows,
    })
}

fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(format_float(*f)),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(dt.as_f64().to_string()),
        Data::DateTimeIso(s) => Some(s.clone()),
        Data::DurationIso(s) => Some(s.clone()),
        Data::Error(e) => Some(e.to_string()),
    }
}

/// Excel stores integers as floats; print whole values without the
/// trailing `.0` so joins against CSV-sourced text keys line up.
fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_headers_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, "region,amount\neast,10\nwest,20\n").unwrap();

        let data = read_file(&path, FileFormat::Csv).unwrap();
        assert_eq!(data.columns, vec!["region", "amount"]);
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.rows[0], vec![Some("east".into()), Some("10".into())]);
    }

    #[test]
    fn short_csv_records_pad_with_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        std::fs::write(&path, "a,b,c\n1,2\n").unwrap();

        let data = read_file(&path, FileFormat::Csv).unwrap();
        assert_eq!(
            data.rows[0],
            vec![Some("1".into()), Some("2".into()), None]
        );
    }

    #[test]
    fn blank_headers_get_positional_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.csv");
        std::fs::write(&path, "a,,c\n1,2,3\n").unwrap();

        let data = read_file(&path, FileFormat::Csv).unwrap();
        assert_eq!(data.columns, vec!["a", "column_2", "c"]);
    }

    #[test]
    fn raw_fallback_is_one_column_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "first line").unwrap();
        writeln!(f, "second line").unwrap();

        let data = read_file(&path, FileFormat::Unknown).unwrap();
        assert_eq!(data.columns, vec!["value"]);
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.rows[1], vec![Some("second line".into())]);
    }

    #[test]
    fn whole_floats_print_without_fraction() {
        assert_eq!(format_float(3.0), "3");
        assert_eq!(format_float(3.5), "3.5");
        assert_eq!(format_float(-2.0), "-2");
    }
}

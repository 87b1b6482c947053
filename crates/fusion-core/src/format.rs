//! File formats accepted for ingestion and export.
//!
//! A format is detected from a MIME type (when the caller provides one)
//! or from the file extension. Anything unrecognized falls back to
//! [`FileFormat::Unknown`], which imports through an opaque single-column
//! path rather than being rejected.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// MIME type for CSV files.
pub const MIME_CSV: &str = "text/csv";
/// MIME type for legacy spreadsheet files.
pub const MIME_XLS: &str = "application/vnd.ms-excel";
/// MIME type for modern spreadsheet files.
pub const MIME_XLSX: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A spreadsheet-like file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    /// Comma-separated values.
    Csv,
    /// Legacy binary spreadsheet.
    Xls,
    /// OOXML spreadsheet.
    Xlsx,
    /// Unrecognized type; imported opaquely, exported as CSV.
    Unknown,
}

impl FileFormat {
    /// Maps a MIME type to a format. Unrecognized types map to `Unknown`.
    pub fn from_mime(mime: &str) -> Self {
        match mime {
            MIME_CSV => FileFormat::Csv,
            MIME_XLS => FileFormat::Xls,
            MIME_XLSX => FileFormat::Xlsx,
            _ => FileFormat::Unknown,
        }
    }

    /// Guesses a format from a file path's extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => FileFormat::Csv,
            Some("xls") => FileFormat::Xls,
            Some("xlsx") => FileFormat::Xlsx,
            _ => FileFormat::Unknown,
        }
    }

    /// The MIME type this format is served as.
    pub fn mime(&self) -> &'static str {
        match self {
            FileFormat::Csv => MIME_CSV,
            FileFormat::Xls => MIME_XLS,
            FileFormat::Xlsx => MIME_XLSX,
            FileFormat::Unknown => "application/octet-stream",
        }
    }

    /// The file extension used when naming an exported file.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Xls => "xls",
            FileFormat::Xlsx => "xlsx",
            FileFormat::Unknown => "txt",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_roundtrip_for_known_formats() {
        for fmt in [FileFormat::Csv, FileFormat::Xls, FileFormat::Xlsx] {
            assert_eq!(FileFormat::from_mime(fmt.mime()), fmt);
        }
    }

    #[test]
    fn unrecognized_mime_falls_back_to_unknown() {
        assert_eq!(FileFormat::from_mime("application/pdf"), FileFormat::Unknown);
        assert_eq!(FileFormat::from_mime(""), FileFormat::Unknown);
    }

    #[test]
    fn extension_detection_is_case_insensitive() {
        assert_eq!(FileFormat::from_path(Path::new("a.CSV")), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("b.Xlsx")), FileFormat::Xlsx);
        assert_eq!(FileFormat::from_path(Path::new("c.xls")), FileFormat::Xls);
        assert_eq!(FileFormat::from_path(Path::new("d.parquet")), FileFormat::Unknown);
        assert_eq!(FileFormat::from_path(Path::new("noext")), FileFormat::Unknown);
    }
}

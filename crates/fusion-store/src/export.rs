//! Table exporters: query output to downloadable byte buffers.

use rust_xlsxwriter::Workbook;
use serde_json::Value;

use crate::error::StoreError;
use crate::store::QueryOutput;

/// Serializes query output as CSV with a header row.
pub fn to_csv(label: &str, output: &QueryOutput) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&output.columns)?;
    for row in &output.rows {
        writer.write_record(row.iter().map(cell_text))?;
    }
    writer
        .into_inner()
        .map_err(|e| StoreError::ExportFailed {
            label: label.to_string(),
            reason: e.to_string(),
        })
}

/// Serializes query output as an XLSX workbook with a header row.
pub fn to_xlsx(label: &str, output: &QueryOutput) -> Result<Vec<u8>, StoreError> {
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| StoreError::ExportFailed {
        label: label.to_string(),
        reason: e.to_string(),
    };

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, name) in output.columns.iter().enumerate() {
        sheet.write_string(0, col as u16, name).map_err(xlsx_err)?;
    }
    for (r, row) in output.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let (row_idx, col_idx) = ((r + 1) as u32, c as u16);
            match cell {
                Value::Number(n) if n.as_f64().is_some() => {
                    sheet
                        .write_number(row_idx, col_idx, n.as_f64().unwrap())
                        .map_err(xlsx_err)?;
                }
                Value::Null => {}
                other => {
                    sheet
                        .write_string(row_idx, col_idx, cell_text(other))
                        .map_err(xlsx_err)?;
                }
            }
        }
    }

    workbook.save_to_buffer().map_err(xlsx_err)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryOutput {
        QueryOutput {
            columns: vec!["region".into(), "amount".into()],
            rows: vec![
                vec![Value::String("east".into()), Value::from(10)],
                vec![Value::String("west".into()), Value::Null],
            ],
        }
    }

    #[test]
    fn csv_has_header_then_rows() {
        let bytes = to_csv("sales_1", &sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["region,amount", "east,10", "west,"]);
    }

    #[test]
    fn xlsx_is_a_zip_container() {
        let bytes = to_xlsx("sales_1", &sample()).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}

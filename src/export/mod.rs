// src/export/mod.rs

use crate::error::{ReportError, Result};
use crate::normalize::{cell_text, Table};
use rust_xlsxwriter::{Workbook, XlsxError};
use serde_json::Value;
use std::{fs, path::Path};
use tracing::{debug, info};

pub const SHEET_NAME: &str = "RelatorioFornecedor";
pub const EXPORT_FILE_NAME: &str = "relatorio_fornecedor.xlsx";
pub const EXPORT_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Serialize `table` into a single-sheet workbook: header row, then data, no index column.
pub fn to_xlsx(table: &Table) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in table.columns().iter().enumerate() {
        sheet.write_string(0, col_index(col)?, name.as_str())?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let xl_row = u32::try_from(r + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (c, value) in row.iter().enumerate() {
            let xl_col = col_index(c)?;
            match value {
                Value::Null => {}
                Value::Bool(b) => {
                    sheet.write_boolean(xl_row, xl_col, *b)?;
                }
                Value::Number(n) => match n.as_f64() {
                    Some(f) => {
                        sheet.write_number(xl_row, xl_col, f)?;
                    }
                    None => {
                        sheet.write_string(xl_row, xl_col, n.to_string())?;
                    }
                },
                Value::String(s) => {
                    sheet.write_string(xl_row, xl_col, s.as_str())?;
                }
                nested => {
                    sheet.write_string(xl_row, xl_col, cell_text(nested))?;
                }
            }
        }
    }

    let bytes = workbook.save_to_buffer()?;
    debug!(rows = table.len(), bytes = bytes.len(), "workbook serialized");
    Ok(bytes)
}

/// Serialize and write the workbook to `dest`.
pub fn write_xlsx(table: &Table, dest: impl AsRef<Path>) -> Result<()> {
    let dest = dest.as_ref();
    let bytes = to_xlsx(table)?;
    fs::write(dest, &bytes).map_err(|source| ReportError::Write {
        path: dest.to_path_buf(),
        source,
    })?;
    info!(mime = EXPORT_MIME_TYPE, "exported {} rows → {}", table.len(), dest.display());
    Ok(())
}

fn col_index(c: usize) -> Result<u16, XlsxError> {
    u16::try_from(c).map_err(|_| XlsxError::RowColumnLimitError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize_value, NormalizeOptions};
    use anyhow::Result;
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
    use serde_json::json;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn sample_table() -> Table {
        let body = json!({"d": {"results": [
            {"__metadata": {"uri": "x"}, "lifnr": "100", "name1": "Fazenda Boa Vista",
             "qtd": 12.5, "ativo": true, "erdat": "/Date(1700000000000)/"},
            {"__metadata": {"uri": "y"}, "lifnr": "200", "name1": null,
             "qtd": 3, "ativo": false, "erdat": "/Date(0)/"}
        ]}});
        let opts = NormalizeOptions::default().with_date_formatting();
        normalize_value(&body, &opts).unwrap().into_table().unwrap()
    }

    fn cell(d: &Data) -> String {
        match d {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            Data::Float(f) => f.to_string(),
            Data::Int(i) => i.to_string(),
            Data::Bool(b) => b.to_string(),
            other => format!("{:?}", other),
        }
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let table = sample_table();
        let bytes = to_xlsx(&table)?;

        let mut wb: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
        assert_eq!(wb.sheet_names(), vec![SHEET_NAME.to_string()]);
        let range = wb.worksheet_range(SHEET_NAME)?;
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|r| r.iter().map(cell).collect())
            .collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["LIFNR", "NAME1", "QTD", "ATIVO", "ERDAT"]);
        assert_eq!(rows[1], vec!["100", "Fazenda Boa Vista", "12.5", "true", "14/11/2023"]);
        assert_eq!(rows[2], vec!["200", "", "3", "false", "01/01/1970"]);
        Ok(())
    }

    #[test]
    fn test_write_to_file() -> Result<()> {
        let dir = tempdir()?;
        let dest = dir.path().join(EXPORT_FILE_NAME);
        write_xlsx(&sample_table(), &dest)?;

        let bytes = std::fs::read(&dest)?;
        // xlsx is a zip container
        assert_eq!(&bytes[..2], b"PK");
        Ok(())
    }

    #[test]
    fn test_oversized_cell_is_export_error() {
        let body = json!({"d": {"results": [{"lifnr": "100", "obs": "x".repeat(40_000)}]}});
        let table = normalize_value(&body, &NormalizeOptions::default())
            .unwrap()
            .into_table()
            .unwrap();

        let err = to_xlsx(&table).unwrap_err();
        assert!(matches!(err, ReportError::Export(_)), "{err}");
        assert!(err.is_processing());
        assert!(!err.is_remote());
    }

    #[test]
    fn test_unwritable_destination_is_write_error() -> Result<()> {
        let dir = tempdir()?;
        let dest = dir.path().join("missing").join(EXPORT_FILE_NAME);

        let err = write_xlsx(&sample_table(), &dest).unwrap_err();
        assert!(matches!(&err, ReportError::Write { path, .. } if path == &dest));
        assert!(err.is_processing());
        Ok(())
    }
}

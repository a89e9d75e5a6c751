//! Writers for exported tables

use super::table::{Cell, SensorTable};
use crate::error::{AnalyzerError, Result};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::path::Path;
use tracing::info;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AnalyzerError::io(parent, e))?;
    }
    Ok(())
}

/// Write a table to an `.xlsx` workbook with a bold header row and no index
///
/// Non-finite numbers are left as blank cells.
pub fn write_xlsx(table: &SensorTable, path: &Path) -> Result<()> {
    ensure_parent(path)?;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let header_format = Format::new().set_bold();

    for (col, name) in table.headers().iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
        worksheet.write_string_with_format(0, col, name, &header_format)?;
    }

    for (i, row) in table.rows().iter().enumerate() {
        let r = u32::try_from(i + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (col, cell) in row.iter().enumerate() {
            let c = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
            match cell {
                Cell::Number(v) if v.is_finite() => {
                    worksheet.write_number(r, c, *v)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                Cell::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Cell::Number(_) | Cell::Empty => {}
            }
        }
    }

    workbook.save(path)?;
    info!("Wrote {} rows to {:?}", table.n_rows(), path);
    Ok(())
}

/// Write a table to CSV
pub fn write_csv(table: &SensorTable, path: &Path) -> Result<()> {
    ensure_parent(path)?;

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.headers())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|c| c.to_string()))?;
    }
    writer.flush().map_err(|e| AnalyzerError::io(path, e))?;

    info!("Wrote {} rows to {:?}", table.n_rows(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_table() -> SensorTable {
        let mut table = SensorTable::from_channels(&[[0.0, 2.0, 3.0], [1.0, 0.0, f64::NAN]]);
        table.set_column("Anomaly", vec![Cell::Bool(true), Cell::Bool(false)]);
        table
    }

    #[test]
    fn test_xlsx_round_trip_through_loader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.xlsx");

        write_xlsx(&sample_table(), &path).unwrap();
        let loaded = SensorTable::from_path(&path).unwrap();

        assert_eq!(loaded.headers(), &["a1", "a2", "a3", "Anomaly"]);
        assert_eq!(loaded.n_rows(), 2);
        assert_eq!(loaded.rows()[0][3], Cell::Bool(true));
        assert!(loaded.channel("a3").unwrap()[1].is_nan());
    }

    #[test]
    fn test_csv_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        write_csv(&sample_table(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();

        assert_eq!(content, "a1,a2,a3,Anomaly\n0,2,3,True\n1,0,,False\n");
    }
}

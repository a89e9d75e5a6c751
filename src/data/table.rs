//! In-memory sensor table loaded from an uploaded spreadsheet

use crate::error::{AnalyzerError, Result};
use crate::CHANNELS;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::Serialize;
use std::cmp::Ordering;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// A single spreadsheet cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Bool(bool),
    Empty,
}

impl Cell {
    /// Numeric view of the cell; anything that is not a number reads as NaN
    pub fn as_f64(&self) -> f64 {
        match self {
            Cell::Number(v) => *v,
            Cell::Text(_) | Cell::Bool(_) | Cell::Empty => f64::NAN,
        }
    }

    /// Parse a CSV field into the most specific cell type
    fn parse(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        if let Ok(v) = trimmed.parse::<f64>() {
            return Cell::Number(v);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => Cell::Bool(true),
            "false" => Cell::Bool(false),
            _ => Cell::Text(field.to_string()),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(v) => Cell::Number(*v as f64),
            Data::Float(v) => Cell::Number(*v),
            Data::Bool(b) => Cell::Bool(*b),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Empty => Cell::Empty,
            other => Cell::Text(other.to_string()),
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Number(v) if v.is_nan() => Ok(()),
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Cell::Empty => Ok(()),
        }
    }
}

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Workbook,
    Csv,
}

impl TableFormat {
    /// Detect the format from a file name extension
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(TableFormat::Workbook),
            "csv" => Ok(TableFormat::Csv),
            _ => Err(AnalyzerError::UnsupportedFormat(file_name.to_string())),
        }
    }
}

/// Flat table of uploaded rows with the three channel columns located
#[derive(Debug, Clone, PartialEq)]
pub struct SensorTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl SensorTable {
    /// Build a table and check that every channel column is present
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .filter(|row| !row.iter().all(Cell::is_empty))
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();

        let table = Self { headers, rows };
        for channel in CHANNELS {
            if table.column_index(channel).is_none() {
                return Err(AnalyzerError::MissingColumn(channel.to_string()));
            }
        }
        Ok(table)
    }

    /// Build a table from channel readings only
    pub fn from_channels(readings: &[[f64; 3]]) -> Self {
        let headers = CHANNELS.iter().map(|c| c.to_string()).collect();
        let rows = readings
            .iter()
            .map(|r| r.iter().map(|&v| Cell::Number(v)).collect())
            .collect();
        Self { headers, rows }
    }

    /// Load the first worksheet of a workbook, or a CSV file, from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| AnalyzerError::io(path, e))?;
        let name = path.to_string_lossy();
        Self::from_bytes(&name, &bytes)
    }

    /// Load an uploaded file held in memory
    pub fn from_bytes(file_name: &str, bytes: &[u8]) -> Result<Self> {
        match TableFormat::from_file_name(file_name)? {
            TableFormat::Workbook => Self::read_workbook(file_name, bytes),
            TableFormat::Csv => Self::read_csv(bytes),
        }
    }

    fn read_workbook(file_name: &str, bytes: &[u8]) -> Result<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| AnalyzerError::Workbook(e.to_string()))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| AnalyzerError::EmptyWorkbook(file_name.to_string()))?
            .map_err(|e| AnalyzerError::Workbook(e.to_string()))?;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row.iter().map(|c| c.to_string().trim().to_string()).collect(),
            None => return Err(AnalyzerError::EmptyWorkbook(file_name.to_string())),
        };
        let body: Vec<Vec<Cell>> = rows.map(|row| row.iter().map(Cell::from).collect()).collect();

        debug!("Read {} rows x {} columns from {}", body.len(), headers.len(), file_name);
        Self::new(headers, body)
    }

    fn read_csv(bytes: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|s| s.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(record.iter().map(Cell::parse).collect());
        }

        debug!("Read {} rows x {} columns from CSV", rows.len(), headers.len());
        Self::new(headers, rows)
    }

    /// Column names in order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// All rows
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Numeric values of a column (NaN where a value is missing)
    pub fn channel(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| AnalyzerError::MissingColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|row| row[idx].as_f64()).collect())
    }

    /// Row-major `[a1, a2, a3]` readings
    pub fn readings(&self) -> Result<Vec<[f64; 3]>> {
        let a1 = self.channel(CHANNELS[0])?;
        let a2 = self.channel(CHANNELS[1])?;
        let a3 = self.channel(CHANNELS[2])?;
        Ok((0..self.n_rows()).map(|i| [a1[i], a2[i], a3[i]]).collect())
    }

    /// Replace a column by name, or append it when absent
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) {
        assert_eq!(values.len(), self.rows.len(), "column length must match row count");
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Keep the rows whose mask entry is true
    pub fn filter_rows(&self, mask: &[bool]) -> SensorTable {
        let rows = self
            .rows
            .iter()
            .zip(mask)
            .filter(|(_, &keep)| keep)
            .map(|(row, _)| row.clone())
            .collect();

        SensorTable {
            headers: self.headers.clone(),
            rows,
        }
    }

    /// Stable sort on a numeric column; NaN always sorts last
    pub fn sort_by_column(&mut self, name: &str, descending: bool) -> Result<()> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| AnalyzerError::MissingColumn(name.to_string()))?;

        self.rows.sort_by(|a, b| {
            let (x, y) = (a[idx].as_f64(), b[idx].as_f64());
            match (x.is_nan(), y.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                    if descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
            }
        });
        Ok(())
    }
}

/// Load a table from disk
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<SensorTable> {
    SensorTable::from_path(path)
}

/// Load a table from an in-memory upload
pub fn load_table_bytes(file_name: &str, bytes: &[u8]) -> Result<SensorTable> {
    SensorTable::from_bytes(file_name, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "site,a1,a2,a3\nnorth,1.5,0,2\nsouth,,3,4\n,,,\neast,1,abc,true\n";

    #[test]
    fn test_csv_load() {
        let table = SensorTable::from_bytes("readings.csv", CSV.as_bytes()).unwrap();

        assert_eq!(table.headers(), &["site", "a1", "a2", "a3"]);
        assert_eq!(table.n_rows(), 3);

        let a1 = table.channel("a1").unwrap();
        assert_eq!(a1[0], 1.5);
        assert!(a1[1].is_nan());

        let a2 = table.channel("a2").unwrap();
        assert!(a2[2].is_nan());

        let a3 = table.channel("a3").unwrap();
        assert!(a3[2].is_nan());
        assert_eq!(table.rows()[0][0], Cell::Text("north".to_string()));
    }

    #[test]
    fn test_non_numeric_cells_read_as_nan() {
        let table = SensorTable::from_bytes("x.csv", b"a1,a2,a3\nfalse,true,5\n").unwrap();
        let readings = table.readings().unwrap();

        assert!(readings[0][0].is_nan());
        assert!(readings[0][1].is_nan());
        assert_eq!(readings[0][2], 5.0);
        assert!(Cell::Text("0".to_string()).as_f64().is_nan());
    }

    #[test]
    fn test_missing_channel() {
        let err = SensorTable::from_bytes("x.csv", b"a1,a2\n1,2\n").unwrap_err();
        assert!(matches!(err, AnalyzerError::MissingColumn(ref c) if c == "a3"));
    }

    #[test]
    fn test_unsupported_format() {
        let err = SensorTable::from_bytes("x.txt", b"a1,a2,a3\n").unwrap_err();
        assert!(matches!(err, AnalyzerError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_set_column_replaces_existing() {
        let mut table = SensorTable::from_channels(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        table.set_column("mean_a", vec![Cell::Number(2.0), Cell::Number(5.0)]);
        table.set_column("mean_a", vec![Cell::Number(0.0), Cell::Number(1.0)]);

        assert_eq!(table.headers().len(), 4);
        assert_eq!(table.channel("mean_a").unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_sort_descending_nan_last_and_stable() {
        let mut table = SensorTable::from_channels(&[
            [1.0, 0.0, 0.0],
            [f64::NAN, 0.0, 0.0],
            [3.0, 1.0, 0.0],
            [3.0, 2.0, 0.0],
            [2.0, 0.0, 0.0],
        ]);
        table.sort_by_column("a1", true).unwrap();

        let a1 = table.channel("a1").unwrap();
        assert_eq!(&a1[..4], &[3.0, 3.0, 2.0, 1.0]);
        assert!(a1[4].is_nan());
        assert_eq!(table.channel("a2").unwrap()[..2], [1.0, 2.0]);
    }

    #[test]
    fn test_filter_rows() {
        let table = SensorTable::from_channels(&[[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]]);
        let filtered = table.filter_rows(&[true, false, true]);
        assert_eq!(filtered.channel("a1").unwrap(), vec![1.0, 3.0]);
    }
}

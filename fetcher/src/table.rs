//! The location table mapping location codes to planar coordinates.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::Read;
use std::path::Path;
use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, info, warn};
use thiserror::Error;
use crate::parser::LocationKey;

/// Column names the table source must provide.
pub const REQUIRED_COLUMNS: [&str; 5] = ["L", "R", "C", "X_CM", "Y_CM"];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("missing columns in location table: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("the workbook has no sheets")]
    NoSheets,
    #[error("unsupported table format: {0:?}")]
    UnsupportedFormat(String),
    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// One row of the location table.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LocationRecord {
    pub key: LocationKey,
    pub x: f64,
    pub y: f64,
}

/// Header and cell text of a tabular source, before any typing.
#[derive(Debug, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Reads a CSV source whose first record is the header.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<_, _>>()?;
        Ok(Self { headers, rows })
    }

    /// Reads one sheet of a workbook, or the first one if `sheet` is `None`.
    /// The first row of the sheet is the header.
    pub fn from_workbook(path: &Path, sheet: Option<&str>) -> Result<Self, TableError> {
        let mut workbook = open_workbook_auto(path)?;
        let sheet = match sheet {
            Some(sheet) => sheet.to_string(),
            None => workbook.sheet_names().first().cloned().ok_or(TableError::NoSheets)?,
        };
        debug!("Reading sheet {:?} of {}", sheet, path.display());

        let range = workbook.worksheet_range(&sheet)?;
        let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
        let headers = rows.next().unwrap_or_default();
        Ok(Self {
            headers,
            rows: rows.collect(),
        })
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// The in-memory location table, keyed by [LocationKey].
#[derive(Debug, Default)]
pub struct LocationTable {
    records: HashMap<LocationKey, LocationRecord>,
}

impl LocationTable {
    /// Loads the table from a file, picking the reader by extension.
    pub fn load(path: &Path, sheet: Option<&str>) -> Result<Self, TableError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let raw = match extension.as_str() {
            "csv" => {
                let file = std::fs::File::open(path).map_err(csv::Error::from)?;
                RawTable::from_csv(file)?
            }
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => RawTable::from_workbook(path, sheet)?,
            _ => return Err(TableError::UnsupportedFormat(path.display().to_string())),
        };

        let table = Self::from_raw(&raw)?;
        info!("Loaded {} locations from {}", table.len(), path.display());
        Ok(table)
    }

    /// Builds the table from untyped rows.
    ///
    /// Every required column must be present. Rows with non-numeric values are skipped,
    /// and for duplicate keys the first row wins.
    pub fn from_raw(raw: &RawTable) -> Result<Self, TableError> {
        let position = |name: &str| raw.headers.iter().position(|h| h.trim() == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .into_iter()
            .filter(|&name| position(name).is_none())
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(TableError::MissingColumns(missing));
        }

        let columns = REQUIRED_COLUMNS.map(|name| position(name).unwrap_or_default());
        let mut records = HashMap::new();

        for (index, cells) in raw.rows.iter().enumerate() {
            // Header is line 1.
            let line = index + 2;
            let cell = |column: usize| cells.get(columns[column]).map(String::as_str).unwrap_or("");

            if (0..columns.len()).all(|column| cell(column).is_empty()) {
                continue;
            }

            let key = match (int_cell(cell(0)), int_cell(cell(1)), int_cell(cell(2))) {
                (Some(level), Some(row), Some(column)) => LocationKey::new(level, row, column),
                _ => {
                    warn!("Skipping row {}: invalid location {:?}", line, [cell(0), cell(1), cell(2)]);
                    continue;
                }
            };
            let (Some(x), Some(y)) = (coordinate_cell(cell(3)), coordinate_cell(cell(4))) else {
                warn!("Skipping row {} ({}): invalid coordinates", line, key);
                continue;
            };

            match records.entry(key) {
                Entry::Vacant(entry) => {
                    entry.insert(LocationRecord { key, x, y });
                }
                Entry::Occupied(_) => {
                    warn!("Ignoring duplicate location {} on row {}", key, line);
                }
            }
        }

        Ok(Self { records })
    }

    pub fn lookup(&self, key: &LocationKey) -> Option<&LocationRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parses an integer cell. Spreadsheets often store whole numbers as floats, so `7.0` is accepted.
fn int_cell(text: &str) -> Option<u32> {
    if let Ok(value) = text.parse::<u32>() {
        return Some(value);
    }
    let value = text.parse::<f64>().ok()?;
    if value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value) {
        Some(value as u32)
    } else {
        None
    }
}

/// Parses a coordinate cell. `NaN` and infinities parse as floats but are not positions.
fn coordinate_cell(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|value| value.is_finite())
}

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use serde::Serialize;

use crate::dataset::{Column, Dataset, parse_number};
use crate::error::DataError;
use crate::metrics;
use crate::store::DatasetStore;

/// Receipt echoed back to the uploader after a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub filename: String,
    pub size: usize,
}

/// One raw cell as read from a source file, before column typing.
#[derive(Debug)]
enum RawCell {
    Empty,
    Number(f64),
    Text(String),
}

/// Ingest an uploaded file: detect the format from the filename extension,
/// parse the bytes into a raw table, run metric derivation, and replace
/// the store's dataset.
///
/// Any failure leaves the store untouched, so a bad re-upload never
/// destroys a previously loaded dataset.
pub fn ingest(
    store: &DatasetStore,
    filename: &str,
    bytes: &[u8],
) -> Result<UploadReceipt, DataError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    let raw = match extension.as_str() {
        "csv" => from_csv_bytes(bytes)?,
        "xls" | "xlsx" => from_excel_bytes(bytes)?,
        other => return Err(DataError::UnsupportedFormat(other.to_string())),
    };

    let enriched = metrics::derive(raw);
    log::info!(
        "loaded '{}': {} rows, {} columns after derivation",
        filename,
        enriched.row_count(),
        enriched.column_count()
    );
    store.set(enriched);

    Ok(UploadReceipt {
        filename: filename.to_string(),
        size: bytes.len(),
    })
}

/// Parse CSV bytes into a raw dataset.
///
/// The first line is the header row. Handles quoted fields with embedded
/// commas and doubled quotes, `\r\n` line endings, and a leading UTF-8 BOM.
fn from_csv_bytes(bytes: &[u8]) -> Result<Dataset, DataError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| DataError::Parse(format!("file is not valid UTF-8: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return Err(DataError::Parse("CSV file is empty".to_string()));
    }

    let headers = dedup_headers(parse_csv_row(lines[0]));

    // Pad short rows with empty cells; skip extra data past the header width.
    let mut rows = Vec::with_capacity(lines.len() - 1);
    for line in &lines[1..] {
        let mut cells: Vec<RawCell> = parse_csv_row(line)
            .into_iter()
            .take(headers.len())
            .map(|field| {
                if field.trim().is_empty() {
                    RawCell::Empty
                } else {
                    RawCell::Text(field)
                }
            })
            .collect();
        cells.resize_with(headers.len(), || RawCell::Empty);
        rows.push(cells);
    }

    build_dataset(headers, rows)
}

/// Parse Excel bytes (`.xls` or `.xlsx`) into a raw dataset.
///
/// Reads the first worksheet; the first row is the header row.
fn from_excel_bytes(bytes: &[u8]) -> Result<Dataset, DataError> {
    use calamine::{Data, Reader};

    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
        .map_err(|e| DataError::Parse(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| DataError::Parse("No sheets found in Excel file".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| DataError::Parse(e.to_string()))?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Err(DataError::Parse("Excel sheet is empty".to_string()));
    };

    let headers = dedup_headers(
        header_row
            .iter()
            .map(|cell| match cell {
                Data::String(s) => s.trim().to_string(),
                other => excel_cell(other).to_text(),
            })
            .collect(),
    );

    let mut rows = Vec::new();
    for sheet_row in sheet_rows {
        let mut cells: Vec<RawCell> = sheet_row
            .iter()
            .take(headers.len())
            .map(excel_cell)
            .collect();
        cells.resize_with(headers.len(), || RawCell::Empty);
        rows.push(cells);
    }

    build_dataset(headers, rows)
}

fn excel_cell(cell: &calamine::Data) -> RawCell {
    use calamine::Data;

    match cell {
        Data::Empty => RawCell::Empty,
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Float(f) => RawCell::Number(*f),
        Data::String(s) => {
            if s.trim().is_empty() {
                RawCell::Empty
            } else {
                RawCell::Text(s.clone())
            }
        }
        Data::Bool(b) => RawCell::Text(b.to_string()),
        // Rendered so the metric engine's Date reparse can pick them up.
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) if ts.time() == chrono::NaiveTime::MIN => {
                RawCell::Text(ts.date().format("%Y-%m-%d").to_string())
            }
            Some(ts) => RawCell::Text(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => RawCell::Empty,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::Error(_) => RawCell::Empty,
    }
}

impl RawCell {
    /// The cell as a number, if it is one.
    fn as_number(&self) -> Option<f64> {
        match self {
            RawCell::Empty => None,
            RawCell::Number(n) => Some(*n),
            RawCell::Text(s) => parse_number(s),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, RawCell::Empty)
    }

    fn to_text(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Number(n) => format_number(*n),
            RawCell::Text(s) => s.clone(),
        }
    }
}

/// Render a numeric cell as text without a spurious trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Type each column and assemble the dataset.
///
/// A column is numeric iff every non-empty cell is a number; otherwise it
/// is text. Empty cells become NaN in numeric columns (scrubbed to 0 by
/// derivation) and empty strings in text columns.
fn build_dataset(headers: Vec<String>, rows: Vec<Vec<RawCell>>) -> Result<Dataset, DataError> {
    let mut columns = Vec::with_capacity(headers.len());

    for (index, name) in headers.into_iter().enumerate() {
        let cells: Vec<&RawCell> = rows.iter().map(|row| &row[index]).collect();
        let numeric = cells
            .iter()
            .all(|cell| cell.is_empty() || cell.as_number().is_some());

        let column = if numeric {
            Column::Numeric(
                cells
                    .iter()
                    .map(|cell| cell.as_number().unwrap_or(f64::NAN))
                    .collect(),
            )
        } else {
            Column::Text(cells.iter().map(|cell| cell.to_text()).collect())
        };
        columns.push((name, column));
    }

    Dataset::from_columns(columns).map_err(|e| DataError::Parse(e.to_string()))
}

/// Make header names unique (`Name`, `Name.1`, `Name.2`, ...) and give
/// blank headers a placeholder name.
fn dedup_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let base = if raw.trim().is_empty() {
                format!("Unnamed: {}", index)
            } else {
                raw.trim().to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

// Parse a CSV row into a vector of fields, honoring quotes.
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if let Some(&next) = chars.peek() {
                    if next == '"' && in_quotes {
                        // Double quote inside quoted field - add a single quote
                        current_field.push('"');
                        chars.next();
                    } else {
                        // Toggle quote state
                        in_quotes = !in_quotes;
                    }
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                // End of field
                result.push(current_field);
                current_field = String::new();
            }
            _ => {
                current_field.push(c);
            }
        }
    }

    // Add the last field
    result.push(current_field);

    result
}

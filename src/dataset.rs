use chrono::NaiveDate;
use thiserror::Error;

/// A single column of the in-memory table.
///
/// Columns are homogeneously typed: a column is either numeric, textual,
/// or calendar dates. The `Date` variant is only ever produced by the
/// metric engine reparsing a textual `Date` column; files load as
/// `Numeric` or `Text`.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    /// Floating point values. Missing cells are NaN until the metric
    /// engine's normalization pass turns them into 0.
    Numeric(Vec<f64>),

    /// Free-form text values. Missing cells are empty strings.
    Text(Vec<String>),

    /// Calendar dates from a successfully reparsed `Date` column.
    Date(Vec<NaiveDate>),
}

impl Column {
    /// Number of cells in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
            Column::Date(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Error returned when a column's length disagrees with the table's row count.
#[derive(Debug, Error)]
#[error("column '{name}' has {got} rows, expected {expected}")]
pub struct ShapeError {
    pub name: String,
    pub got: usize,
    pub expected: usize,
}

/// An in-memory table of named columns.
///
/// Invariants: column names are unique, column order is first-seen order,
/// and every column holds exactly `row_count` cells, so row `i` of every
/// column describes the same logical record.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    columns: Vec<(String, Column)>,
    row_count: usize,
}

impl Dataset {
    pub fn new() -> Self {
        Dataset {
            columns: Vec::new(),
            row_count: 0,
        }
    }

    /// Build a dataset from an ordered list of named columns.
    pub fn from_columns(
        columns: impl IntoIterator<Item = (String, Column)>,
    ) -> Result<Self, ShapeError> {
        let mut dataset = Dataset::new();
        for (name, column) in columns {
            dataset.push_column(name, column)?;
        }
        Ok(dataset)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Iterate over `(name, column)` pairs in table order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(name, col)| (name.as_str(), col))
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, col)| col)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Add a column, or replace an existing column of the same name in place.
    ///
    /// The first column fixes the table's row count; every later column
    /// must match it.
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        column: Column,
    ) -> Result<(), ShapeError> {
        let name = name.into();
        if self.columns.is_empty() {
            self.row_count = column.len();
        } else if column.len() != self.row_count {
            return Err(ShapeError {
                got: column.len(),
                expected: self.row_count,
                name,
            });
        }
        self.set_column_unchecked(&name, column);
        Ok(())
    }

    /// Insert-or-replace for callers that construct columns of the right
    /// length by construction (the metric engine).
    pub(crate) fn set_column_unchecked(&mut self, name: &str, column: Column) {
        debug_assert!(self.columns.is_empty() || column.len() == self.row_count);
        if let Some(slot) = self.columns.iter_mut().find(|(n, _)| n == name) {
            slot.1 = column;
        } else {
            self.columns.push((name.to_string(), column));
        }
    }

    pub(crate) fn columns_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut().map(|(_, col)| col)
    }

    /// Numeric view of a column, coercing per cell: numeric cells pass
    /// through, text cells parse or become NaN, date cells become NaN.
    /// `None` when the column does not exist.
    pub fn numeric_view(&self, name: &str) -> Option<Vec<f64>> {
        self.column(name).map(|column| match column {
            Column::Numeric(values) => values.clone(),
            Column::Text(values) => values
                .iter()
                .map(|raw| parse_number(raw).unwrap_or(f64::NAN))
                .collect(),
            Column::Date(values) => vec![f64::NAN; values.len()],
        })
    }
}

/// Parse a cell's text as a number. Empty (or whitespace-only) cells are
/// not numbers.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

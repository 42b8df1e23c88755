use std::collections::HashSet;

use serde::Serialize;

use crate::dataset::{Column, Dataset};
use crate::error::DataError;
use crate::store::DatasetStore;

/// Text columns with this many (or more) distinct values are treated as
/// unbounded identifiers, not chart categories.
pub const CATEGORY_LIMIT: usize = 50;

/// Aggregate statistics and column classification for the current dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub total_sales: f64,
    pub avg_profit: f64,
    pub max_profit: f64,
    pub min_profit: f64,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Summarize the currently stored dataset.
///
/// `NoData` when the store is empty or holds a zero-row table. (The chart
/// route deliberately keeps serving empty series for a zero-row table;
/// only the summary treats it as absent.)
pub fn summarize(store: &DatasetStore) -> Result<SummaryReport, DataError> {
    let dataset = store.get().ok_or(DataError::NoData)?;
    if dataset.row_count() == 0 {
        return Err(DataError::NoData);
    }
    Ok(describe(&dataset))
}

/// Compute the report for a dataset.
///
/// Every aggregate degrades to 0 instead of erroring: an absent column, a
/// non-numeric cell, or an empty column all contribute 0. Availability is
/// traded for silent inaccuracy here; the tradeoff is recorded in
/// DESIGN.md.
pub fn describe(dataset: &Dataset) -> SummaryReport {
    let mut numeric_columns = Vec::new();
    let mut categorical_columns = Vec::new();

    for (name, column) in dataset.columns() {
        match column {
            Column::Numeric(_) => numeric_columns.push(name.to_string()),
            Column::Text(values) => {
                let distinct: HashSet<&str> = values.iter().map(|v| v.as_str()).collect();
                if distinct.len() < CATEGORY_LIMIT {
                    categorical_columns.push(name.to_string());
                }
            }
            // Date columns are neither numeric nor categorical.
            Column::Date(_) => {}
        }
    }

    SummaryReport {
        total_sales: aggregate(dataset, "Sales", |values| values.iter().sum()),
        avg_profit: aggregate(dataset, "Profit", |values| {
            values.iter().sum::<f64>() / values.len() as f64
        }),
        max_profit: aggregate(dataset, "Profit", |values| {
            values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        }),
        min_profit: aggregate(dataset, "Profit", |values| {
            values.iter().copied().fold(f64::INFINITY, f64::min)
        }),
        numeric_columns,
        categorical_columns,
        rows: dataset.row_count(),
        columns: dataset.column_names(),
    }
}

/// Evaluate a statistic over a column that may be absent, empty, or
/// non-numeric, defaulting to 0. Non-numeric cells count as 0, matching
/// the coerce-then-fill behavior of the rest of the pipeline.
fn aggregate(dataset: &Dataset, name: &str, stat: impl Fn(&[f64]) -> f64) -> f64 {
    let Some(values) = dataset.numeric_view(name) else {
        return 0.0;
    };
    if values.is_empty() {
        return 0.0;
    }
    let zeroed: Vec<f64> = values
        .iter()
        .map(|v| if v.is_finite() { *v } else { 0.0 })
        .collect();
    stat(&zeroed)
}

use std::collections::HashMap;

use serde::Serialize;

use crate::dataset::{Column, Dataset};
use crate::error::DataError;
use crate::store::DatasetStore;

/// Chart types the dashboard can request.
///
/// Line and bar charts consume the same label/value pairs; the type only
/// changes how the frontend draws them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphType {
    Line,
    Bar,
}

impl GraphType {
    /// Parse the request's `type` field, case-insensitively.
    pub fn parse(raw: &str) -> Result<Self, DataError> {
        match raw.to_lowercase().as_str() {
            "line" => Ok(GraphType::Line),
            "bar" => Ok(GraphType::Bar),
            other => Err(DataError::InvalidChartKind(other.to_string())),
        }
    }
}

/// A chart-ready series: `labels` and `values` are parallel and equal in
/// length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Build the series for one column of the currently stored dataset.
pub fn build_series(
    store: &DatasetStore,
    metric: &str,
    graph_type: GraphType,
) -> Result<Series, DataError> {
    let dataset = store.get().ok_or(DataError::NoData)?;
    series_for(&dataset, metric, graph_type)
}

/// Build the series for one column.
///
/// Numeric columns become a row-per-point series labelled by the `Date`
/// column when present (1-based row positions otherwise). Textual and
/// date-typed columns become a frequency histogram: one point per
/// distinct value, ordered by descending count.
pub fn series_for(
    dataset: &Dataset,
    metric: &str,
    _graph_type: GraphType,
) -> Result<Series, DataError> {
    let column = dataset
        .column(metric)
        .ok_or_else(|| DataError::UnknownColumn(metric.to_string()))?;

    let series = match column {
        Column::Numeric(values) => Series {
            labels: axis_labels(dataset),
            values: values
                .iter()
                .map(|v| if v.is_finite() { *v } else { 0.0 })
                .collect(),
        },
        Column::Text(values) => frequency_series(values.iter().cloned()),
        Column::Date(values) => {
            frequency_series(values.iter().map(|d| d.format("%Y-%m-%d").to_string()))
        }
    };
    Ok(series)
}

/// X-axis labels for a numeric series: the `Date` column if present,
/// otherwise 1-based row positions.
fn axis_labels(dataset: &Dataset) -> Vec<String> {
    match dataset.column("Date") {
        Some(Column::Date(dates)) => dates
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect(),
        // A Date column that failed to reparse is used verbatim.
        Some(Column::Text(raw)) => raw.clone(),
        Some(Column::Numeric(values)) => values.iter().map(|v| v.to_string()).collect(),
        None => (1..=dataset.row_count()).map(|i| i.to_string()).collect(),
    }
}

/// Count occurrences of each distinct value and order the pairs by
/// descending count. The sort is stable, so equal counts keep first-seen
/// order.
fn frequency_series(values: impl Iterator<Item = String>) -> Series {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for value in values {
        if !counts.contains_key(&value) {
            order.push(value.clone());
        }
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut pairs: Vec<(String, usize)> = order
        .into_iter()
        .map(|label| {
            let count = counts[&label];
            (label, count)
        })
        .collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1));

    Series {
        labels: pairs.iter().map(|(label, _)| label.clone()).collect(),
        values: pairs.iter().map(|(_, count)| *count as f64).collect(),
    }
}

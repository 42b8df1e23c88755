use chrono::{NaiveDate, NaiveDateTime};

use crate::dataset::{Column, Dataset};

/// Date formats accepted when reparsing a textual `Date` column.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// Enrich a raw table with every derived business metric whose source
/// columns are present.
///
/// Total and deterministic: malformed cells degrade instead of erroring.
/// Each step is gated only on source-column presence, so a derived column
/// exists iff its full required set was in the input. Steps run in table
/// order and append in that order; a derived name that already exists is
/// replaced in place.
///
/// The final pass turns every non-finite numeric cell (division by zero,
/// missing or non-numeric operands) into 0. That conflates "undefined"
/// with a genuine zero; the policy lives entirely in `scrub_non_finite` so
/// a future revision can swap in an explicit marker without touching the
/// formulas.
pub fn derive(mut dataset: Dataset) -> Dataset {
    log::debug!(
        "deriving metrics over {} rows x {} columns",
        dataset.row_count(),
        dataset.column_count()
    );

    reparse_dates(&mut dataset);

    // Ratios & percentages
    binary_metric(&mut dataset, "Profit_Margin_%", "Profit", "Sales", |p, s| {
        p / s * 100.0
    });
    binary_metric(&mut dataset, "Gross_Margin_%", "Sales", "Cost", |s, c| {
        (s - c) / s * 100.0
    });
    binary_metric(
        &mut dataset,
        "Conversion_Rate_%",
        "Conversions",
        "Customers",
        |conv, cust| conv / cust * 100.0,
    );
    retention_and_churn(&mut dataset);

    // Operational metrics
    binary_metric(
        &mut dataset,
        "Avg_Resolution_Time",
        "Resolution_Time_Hours",
        "Resolved_Tickets",
        |hours, tickets| hours / tickets,
    );
    binary_metric(
        &mut dataset,
        "Utilization_%",
        "Employee_Worked_Hours",
        "Employee_Available_Hours",
        |worked, available| worked / available * 100.0,
    );

    // Customer & marketing metrics
    copy_metric(&mut dataset, "CLV", "Customer_Lifetime_Revenue");
    copy_metric(&mut dataset, "CAC", "Customer_Acquisition_Cost");
    binary_metric(
        &mut dataset,
        "ROI_%",
        "Revenue",
        "Marketing_Spend",
        |rev, spend| (rev - spend) / spend * 100.0,
    );

    // Financial metrics
    binary_metric(
        &mut dataset,
        "Net_Profit_%",
        "Net_Profit",
        "Revenue",
        |net, rev| net / rev * 100.0,
    );
    binary_metric(
        &mut dataset,
        "Operating_Margin_%",
        "Operating_Income",
        "Revenue",
        |op, rev| op / rev * 100.0,
    );

    scrub_non_finite(&mut dataset);
    dataset
}

/// Replace a textual `Date` column with calendar dates, but only when
/// every cell parses; one bad cell leaves the column untouched.
fn reparse_dates(dataset: &mut Dataset) {
    let parsed: Option<Vec<NaiveDate>> = match dataset.column("Date") {
        Some(Column::Text(values)) => values.iter().map(|raw| parse_date(raw)).collect(),
        _ => None,
    };
    if let Some(dates) = parsed {
        dataset.set_column_unchecked("Date", Column::Date(dates));
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    // Timestamped exports (including our own Excel cell rendering)
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|ts| ts.date())
}

/// Derive `target` from two source columns, row by row. Skipped entirely
/// when either source is absent; non-numeric cells contribute NaN and are
/// scrubbed afterwards.
fn binary_metric(
    dataset: &mut Dataset,
    target: &str,
    lhs: &str,
    rhs: &str,
    formula: impl Fn(f64, f64) -> f64,
) {
    let (Some(lhs), Some(rhs)) = (dataset.numeric_view(lhs), dataset.numeric_view(rhs)) else {
        return;
    };
    let values = lhs
        .iter()
        .zip(rhs.iter())
        .map(|(&a, &b)| formula(a, b))
        .collect();
    dataset.set_column_unchecked(target, Column::Numeric(values));
}

/// Retention and churn share a gate: churn is derived from the retention
/// column computed in the same step, not from a pre-existing one.
fn retention_and_churn(dataset: &mut Dataset) {
    let (Some(retained), Some(customers)) = (
        dataset.numeric_view("Retained_Customers"),
        dataset.numeric_view("Customers"),
    ) else {
        return;
    };
    let retention: Vec<f64> = retained
        .iter()
        .zip(customers.iter())
        .map(|(&r, &c)| r / c * 100.0)
        .collect();
    let churn: Vec<f64> = retention.iter().map(|&rate| 100.0 - rate).collect();
    dataset.set_column_unchecked("Retention_Rate_%", Column::Numeric(retention));
    dataset.set_column_unchecked("Churn_Rate_%", Column::Numeric(churn));
}

/// `CLV` / `CAC` are straight copies of their source column, type included.
fn copy_metric(dataset: &mut Dataset, target: &str, source: &str) {
    if let Some(column) = dataset.column(source).cloned() {
        dataset.set_column_unchecked(target, column);
    }
}

/// The single normalization pass: every numeric cell that is NaN or
/// infinite becomes 0. Tests depend on the observable zero; see DESIGN.md
/// for the undefined-vs-zero open question.
fn scrub_non_finite(dataset: &mut Dataset) {
    for column in dataset.columns_mut() {
        if let Column::Numeric(values) = column {
            for value in values.iter_mut() {
                if !value.is_finite() {
                    *value = 0.0;
                }
            }
        }
    }
}

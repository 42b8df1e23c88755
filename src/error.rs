use thiserror::Error;

/// Failure modes of the upload / report request cycle.
///
/// Every variant is recoverable at the request boundary and maps to a 4xx
/// response with its display message; none is fatal to the process.
#[derive(Debug, Error)]
pub enum DataError {
    /// The uploaded filename carries an extension we do not ingest.
    #[error("Unsupported file extension: '{0}'")]
    UnsupportedFormat(String),

    /// The file bytes could not be parsed into a table.
    #[error("Error parsing file: {0}")]
    Parse(String),

    /// No dataset is currently loaded.
    #[error("No data available. Upload a file first.")]
    NoData,

    /// The requested metric names no column in the current dataset.
    #[error("Metric '{0}' not found in data.")]
    UnknownColumn(String),

    /// The requested chart type is neither `line` nor `bar`.
    #[error("Invalid chart type '{0}'. Use 'line' or 'bar'.")]
    InvalidChartKind(String),
}

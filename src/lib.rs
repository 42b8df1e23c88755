/*!
# Morphboard

A small analytics backend: upload a spreadsheet, get back business metrics
and chart-ready series for a dashboard frontend.

## Overview

Clients upload a CSV or Excel file. The backend parses it into an
in-memory table, enriches it with derived business ratios (margins,
conversion/retention rates, utilization, ROI, and friends), and keeps the
result as *the* current dataset. Summary and chart endpoints read that
dataset on demand and recompute their answers every call; nothing is
cached and nothing survives a restart.

## Architecture

The pipeline, leaf-first:

- **Dataset model** (`dataset`) - ordered named columns, numeric / text /
  date typed, with a consistent row count across columns.
- **Metric Derivation Engine** (`metrics`) - a pure, total
  `derive(Dataset) -> Dataset` that appends every derived metric whose
  source columns are present, then scrubs non-finite cells to zero.
- **Dataset Store** (`store`) - the single slot holding the current
  dataset; replaced wholesale on each successful upload, snapshotted by
  readers.
- **Ingestion** (`loader`) - extension-based format detection, CSV/Excel
  parsing, column typing, then derive-and-store.
- **Summary Reporter** (`summary`) - aggregate statistics plus
  numeric/categorical column classification.
- **Chart Series Builder** (`graph`) - label/value series for one column:
  a date-or-index series for numeric columns, a descending-frequency
  histogram for categorical ones.

Around the pipeline sit the web glue (`app`), account and session
handling with Google sign-in and a per-user credit ledger (`login`),
the error taxonomy (`error`), and environment configuration (`config`).

## REST API Endpoints

- `POST /api/upload` - multipart spreadsheet upload
- `GET /api/summary` - aggregate statistics for the current dataset
- `POST /api/chart` - labels/values for one column
- `POST /signup`, `POST /login`, `POST /logout` - password accounts
- `POST /auth/google` - Google ID-token sign-in
- `GET /api/me` - current user lookup
- `POST /api/use-credit` - deduct one graph credit
*/

// Re-export all modules so they appear in the documentation
pub mod app;
pub mod config;
pub mod dataset;
pub mod error;
pub mod graph;
pub mod loader;
pub mod login;
pub mod metrics;
pub mod store;
pub mod summary;

/// Re-export the main types to make them easier to use
pub use dataset::{Column, Dataset};
pub use error::DataError;
pub use graph::{GraphType, Series};
pub use loader::{UploadReceipt, ingest};
pub use metrics::derive;
pub use store::DatasetStore;
pub use summary::{SummaryReport, summarize};

// Diesel Control - Core Library
// Daily tank vs system reconciliation, indicators, report text and CSV export.
// Used by the CLI, the terminal dashboard, the API server and the tests.

pub mod error;
pub mod config;
pub mod calculator;    // Tank - system difference and error margin
pub mod entry;         // DailyEntry / NewEntry / EntryInput
pub mod aggregator;    // Indicators, partitions, status, statistics
pub mod report;        // Standard report sentence
pub mod export;        // Fixed-column CSV output
pub mod store;         // Append-only record store (SQLite)

// Re-export commonly used types
pub use error::{Error, Result, StoreError};
pub use crate::config::{Config, ServerConfig, DEFAULT_ALERT_THRESHOLD_PCT};
pub use calculator::{reconcile, validate_quantity, Reconciliation};
pub use entry::{parse_date, DailyEntry, EntryInput, NewEntry};
pub use aggregator::{
    annotate, column_sums, cumulative_balance, describe, exceeds_threshold, indicators,
    latest_margin, malformed, max_absolute_deviation, moving_average_margin,
    partition_by_today, sort_entries, ColumnSummary, EntryStatus, Indicators, Partition,
    DEFAULT_WINDOW,
};
pub use report::{daily_report, latest_report};
pub use export::{
    export_file_name, matrix_rows, write_history_csv, write_matrix_csv, ExportKind, MatrixRow,
    MATRIX_COLUMNS,
};
pub use store::{setup_database, RecordStore, SqliteStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which slice of the history a view or export covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Today,
    History,
    All,
}

impl Scope {
    /// Sorted entries for this scope. `History` means strictly before `today`.
    pub fn select(&self, entries: &[DailyEntry], today: chrono::NaiveDate) -> Vec<DailyEntry> {
        let sorted = sort_entries(entries);
        match self {
            Scope::All => sorted,
            Scope::Today => partition_by_today(&sorted, today).today,
            Scope::History => partition_by_today(&sorted, today).prior,
        }
    }
}

/// Validate, derive and append in one step
pub fn record_entry<S: RecordStore + ?Sized>(store: &S, input: &EntryInput) -> Result<DailyEntry> {
    let entry = NewEntry::from_input(input)?;
    Ok(store.append(&entry)?)
}

/// Load everything from the store in display order
pub fn load_sorted<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<DailyEntry>> {
    Ok(sort_entries(&store.list_all()?))
}

// 📊 Aggregator - indicators over an ordered sequence of entries
//
// Every function here is pure and total. An empty sequence means "no data"
// (None / empty Vec), never an error.
//
// Ordering: date ascending, ties by creation order. Entries whose stored date
// did not parse go last, still in creation order.

use crate::entry::DailyEntry;
use crate::export::{MatrixRow, MATRIX_COLUMNS};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Moving-average window used by the indicators panel
pub const DEFAULT_WINDOW: usize = 7;

// ============================================================================
// ORDERING
// ============================================================================

/// Canonical display order. Stable, so equal keys keep store order.
pub fn sort_entries(entries: &[DailyEntry]) -> Vec<DailyEntry> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| match (a.date, b.date) {
        (Some(da), Some(db)) => da.cmp(&db).then(a.created_at.cmp(&b.created_at)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.created_at.cmp(&b.created_at),
    });
    sorted
}

// ============================================================================
// INDICATORS
// ============================================================================

pub fn latest_margin(entries: &[DailyEntry]) -> Option<f64> {
    entries.last().map(|e| e.error_margin_pct)
}

/// Mean margin over the last `min(window, len)` entries
pub fn moving_average_margin(entries: &[DailyEntry], window: usize) -> Option<f64> {
    let take = window.min(entries.len());
    if take == 0 {
        return None;
    }

    let tail = &entries[entries.len() - take..];
    let sum: f64 = tail.iter().map(|e| e.error_margin_pct).sum();
    Some(sum / take as f64)
}

pub fn max_absolute_deviation(entries: &[DailyEntry]) -> Option<f64> {
    entries
        .iter()
        .map(|e| e.error_margin_pct.abs())
        .fold(None, |max, v| match max {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        })
}

pub fn cumulative_balance(entries: &[DailyEntry]) -> Option<f64> {
    if entries.is_empty() {
        return None;
    }
    Some(entries.iter().map(|e| e.difference_lt).sum())
}

/// Strict comparison: a margin equal to the threshold is within limit
pub fn exceeds_threshold(entry: &DailyEntry, threshold_pct: f64) -> bool {
    entry.error_margin_pct.abs() > threshold_pct
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    pub entry_count: usize,
    pub latest_margin_pct: Option<f64>,
    pub moving_average_margin_pct: Option<f64>,
    pub max_absolute_deviation_pct: Option<f64>,
    pub cumulative_balance_lt: Option<f64>,
}

pub fn indicators(entries: &[DailyEntry], window: usize) -> Indicators {
    Indicators {
        entry_count: entries.len(),
        latest_margin_pct: latest_margin(entries),
        moving_average_margin_pct: moving_average_margin(entries, window),
        max_absolute_deviation_pct: max_absolute_deviation(entries),
        cumulative_balance_lt: cumulative_balance(entries),
    }
}

// ============================================================================
// PARTITIONING
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Partition {
    pub today: Vec<DailyEntry>,
    pub prior: Vec<DailyEntry>,
}

/// Split into (date == today, date < today). Undated and future entries fall in neither.
pub fn partition_by_today(entries: &[DailyEntry], today: NaiveDate) -> Partition {
    let mut partition = Partition::default();

    for entry in entries {
        match entry.date {
            Some(d) if d == today => partition.today.push(entry.clone()),
            Some(d) if d < today => partition.prior.push(entry.clone()),
            _ => {}
        }
    }

    partition
}

/// Entries whose stored date could not be parsed
pub fn malformed(entries: &[DailyEntry]) -> Vec<&DailyEntry> {
    entries.iter().filter(|e| !e.has_valid_date()).collect()
}

// ============================================================================
// STATUS ANNOTATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Ok,
    OutOfLimit,
}

impl EntryStatus {
    pub fn for_entry(entry: &DailyEntry, threshold_pct: f64) -> Self {
        if exceeds_threshold(entry, threshold_pct) {
            EntryStatus::OutOfLimit
        } else {
            EntryStatus::Ok
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntryStatus::Ok => "OK",
            EntryStatus::OutOfLimit => "⚠️ Out of limit",
        }
    }
}

/// Pair each entry with its status. The input is left untouched.
pub fn annotate(entries: &[DailyEntry], threshold_pct: f64) -> Vec<(DailyEntry, EntryStatus)> {
    entries
        .iter()
        .map(|e| (e.clone(), EntryStatus::for_entry(e, threshold_pct)))
        .collect()
}

// ============================================================================
// MATRIX STATISTICS
// ============================================================================

/// Σ per matrix column
pub fn column_sums(entries: &[DailyEntry]) -> Option<MatrixRow> {
    if entries.is_empty() {
        return None;
    }

    let mut sums = [0.0; 6];
    for entry in entries {
        for (sum, value) in sums.iter_mut().zip(MatrixRow::from_entry(entry).to_array()) {
            *sum += value;
        }
    }
    Some(MatrixRow::from_array(sums))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation. None for a single value
    pub std: Option<f64>,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

/// Descriptive statistics for every matrix column
pub fn describe(entries: &[DailyEntry]) -> Vec<ColumnSummary> {
    if entries.is_empty() {
        return Vec::new();
    }

    let rows: Vec<[f64; 6]> = entries
        .iter()
        .map(|e| MatrixRow::from_entry(e).to_array())
        .collect();

    MATRIX_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let mut values: Vec<f64> = rows.iter().map(|r| r[i]).collect();
            values.sort_by(|a, b| a.total_cmp(b));
            summarize(column, &values)
        })
        .collect()
}

fn summarize(column: &str, sorted: &[f64]) -> ColumnSummary {
    let count = sorted.len();
    let mean = sorted.iter().sum::<f64>() / count as f64;

    let std = if count > 1 {
        let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        Some(var.sqrt())
    } else {
        None
    };

    ColumnSummary {
        column: column.to_string(),
        count,
        mean,
        std,
        min: sorted[0],
        p25: quantile(sorted, 0.25),
        median: quantile(sorted, 0.5),
        p75: quantile(sorted, 0.75),
        max: sorted[count - 1],
    }
}

/// Linear interpolation between closest ranks
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

// ============================================================================
// TESTS
// ============================================================================

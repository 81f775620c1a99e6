// 💾 CSV Export - fixed column order
//
// Any exporter depends on MATRIX_COLUMNS staying in this exact order,
// so reproducible CSV output comes from here and nowhere else.

use crate::entry::{DailyEntry, DATE_FORMAT};
use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Write;

pub const MATRIX_COLUMNS: [&str; 6] = [
    "system_lt",
    "tank_lt",
    "inflow_lt",
    "outflow_lt",
    "difference_lt",
    "error_margin_pct",
];

pub const HISTORY_COLUMNS: [&str; 11] = [
    "id",
    "date",
    "responsible",
    "system_lt",
    "tank_lt",
    "inflow_lt",
    "outflow_lt",
    "difference_lt",
    "error_margin_pct",
    "note",
    "created_at",
];

// ============================================================================
// MATRIX ROW
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MatrixRow {
    pub system_lt: f64,
    pub tank_lt: f64,
    pub inflow_lt: f64,
    pub outflow_lt: f64,
    pub difference_lt: f64,
    pub error_margin_pct: f64,
}

impl MatrixRow {
    pub fn from_entry(entry: &DailyEntry) -> Self {
        MatrixRow {
            system_lt: entry.system_quantity_lt,
            tank_lt: entry.tank_quantity_lt,
            inflow_lt: entry.inflow_lt,
            outflow_lt: entry.outflow_lt,
            difference_lt: entry.difference_lt,
            error_margin_pct: entry.error_margin_pct,
        }
    }

    /// Values in MATRIX_COLUMNS order
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.system_lt,
            self.tank_lt,
            self.inflow_lt,
            self.outflow_lt,
            self.difference_lt,
            self.error_margin_pct,
        ]
    }

    pub fn from_array(values: [f64; 6]) -> Self {
        MatrixRow {
            system_lt: values[0],
            tank_lt: values[1],
            inflow_lt: values[2],
            outflow_lt: values[3],
            difference_lt: values[4],
            error_margin_pct: values[5],
        }
    }
}

pub fn matrix_rows(entries: &[DailyEntry]) -> Vec<MatrixRow> {
    entries.iter().map(MatrixRow::from_entry).collect()
}

// ============================================================================
// CSV WRITERS
// ============================================================================

/// Write the numeric matrix: header + one row per entry
pub fn write_matrix_csv<W: Write>(writer: W, entries: &[DailyEntry]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(MATRIX_COLUMNS)?;

    for row in matrix_rows(entries) {
        wtr.write_record(row.to_array().iter().map(|v| v.to_string()))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write every field of every entry. Unparseable dates are written as stored.
pub fn write_history_csv<W: Write>(writer: W, entries: &[DailyEntry]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HISTORY_COLUMNS)?;

    for entry in entries {
        let date = match entry.date {
            Some(d) => d.format(DATE_FORMAT).to_string(),
            None => entry.date_raw.clone(),
        };

        let mut record = vec![entry.id.clone(), date, entry.responsible.clone()];
        record.extend(
            MatrixRow::from_entry(entry)
                .to_array()
                .iter()
                .map(|v| v.to_string()),
        );
        record.push(entry.note.clone().unwrap_or_default());
        record.push(entry.created_at.to_rfc3339());

        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    History,
    Matrix,
}

impl ExportKind {
    pub fn write<W: Write>(&self, writer: W, entries: &[DailyEntry]) -> Result<()> {
        match self {
            ExportKind::History => write_history_csv(writer, entries),
            ExportKind::Matrix => write_matrix_csv(writer, entries),
        }
    }
}

/// Default download name, e.g. `diesel_history_2024-01-02.csv`
pub fn export_file_name(kind: ExportKind, today: NaiveDate) -> String {
    let prefix = match kind {
        ExportKind::History => "diesel_history",
        ExportKind::Matrix => "diesel_matrix",
    };
    format!("{}_{}.csv", prefix, today.format(DATE_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(date_raw: &str, system: f64, tank: f64, note: Option<&str>) -> DailyEntry {
        let rec = crate::calculator::reconcile(system, tank);
        DailyEntry {
            id: format!("id-{}", date_raw),
            date: crate::entry::parse_date(date_raw),
            date_raw: date_raw.to_string(),
            responsible: "Ana".to_string(),
            system_quantity_lt: system,
            tank_quantity_lt: tank,
            inflow_lt: 10.0,
            outflow_lt: 4.5,
            difference_lt: rec.difference_lt,
            error_margin_pct: rec.error_margin_pct,
            note: note.map(str::to_string),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_matrix_row_column_order() {
        let row = MatrixRow::from_entry(&entry("2024-01-02", 95.0, 100.0, None));
        assert_eq!(row.to_array(), [95.0, 100.0, 10.0, 4.5, 5.0, 5.0]);
        assert_eq!(MatrixRow::from_array(row.to_array()), row);
    }

    #[test]
    fn test_matrix_csv_layout() {
        let entries = vec![
            entry("2024-01-01", 95.0, 100.0, None),
            entry("2024-01-02", 110.0, 100.0, None),
        ];

        let mut buf = Vec::new();
        write_matrix_csv(&mut buf, &entries).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(
            lines[0],
            "system_lt,tank_lt,inflow_lt,outflow_lt,difference_lt,error_margin_pct"
        );
        assert_eq!(lines[1], "95,100,10,4.5,5,5");
        assert_eq!(lines[2], "110,100,10,4.5,-10,-10");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_empty_matrix_has_header_only() {
        let mut buf = Vec::new();
        write_matrix_csv(&mut buf, &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_history_csv_keeps_malformed_date_text() {
        let entries = vec![entry("garbage", 95.0, 100.0, Some("tank, north"))];

        let mut buf = Vec::new();
        write_history_csv(&mut buf, &entries).unwrap();

        let mut rdr = csv::Reader::from_reader(buf.as_slice());
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), HISTORY_COLUMNS.to_vec());

        let record = rdr.records().next().unwrap().unwrap();
        assert_eq!(&record[1], "garbage");
        assert_eq!(&record[9], "tank, north");
        assert_eq!(&record[10], "2024-01-02T12:00:00+00:00");
    }

    #[test]
    fn test_export_file_name() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(
            export_file_name(ExportKind::History, today),
            "diesel_history_2024-01-02.csv"
        );
        assert_eq!(
            export_file_name(ExportKind::Matrix, today),
            "diesel_matrix_2024-01-02.csv"
        );
    }
}

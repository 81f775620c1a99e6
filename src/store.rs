use crate::entry::{parse_date, DailyEntry, NewEntry, DATE_FORMAT};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info, warn};

/// Append-only persistence for daily entries.
/// No update or delete path exists.
pub trait RecordStore {
    /// Persist one entry. The store assigns `id` and `created_at`.
    fn append(&self, entry: &NewEntry) -> Result<DailyEntry, StoreError>;

    /// Every stored entry in storage order. Callers sort with `aggregator::sort_entries`.
    fn list_all(&self) -> Result<Vec<DailyEntry>, StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        info!(path = %path.display(), "opened diesel entry store");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Self { conn })
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM diesel_entries", [], |row| row.get(0))?;
        Ok(count)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

pub fn setup_database(conn: &Connection) -> Result<(), StoreError> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS diesel_entries (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_uuid TEXT UNIQUE NOT NULL,
            date TEXT NOT NULL,
            responsible TEXT NOT NULL,
            system_lt REAL NOT NULL,
            tank_lt REAL NOT NULL,
            inflow_lt REAL NOT NULL,
            outflow_lt REAL NOT NULL,
            difference_lt REAL NOT NULL,
            error_margin_pct REAL NOT NULL,
            note TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_diesel_entries_date ON diesel_entries(date)",
        [],
    )?;

    Ok(())
}

impl RecordStore for SqliteStore {
    fn append(&self, entry: &NewEntry) -> Result<DailyEntry, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now();

        // Single INSERT: either the whole row lands or nothing does
        self.conn.execute(
            "INSERT INTO diesel_entries (
                entry_uuid, date, responsible, system_lt, tank_lt, inflow_lt,
                outflow_lt, difference_lt, error_margin_pct, note, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id,
                entry.date().format(DATE_FORMAT).to_string(),
                entry.responsible(),
                entry.system_quantity_lt(),
                entry.tank_quantity_lt(),
                entry.inflow_lt(),
                entry.outflow_lt(),
                entry.difference_lt(),
                entry.error_margin_pct(),
                entry.note(),
                created_at.to_rfc3339(),
            ],
        )?;

        info!(
            id = %id,
            date = %entry.date(),
            difference_lt = entry.difference_lt(),
            error_margin_pct = entry.error_margin_pct(),
            "appended diesel entry"
        );

        Ok(entry.clone().into_entry(id, created_at))
    }

    fn list_all(&self) -> Result<Vec<DailyEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT entry_uuid, date, responsible, system_lt, tank_lt, inflow_lt,
                    outflow_lt, difference_lt, error_margin_pct, note, created_at
             FROM diesel_entries
             ORDER BY seq",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(RawRow {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    responsible: row.get(2)?,
                    system_lt: row.get(3)?,
                    tank_lt: row.get(4)?,
                    inflow_lt: row.get(5)?,
                    outflow_lt: row.get(6)?,
                    difference_lt: row.get(7)?,
                    error_margin_pct: row.get(8)?,
                    note: row.get(9)?,
                    created_at: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let entries = rows
            .into_iter()
            .map(RawRow::into_entry)
            .collect::<Result<Vec<_>, _>>()?;

        let malformed = entries.iter().filter(|e| !e.has_valid_date()).count();
        if malformed > 0 {
            warn!(malformed, "stored entries with unparseable dates");
        }
        debug!(count = entries.len(), "loaded diesel entries");

        Ok(entries)
    }
}

struct RawRow {
    id: String,
    date: String,
    responsible: String,
    system_lt: f64,
    tank_lt: f64,
    inflow_lt: f64,
    outflow_lt: f64,
    difference_lt: f64,
    error_margin_pct: f64,
    note: Option<String>,
    created_at: String,
}

impl RawRow {
    fn into_entry(self) -> Result<DailyEntry, StoreError> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|_| StoreError::Timestamp(self.created_at.clone()))?
            .with_timezone(&Utc);

        Ok(DailyEntry {
            id: self.id,
            date: parse_date(&self.date),
            date_raw: self.date,
            responsible: self.responsible,
            system_quantity_lt: self.system_lt,
            tank_quantity_lt: self.tank_lt,
            inflow_lt: self.inflow_lt,
            outflow_lt: self.outflow_lt,
            difference_lt: self.difference_lt,
            error_margin_pct: self.error_margin_pct,
            note: self.note,
            created_at,
        })
    }
}

use crate::calculator::{reconcile, validate_quantity};
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Date format used for storage and export
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw operator input, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryInput {
    pub date: String,
    pub responsible: String,
    pub system_quantity_lt: f64,
    pub tank_quantity_lt: f64,
    #[serde(default)]
    pub inflow_lt: f64,
    #[serde(default)]
    pub outflow_lt: f64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Validated entry fields, ready to append.
/// Derived fields come from the calculator and cannot be set by hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEntry {
    date: NaiveDate,
    responsible: String,
    system_quantity_lt: f64,
    tank_quantity_lt: f64,
    inflow_lt: f64,
    outflow_lt: f64,
    difference_lt: f64,
    error_margin_pct: f64,
    note: Option<String>,
}

impl NewEntry {
    pub fn from_input(input: &EntryInput) -> Result<Self> {
        let date = parse_date(&input.date)
            .ok_or_else(|| Error::invalid("date", format!("'{}' is not a YYYY-MM-DD date", input.date)))?;

        let responsible = input.responsible.trim();
        if responsible.is_empty() {
            return Err(Error::invalid("responsible", "must not be empty"));
        }

        let system_quantity_lt = validate_quantity("system_quantity_lt", input.system_quantity_lt)?;
        let tank_quantity_lt = validate_quantity("tank_quantity_lt", input.tank_quantity_lt)?;
        let inflow_lt = validate_quantity("inflow_lt", input.inflow_lt)?;
        let outflow_lt = validate_quantity("outflow_lt", input.outflow_lt)?;

        let rec = reconcile(system_quantity_lt, tank_quantity_lt);
        if !rec.difference_lt.is_finite() || !rec.error_margin_pct.is_finite() {
            return Err(Error::invalid(
                "tank_quantity_lt",
                format!(
                    "error margin for system {} lt against tank {} lt is out of range",
                    system_quantity_lt, tank_quantity_lt
                ),
            ));
        }

        Ok(NewEntry {
            date,
            responsible: responsible.to_string(),
            system_quantity_lt,
            tank_quantity_lt,
            inflow_lt,
            outflow_lt,
            difference_lt: rec.difference_lt,
            error_margin_pct: rec.error_margin_pct,
            note: normalize_note(input.note.as_deref()),
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn responsible(&self) -> &str {
        &self.responsible
    }

    pub fn system_quantity_lt(&self) -> f64 {
        self.system_quantity_lt
    }

    pub fn tank_quantity_lt(&self) -> f64 {
        self.tank_quantity_lt
    }

    pub fn inflow_lt(&self) -> f64 {
        self.inflow_lt
    }

    pub fn outflow_lt(&self) -> f64 {
        self.outflow_lt
    }

    pub fn difference_lt(&self) -> f64 {
        self.difference_lt
    }

    pub fn error_margin_pct(&self) -> f64 {
        self.error_margin_pct
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// Attach store-assigned identity and creation time
    pub fn into_entry(self, id: String, created_at: DateTime<Utc>) -> DailyEntry {
        DailyEntry {
            id,
            date_raw: self.date.format(DATE_FORMAT).to_string(),
            date: Some(self.date),
            responsible: self.responsible,
            system_quantity_lt: self.system_quantity_lt,
            tank_quantity_lt: self.tank_quantity_lt,
            inflow_lt: self.inflow_lt,
            outflow_lt: self.outflow_lt,
            difference_lt: self.difference_lt,
            error_margin_pct: self.error_margin_pct,
            note: self.note,
            created_at,
        }
    }
}

/// One stored daily reconciliation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEntry {
    /// Store-assigned identity (UUID)
    pub id: String,

    /// Parsed date. None when the stored text is not a valid date
    pub date: Option<NaiveDate>,

    /// Date exactly as stored
    pub date_raw: String,

    pub responsible: String,
    pub system_quantity_lt: f64,
    pub tank_quantity_lt: f64,
    pub inflow_lt: f64,
    pub outflow_lt: f64,
    pub difference_lt: f64,
    pub error_margin_pct: f64,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// When the store accepted the entry
    pub created_at: DateTime<Utc>,
}

impl DailyEntry {
    pub fn has_valid_date(&self) -> bool {
        self.date.is_some()
    }
}

/// Timestamp shapes accepted in place of a bare date
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO date, tolerating surrounding whitespace and a trailing time part.
/// The time part must itself be valid; anything else yields None.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        return Some(date);
    }

    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
    {
        return Some(dt.date());
    }

    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.date_naive())
}

fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(system: f64, tank: f64) -> EntryInput {
        EntryInput {
            date: "2024-01-02".to_string(),
            responsible: "Marta".to_string(),
            system_quantity_lt: system,
            tank_quantity_lt: tank,
            inflow_lt: 20.0,
            outflow_lt: 15.0,
            note: Some("  pump checked  ".to_string()),
        }
    }

    #[test]
    fn test_new_entry_derives_fields() {
        let entry = NewEntry::from_input(&input(95.0, 100.0)).unwrap();

        assert_eq!(entry.date(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(entry.difference_lt(), 5.0);
        assert_eq!(entry.error_margin_pct(), 5.0);
        assert_eq!(entry.note(), Some("pump checked"));
    }

    #[test]
    fn test_new_entry_rejects_negative_quantity() {
        let err = NewEntry::from_input(&input(-1.0, 100.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { ref field, .. } if field == "system_quantity_lt"));

        let mut bad = input(1.0, 100.0);
        bad.outflow_lt = -3.0;
        let err = NewEntry::from_input(&bad).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { ref field, .. } if field == "outflow_lt"));
    }

    #[test]
    fn test_new_entry_rejects_bad_date_and_blank_responsible() {
        let mut bad = input(1.0, 1.0);
        bad.date = "02/01/2024".to_string();
        assert!(NewEntry::from_input(&bad).unwrap_err().is_invalid_input());

        let mut bad = input(1.0, 1.0);
        bad.responsible = "   ".to_string();
        assert!(NewEntry::from_input(&bad).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_new_entry_rejects_overflowing_margin() {
        let err = NewEntry::from_input(&input(1e10, 1e-300)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { ref field, .. } if field == "tank_quantity_lt"));
    }

    #[test]
    fn test_blank_note_becomes_none() {
        let mut i = input(1.0, 1.0);
        i.note = Some("   ".to_string());
        assert_eq!(NewEntry::from_input(&i).unwrap().note(), None);
    }

    #[test]
    fn test_parse_date_tolerates_time_suffix() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9);
        assert_eq!(parse_date("2024-03-09"), expected);
        assert_eq!(parse_date("2024-03-09T00:00:00"), expected);
        assert_eq!(parse_date(" 2024-03-09 00:00:00"), expected);
        assert_eq!(parse_date("2024-03-09T13:45:10.250"), expected);
        assert_eq!(parse_date("2024-03-09 08:30"), expected);
        assert_eq!(parse_date("2024-03-09T23:30:00-03:00"), expected);
        assert_eq!(parse_date("2024-03-09T12:00:00Z"), expected);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_date_rejects_broken_suffix() {
        assert_eq!(parse_date("2024-01-02 garbage"), None);
        assert_eq!(parse_date("2024-01-02T99:99:99"), None);
        assert_eq!(parse_date("2024-01-02Tnonsense"), None);
        assert_eq!(parse_date("2024-01-02 "), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(parse_date("2024-02-30"), None);
    }

    #[test]
    fn test_new_entry_rejects_date_with_trailing_text() {
        let mut bad = input(1.0, 1.0);
        bad.date = "2024-01-02 whatever".to_string();
        let err = NewEntry::from_input(&bad).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { ref field, .. } if field == "date"));
    }

    #[test]
    fn test_into_entry_keeps_date_text() {
        let created = Utc::now();
        let entry = NewEntry::from_input(&input(95.0, 100.0))
            .unwrap()
            .into_entry("abc".to_string(), created);

        assert_eq!(entry.id, "abc");
        assert_eq!(entry.date_raw, "2024-01-02");
        assert!(entry.has_valid_date());
        assert_eq!(entry.created_at, created);
    }
}

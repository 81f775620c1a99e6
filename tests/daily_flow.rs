// End-to-end: record entries, reload, split today/prior, indicators, report, export

use chrono::NaiveDate;
use diesel_control::{
    annotate, export_file_name, indicators, latest_report, load_sorted, malformed,
    partition_by_today, record_entry, write_matrix_csv, EntryInput, EntryStatus, Error,
    ExportKind, RecordStore, Scope, SqliteStore, DEFAULT_WINDOW,
};

fn input(date: &str, system: f64, tank: f64) -> EntryInput {
    EntryInput {
        date: date.to_string(),
        responsible: "Shift A".to_string(),
        system_quantity_lt: system,
        tank_quantity_lt: tank,
        inflow_lt: 200.0,
        outflow_lt: 150.0,
        note: None,
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

#[test]
fn test_full_daily_flow() {
    let store = SqliteStore::open_in_memory().unwrap();

    // Inserted out of date order on purpose
    record_entry(&store, &input("2024-01-02", 110.0, 100.0)).unwrap();
    record_entry(&store, &input("2024-01-01", 95.0, 100.0)).unwrap();
    record_entry(&store, &input("2024-01-02", 50.0, 0.0)).unwrap();

    let all = load_sorted(&store).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].date, NaiveDate::from_ymd_opt(2024, 1, 1));
    assert_eq!(all[1].error_margin_pct, -10.0);
    assert_eq!(all[2].error_margin_pct, 0.0);
    assert!(malformed(&all).is_empty());

    let partition = partition_by_today(&all, today());
    assert_eq!(partition.today.len(), 2);
    assert_eq!(partition.prior.len(), 1);

    let ind = indicators(&partition.today, DEFAULT_WINDOW);
    assert_eq!(ind.latest_margin_pct, Some(0.0));
    assert_eq!(ind.moving_average_margin_pct, Some(-5.0));
    assert_eq!(ind.max_absolute_deviation_pct, Some(10.0));
    assert_eq!(ind.cumulative_balance_lt, Some(-60.0));

    let statuses: Vec<EntryStatus> = annotate(&partition.today, 5.0)
        .into_iter()
        .map(|(_, s)| s)
        .collect();
    assert_eq!(statuses, vec![EntryStatus::OutOfLimit, EntryStatus::Ok]);

    let report = latest_report(&partition.today).unwrap();
    assert_eq!(
        report,
        "Good afternoon, diesel control: we have a surplus of -50.00 lt with a margin of error of +0.00%."
    );

    let mut csv = Vec::new();
    write_matrix_csv(&mut csv, &Scope::History.select(&all, today())).unwrap();
    assert_eq!(
        String::from_utf8(csv).unwrap(),
        "system_lt,tank_lt,inflow_lt,outflow_lt,difference_lt,error_margin_pct\n95,100,200,150,5,5\n"
    );
    assert_eq!(
        export_file_name(ExportKind::Matrix, today()),
        "diesel_matrix_2024-01-02.csv"
    );
}

#[test]
fn test_invalid_input_never_reaches_store() {
    let store = SqliteStore::open_in_memory().unwrap();

    let err = record_entry(&store, &input("2024-01-02", 95.0, -1.0)).unwrap_err();
    assert!(matches!(err, Error::InvalidInput { ref field, .. } if field == "tank_quantity_lt"));

    let err = record_entry(&store, &input("2024-01-02", f64::NAN, 1.0)).unwrap_err();
    assert!(err.is_invalid_input());

    assert!(store.list_all().unwrap().is_empty());
}

#[test]
fn test_scope_selection() {
    let store = SqliteStore::open_in_memory().unwrap();
    record_entry(&store, &input("2023-12-31", 1.0, 1.0)).unwrap();
    record_entry(&store, &input("2024-01-02", 1.0, 1.0)).unwrap();
    record_entry(&store, &input("2024-01-03", 1.0, 1.0)).unwrap();

    let all = store.list_all().unwrap();
    assert_eq!(Scope::All.select(&all, today()).len(), 3);
    assert_eq!(Scope::Today.select(&all, today()).len(), 1);
    assert_eq!(Scope::History.select(&all, today()).len(), 1);
}

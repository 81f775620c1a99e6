// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::info;

use diesel_control::{
    annotate, describe, export_file_name, indicators, latest_report, load_sorted, malformed,
    record_entry, Config, EntryInput, ExportKind, Scope, SqliteStore, DEFAULT_WINDOW,
};

#[derive(Parser)]
#[command(author, version, about = "Daily diesel tank vs system reconciliation.")]
struct Cli {
    /// SQLite database file (overrides DIESEL_DATABASE_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Alert threshold in percent (overrides DIESEL_ALERT_THRESHOLD_PCT)
    #[arg(long, global = true)]
    threshold: Option<f64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Record today's (or a given day's) measurements.
    Add(AddArgs),
    /// List entries with their status.
    List(ScopeArgs),
    /// Show the indicators panel.
    Indicators(ScopeArgs),
    /// Print the standard report for the latest entry of today.
    Report,
    /// Descriptive statistics for prior days.
    Summary(ScopeArgs),
    /// Export entries to CSV.
    Export(ExportArgs),
    /// Open the terminal dashboard (default).
    Ui,
}

#[derive(Args)]
struct AddArgs {
    /// Entry date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    responsible: String,
    /// Quantity reported by the system (lt)
    #[arg(long)]
    system: f64,
    /// Quantity measured in the tank (lt)
    #[arg(long)]
    tank: f64,
    #[arg(long, default_value_t = 0.0)]
    inflow: f64,
    #[arg(long, default_value_t = 0.0)]
    outflow: f64,
    #[arg(long)]
    note: Option<String>,
}

#[derive(Args)]
struct ScopeArgs {
    #[arg(long, value_enum, default_value_t = ScopeArg::Today)]
    scope: ScopeArg,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long, value_enum, default_value_t = KindArg::History)]
    kind: KindArg,
    #[arg(long, value_enum, default_value_t = ScopeArg::All)]
    scope: ScopeArg,
    /// Output file, `-` for stdout. Defaults to diesel_<kind>_<today>.csv
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Today,
    History,
    All,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Today => Scope::Today,
            ScopeArg::History => Scope::History,
            ScopeArg::All => Scope::All,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    History,
    Matrix,
}

impl From<KindArg> for ExportKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::History => ExportKind::History,
            KindArg::Matrix => ExportKind::Matrix,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diesel_control=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(threshold) = cli.threshold {
        config = config.with_threshold(threshold)?;
    }
    if let Some(db) = cli.db {
        config = config.with_database_path(db);
    }

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    let today = Local::now().date_naive();

    match cli.command.unwrap_or(Command::Ui) {
        Command::Add(args) => run_add(&store, &config, args, today),
        Command::List(args) => run_list(&store, &config, args.scope.into(), today),
        Command::Indicators(args) => run_indicators(&store, args.scope.into(), today),
        Command::Report => run_report(&store, today),
        Command::Summary(args) => run_summary(&store, args.scope.into(), today),
        Command::Export(args) => run_export(&store, args, today),
        Command::Ui => run_ui_mode(&store, &config, today),
    }
}

fn run_add(store: &SqliteStore, config: &Config, args: AddArgs, today: NaiveDate) -> Result<()> {
    let input = EntryInput {
        date: args.date.unwrap_or_else(|| today.to_string()),
        responsible: args.responsible,
        system_quantity_lt: args.system,
        tank_quantity_lt: args.tank,
        inflow_lt: args.inflow,
        outflow_lt: args.outflow,
        note: args.note,
    };

    let entry = record_entry(store, &input)?;
    let status = diesel_control::EntryStatus::for_entry(&entry, config.alert_threshold_pct);

    println!("✅ Entry saved ({})", entry.id);
    println!("   Difference:   {:.2} lt", entry.difference_lt);
    println!("   Error margin: {:.2}%", entry.error_margin_pct);
    println!("   Status:       {}", status.label());

    Ok(())
}

fn run_list(store: &SqliteStore, config: &Config, scope: Scope, today: NaiveDate) -> Result<()> {
    let all = load_sorted(store)?;
    let entries = scope.select(&all, today);

    if entries.is_empty() {
        println!("No entries to show.");
    } else {
        println!(
            "{:<12} {:<16} {:>10} {:>10} {:>10} {:>10} {:>10} {:>9}  Status",
            "Date", "Responsible", "System", "Tank", "Inflow", "Outflow", "Diff", "Margin%"
        );
        for (entry, status) in annotate(&entries, config.alert_threshold_pct) {
            println!(
                "{:<12} {:<16} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>9.2}  {}",
                entry.date_raw,
                truncate(&entry.responsible, 16),
                entry.system_quantity_lt,
                entry.tank_quantity_lt,
                entry.inflow_lt,
                entry.outflow_lt,
                entry.difference_lt,
                entry.error_margin_pct,
                status.label()
            );
        }
    }

    let bad = malformed(&all);
    if !bad.is_empty() {
        println!("\n⚠️  {} stored entries have an unreadable date:", bad.len());
        for entry in bad {
            println!("   {} (date: {:?})", entry.id, entry.date_raw);
        }
    }

    Ok(())
}

fn run_indicators(store: &SqliteStore, scope: Scope, today: NaiveDate) -> Result<()> {
    let entries = scope.select(&load_sorted(store)?, today);
    let ind = indicators(&entries, DEFAULT_WINDOW);

    println!("📌 Indicators ({} entries)", ind.entry_count);
    println!("   Error margin (latest):  {}", pct(ind.latest_margin_pct));
    println!("   Average of last {}:      {}", DEFAULT_WINDOW, pct(ind.moving_average_margin_pct));
    println!("   Max deviation:          {}", pct(ind.max_absolute_deviation_pct));
    println!(
        "   Cumulative balance:     {}",
        ind.cumulative_balance_lt
            .map(|v| format!("{:.2} lt", v))
            .unwrap_or_else(|| "no data".to_string())
    );

    Ok(())
}

fn run_report(store: &SqliteStore, today: NaiveDate) -> Result<()> {
    let entries = Scope::Today.select(&load_sorted(store)?, today);

    match latest_report(&entries) {
        Some(text) => println!("{}", text),
        None => println!("No entry for today yet. Use `add` to record one."),
    }

    Ok(())
}

fn run_summary(store: &SqliteStore, scope: Scope, today: NaiveDate) -> Result<()> {
    let entries = scope.select(&load_sorted(store)?, today);
    let summary = describe(&entries);

    if summary.is_empty() {
        println!("No entries to summarize.");
        return Ok(());
    }

    println!(
        "{:<18} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Column", "Count", "Mean", "Std", "Min", "25%", "50%", "75%", "Max"
    );
    for col in summary {
        println!(
            "{:<18} {:>6} {:>10.2} {:>10} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
            col.column,
            col.count,
            col.mean,
            col.std.map(|s| format!("{:.2}", s)).unwrap_or_else(|| "-".to_string()),
            col.min,
            col.p25,
            col.median,
            col.p75,
            col.max
        );
    }

    Ok(())
}

fn run_export(store: &SqliteStore, args: ExportArgs, today: NaiveDate) -> Result<()> {
    let kind: ExportKind = args.kind.into();
    let scope: Scope = args.scope.into();
    let entries = scope.select(&load_sorted(store)?, today);

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(export_file_name(kind, today)));

    if output.as_os_str() == "-" {
        kind.write(io::stdout().lock(), &entries)?;
        return Ok(());
    }

    let file = File::create(&output).with_context(|| format!("Failed to create {:?}", output))?;
    kind.write(file, &entries)?;

    info!(path = %output.display(), rows = entries.len(), "exported CSV");
    println!("💾 Exported {} rows to {}", entries.len(), output.display());

    Ok(())
}

fn pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v))
        .unwrap_or_else(|| "no data".to_string())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{}...", cut)
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(store: &SqliteStore, config: &Config, today: NaiveDate) -> Result<()> {
    let entries = load_sorted(store)?;

    let mut app = ui::App::new(entries, config.alert_threshold_pct, today);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_store: &SqliteStore, _config: &Config, _today: NaiveDate) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin diesel-server --features server");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_formats_or_says_no_data() {
        assert_eq!(pct(Some(4.987)), "4.99%");
        assert_eq!(pct(Some(-12.0)), "-12.00%");
        assert_eq!(pct(None), "no data");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("Marta", 14), "Marta");
        assert_eq!(truncate("Joao Conceicao da Silva", 14), "Joao Concei...");
        assert_eq!(truncate("Conceição", 8), "Conce...");
    }
}

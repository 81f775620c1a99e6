use anyhow::Result;
use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use diesel_control::{
    annotate, column_sums, describe, indicators, latest_report, malformed, partition_by_today,
    DailyEntry, EntryStatus, Indicators, DEFAULT_WINDOW,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph,
        Row, Table, TableState, Wrap,
    },
    Frame, Terminal,
};
use std::io;

use crate::{pct, truncate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Today,
    PriorDays,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Today => Page::PriorDays,
            Page::PriorDays => Page::Today,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Today => "Today",
            Page::PriorDays => "Prior Days",
        }
    }
}

pub struct App {
    pub today_entries: Vec<DailyEntry>,
    pub prior_entries: Vec<DailyEntry>,
    pub malformed_count: usize,
    pub threshold_pct: f64,
    pub today: NaiveDate,
    pub current_page: Page,
    pub state: TableState,
    pub show_detail: bool,
}

impl App {
    /// `entries` must already be in display order
    pub fn new(entries: Vec<DailyEntry>, threshold_pct: f64, today: NaiveDate) -> Self {
        let partition = partition_by_today(&entries, today);

        let mut app = Self {
            today_entries: partition.today,
            prior_entries: partition.prior,
            malformed_count: malformed(&entries).len(),
            threshold_pct,
            today,
            current_page: Page::Today,
            state: TableState::default(),
            show_detail: false,
        };
        app.reset_selection();
        app
    }

    pub fn visible(&self) -> &[DailyEntry] {
        match self.current_page {
            Page::Today => &self.today_entries,
            Page::PriorDays => &self.prior_entries,
        }
    }

    pub fn selected_entry(&self) -> Option<&DailyEntry> {
        self.state.selected().and_then(|i| self.visible().get(i))
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.reset_selection();
    }

    fn reset_selection(&mut self) {
        if self.visible().is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(self.visible().len() - 1));
        }
    }

    pub fn next(&mut self) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn indicators(&self) -> Indicators {
        indicators(self.visible(), DEFAULT_WINDOW)
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab | KeyCode::BackTab => app.next_page(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Home => {
                    if !app.visible().is_empty() {
                        app.state.select(Some(0));
                    }
                }
                KeyCode::End => {
                    if !app.visible().is_empty() {
                        app.state.select(Some(app.visible().len() - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),       // Header with tabs
            Constraint::Percentage(45),  // Table + side panel
            Constraint::Min(8),          // Charts
            Constraint::Length(3),       // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(chunks[1]);

    render_table(f, middle[0], app);
    if app.show_detail {
        render_detail_panel(f, middle[1], app);
    } else {
        render_side_panel(f, middle[1], app);
    }

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[2]);

    render_margin_chart(f, charts[0], app);
    render_flow_chart(f, charts[1], app);

    render_status_bar(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![];
    for (i, page) in [Page::Today, Page::PriorDays].iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title().to_string(), style));
    }

    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("Date: {}", app.today),
        Style::default().fg(Color::White),
    ));
    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("Alert limit: {:.1}%", app.threshold_pct),
        Style::default().fg(Color::Cyan),
    ));

    if app.malformed_count > 0 {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("⚠ {} entries with unreadable date", app.malformed_count),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Diesel Control "),
    );

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Date", "Responsible", "System", "Tank", "In", "Out", "Diff", "Margin%", "Status"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = annotate(app.visible(), app.threshold_pct)
        .into_iter()
        .map(|(entry, status)| {
            let color = match status {
                EntryStatus::Ok => Color::Green,
                EntryStatus::OutOfLimit => Color::Red,
            };

            Row::new(vec![
                Cell::from(entry.date_raw.clone()),
                Cell::from(truncate(&entry.responsible, 14)),
                Cell::from(format!("{:.2}", entry.system_quantity_lt)),
                Cell::from(format!("{:.2}", entry.tank_quantity_lt)),
                Cell::from(format!("{:.2}", entry.inflow_lt)),
                Cell::from(format!("{:.2}", entry.outflow_lt)),
                Cell::from(format!("{:.2}", entry.difference_lt)),
                Cell::from(format!("{:.2}", entry.error_margin_pct)).style(Style::default().fg(color)),
                Cell::from(status.label()).style(Style::default().fg(color)),
            ])
            .height(1)
        })
        .collect();

    let title = format!(
        " {} - {} rows × 6 columns ",
        app.current_page.title(),
        app.visible().len()
    );

    let table = Table::new(
        rows,
        [
            Constraint::Length(11),
            Constraint::Length(15),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(8),
            Constraint::Length(16),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_side_panel(f: &mut Frame, area: Rect, app: &App) {
    let ind = app.indicators();
    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let mut content = vec![
        Line::from(Span::styled(
            "  INDICATORS",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
        Line::from(vec![Span::styled("  Margin (latest):   ", label), Span::raw(pct(ind.latest_margin_pct))]),
        Line::from(vec![
            Span::styled(format!("  Avg last {}:        ", DEFAULT_WINDOW), label),
            Span::raw(pct(ind.moving_average_margin_pct)),
        ]),
        Line::from(vec![Span::styled("  Max deviation:     ", label), Span::raw(pct(ind.max_absolute_deviation_pct))]),
        Line::from(vec![
            Span::styled("  Cumulative:        ", label),
            Span::raw(
                ind.cumulative_balance_lt
                    .map(|v| format!("{:.2} lt", v))
                    .unwrap_or_else(|| "no data".to_string()),
            ),
        ]),
        Line::from(""),
    ];

    if let Some(sums) = column_sums(app.visible()) {
        content.push(Line::from(Span::styled(
            "  Σ PER COLUMN",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )));
        content.push(Line::from(format!(
            "  sys {:.2} | tank {:.2} | in {:.2} | out {:.2}",
            sums.system_lt, sums.tank_lt, sums.inflow_lt, sums.outflow_lt
        )));
        content.push(Line::from(format!(
            "  diff {:.2} | margin {:.2}",
            sums.difference_lt, sums.error_margin_pct
        )));
        content.push(Line::from(""));
    }

    match app.current_page {
        Page::Today => {
            content.push(Line::from(Span::styled(
                "  REPORT",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )));
            let text = latest_report(app.visible())
                .unwrap_or_else(|| "No entry for today yet.".to_string());
            content.push(Line::from(format!("  {}", text)));
        }
        Page::PriorDays => {
            content.push(Line::from(Span::styled(
                "  SUMMARY (mean / min / max)",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )));
            for col in describe(app.visible()) {
                content.push(Line::from(format!(
                    "  {:<16} {:>9.2} {:>9.2} {:>9.2}",
                    col.column, col.mean, col.min, col.max
                )));
            }
        }
    }

    let panel = Paragraph::new(content).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Panel "),
    );

    f.render_widget(panel, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Entry Details ");

    let entry = match app.selected_entry() {
        Some(e) => e,
        None => {
            f.render_widget(Paragraph::new("No entry selected").block(block), area);
            return;
        }
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let content = vec![
        Line::from(vec![Span::styled("  Date: ", label), Span::raw(entry.date_raw.clone())]),
        Line::from(vec![Span::styled("  Responsible: ", label), Span::raw(entry.responsible.clone())]),
        Line::from(vec![
            Span::styled("  System / Tank: ", label),
            Span::raw(format!("{:.2} / {:.2} lt", entry.system_quantity_lt, entry.tank_quantity_lt)),
        ]),
        Line::from(vec![
            Span::styled("  In / Out: ", label),
            Span::raw(format!("{:.2} / {:.2} lt", entry.inflow_lt, entry.outflow_lt)),
        ]),
        Line::from(vec![
            Span::styled("  Difference: ", label),
            Span::styled(
                format!("{:.2} lt", entry.difference_lt),
                Style::default().fg(if entry.difference_lt < 0.0 { Color::Red } else { Color::Green }),
            ),
        ]),
        Line::from(vec![
            Span::styled("  Margin: ", label),
            Span::raw(format!("{:.2}%", entry.error_margin_pct)),
        ]),
        Line::from(vec![Span::styled("  Created: ", label), Span::raw(entry.created_at.to_rfc3339())]),
        Line::from(vec![Span::styled("  Id: ", label), Span::raw(entry.id.clone())]),
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", entry.note.as_deref().unwrap_or("(no note)")),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    f.render_widget(Paragraph::new(content).wrap(Wrap { trim: false }).block(block), area);
}

fn render_margin_chart(f: &mut Frame, area: Rect, app: &App) {
    let points: Vec<(f64, f64)> = app
        .visible()
        .iter()
        .enumerate()
        .map(|(i, e)| (i as f64, e.error_margin_pct))
        .collect();

    let x_max = (points.len().max(2) - 1) as f64;
    let limit_hi = vec![(0.0, app.threshold_pct), (x_max, app.threshold_pct)];
    let limit_lo = vec![(0.0, -app.threshold_pct), (x_max, -app.threshold_pct)];

    let max_abs = points
        .iter()
        .map(|(_, y)| y.abs())
        .fold(app.threshold_pct, f64::max)
        .max(1.0);

    let datasets = vec![
        Dataset::default()
            .name("margin %")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Yellow))
            .data(&points),
        Dataset::default()
            .name("limit")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&limit_hi),
        Dataset::default()
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&limit_lo),
    ];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Error Margin Trend (%) "),
        )
        .x_axis(Axis::default().style(Style::default().fg(Color::DarkGray)).bounds([0.0, x_max]))
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([-max_abs, max_abs])
                .labels(vec![
                    Span::raw(format!("{:.1}", -max_abs)),
                    Span::raw("0"),
                    Span::raw(format!("{:.1}", max_abs)),
                ]),
        );

    f.render_widget(chart, area);
}

fn render_flow_chart(f: &mut Frame, area: Rect, app: &App) {
    let mut chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Inflow (green) / Outflow (red) lt "),
        )
        .bar_width(3)
        .bar_gap(0)
        .group_gap(2);

    // Most recent entries that fit
    let fit = (area.width.saturating_sub(2) / 8).max(1) as usize;
    let visible = app.visible();
    let start = visible.len().saturating_sub(fit);

    for entry in &visible[start..] {
        let label = entry
            .date
            .map(|d| d.format("%m-%d").to_string())
            .unwrap_or_else(|| "?".to_string());

        let bars = [
            Bar::default()
                .value(entry.inflow_lt.round() as u64)
                .style(Style::default().fg(Color::Green)),
            Bar::default()
                .value(entry.outflow_lt.round() as u64)
                .style(Style::default().fg(Color::Red)),
        ];

        chart = chart.data(BarGroup::default().label(Line::from(label)).bars(&bars));
    }

    f.render_widget(chart, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.visible().len();

    let spans = vec![
        Span::styled(format!(" Row: {}/{} ", selected, total), Style::default().fg(Color::Cyan)),
        Span::raw(" | "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Details | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Today/Prior | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel_control::{EntryInput, NewEntry};
    use chrono::Utc;

    fn entry(date: &str, system: f64, tank: f64) -> DailyEntry {
        NewEntry::from_input(&EntryInput {
            date: date.to_string(),
            responsible: "Op".to_string(),
            system_quantity_lt: system,
            tank_quantity_lt: tank,
            inflow_lt: 1.0,
            outflow_lt: 2.0,
            note: None,
        })
        .unwrap()
        .into_entry(format!("{}-{}", date, system), Utc::now())
    }

    #[test]
    fn test_app_splits_pages_and_selects_latest() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let entries = vec![
            entry("2024-01-01", 95.0, 100.0),
            entry("2024-01-02", 110.0, 100.0),
            entry("2024-01-02", 99.0, 100.0),
        ];

        let mut app = App::new(entries, 5.0, today);
        assert_eq!(app.visible().len(), 2);
        assert_eq!(app.state.selected(), Some(1));
        assert_eq!(app.indicators().latest_margin_pct, Some(1.0));

        app.next_page();
        assert_eq!(app.current_page, Page::PriorDays);
        assert_eq!(app.visible().len(), 1);
        assert_eq!(app.selected_entry().unwrap().error_margin_pct, 5.0);
    }

    #[test]
    fn test_navigation_wraps() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let entries = vec![entry("2024-01-02", 1.0, 1.0), entry("2024-01-02", 2.0, 2.0)];

        let mut app = App::new(entries, 5.0, today);
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        app.previous();
        assert_eq!(app.state.selected(), Some(1));
    }

    #[test]
    fn test_empty_app_has_no_selection() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut app = App::new(vec![], 5.0, today);
        assert_eq!(app.state.selected(), None);
        app.next();
        assert_eq!(app.state.selected(), None);
        assert_eq!(app.indicators().entry_count, 0);
    }
}

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use fact_dashboard::{DashboardReport, SeriesPoint};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

/// Number of histogram buckets on the distribution page
const HISTOGRAM_BINS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Distribution,
    Regions,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Overview, Page::Distribution, Page::Regions];

    pub fn next(&self) -> Self {
        match self {
            Page::Overview => Page::Distribution,
            Page::Distribution => Page::Regions,
            Page::Regions => Page::Overview,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Overview => Page::Regions,
            Page::Distribution => Page::Overview,
            Page::Regions => Page::Distribution,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Overview => "Overview",
            Page::Distribution => "Distribution",
            Page::Regions => "Regions",
        }
    }
}

pub struct App {
    pub report: DashboardReport,
    pub current_page: Page,
    pub region_state: TableState,
}

impl App {
    pub fn new(report: DashboardReport) -> Self {
        let mut region_state = TableState::default();
        if !report.regions.is_empty() {
            region_state.select(Some(0));
        }

        Self {
            report,
            current_page: Page::Overview,
            region_state,
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn next(&mut self) {
        let len = self.report.regions.len();
        if len == 0 {
            return;
        }
        let i = match self.region_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.region_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.report.regions.len();
        if len == 0 {
            return;
        }
        let i = match self.region_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.region_state.select(Some(i));
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
    let restored = disable_raw_mode()
        .and_then(|_| execute!(terminal.backend_mut(), LeaveAlternateScreen))
        .and_then(|_| terminal.show_cursor());

    finish_session(res, restored)
}

/// Loop errors win over restore errors; both are reported
fn finish_session(res: io::Result<()>, restored: io::Result<()>) -> Result<()> {
    if let Err(err) = &restored {
        log::error!("Failed to restore terminal: {}", err);
    }
    res.context("UI loop failed")?;
    restored.context("Failed to restore terminal")?;
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
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Overview => render_overview(f, chunks[1], app),
        Page::Distribution => render_distribution(f, chunks[1], app),
        Page::Regions => render_regions(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Transactions: {}", app.report.kpis.count),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

/// Format with thousands separators and two decimals; NaN shows as n/a
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }

    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

fn render_kpi_tile(f: &mut Frame, area: Rect, title: &str, value: String) {
    let tile = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            value,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" {title} ")),
    );
    f.render_widget(tile, area);
}

/// Bar labels and heights; negative totals draw as empty bars
fn bars<K: ToString>(series: &[SeriesPoint<K>]) -> Vec<(String, u64)> {
    series
        .iter()
        .map(|p| (p.key.to_string(), p.amount.max(0.0).round() as u64))
        .collect()
}

fn render_bar_chart(f: &mut Frame, area: Rect, title: &str, data: &[(String, u64)]) {
    let data: Vec<(&str, u64)> = data.iter().map(|(l, v)| (l.as_str(), *v)).collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {title} ")),
        )
        .data(data.as_slice())
        .bar_width(7)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));

    f.render_widget(chart, area);
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    let tiles = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25); 4])
        .split(rows[0]);

    let kpis = &app.report.kpis;
    render_kpi_tile(f, tiles[0], "Total amount", format_amount(kpis.total_amount));
    render_kpi_tile(f, tiles[1], "Mean amount", format_amount(kpis.mean_amount));
    render_kpi_tile(f, tiles[2], "Total fee", format_amount(kpis.total_fee));
    render_kpi_tile(f, tiles[3], "Transactions", kpis.count.to_string());

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    render_bar_chart(f, charts[0], "Amount by year", &bars(&app.report.yearly));
    render_bar_chart(
        f,
        charts[1],
        &format!("Amount by month ({})", app.report.selected_year),
        &bars(&app.report.monthly),
    );
}

/// Equal-width histogram over the raw amounts
pub fn histogram(values: &[f64], bins: usize) -> Vec<(String, u64)> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (max - min) / bins as f64;

    let mut counts = vec![0u64; bins];
    for v in &finite {
        let idx = if width == 0.0 {
            0
        } else {
            (((v - min) / width) as usize).min(bins - 1)
        };
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| (format!("{:.0}", min + width * i as f64), count))
        .collect()
}

fn render_distribution(f: &mut Frame, area: Rect, app: &App) {
    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let total: f64 = app.report.types.iter().map(|p| p.amount).sum();
    let mut lines = vec![Line::from("")];
    for point in &app.report.types {
        let share = if total != 0.0 { point.amount / total * 100.0 } else { 0.0 };
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {:<12}", point.key),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("{:>16}", format_amount(point.amount))),
            Span::styled(format!("  {:>5.1}%", share), Style::default().fg(Color::Yellow)),
        ]));
    }

    let types = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Amount by transaction type "),
    );
    f.render_widget(types, charts[0]);

    render_bar_chart(
        f,
        charts[1],
        "Transaction amount histogram",
        &histogram(&app.report.amounts, HISTOGRAM_BINS),
    );
}

fn render_regions(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Region", "Sum", "Mean", "Count", "Trend"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.report.regions.iter().map(|row| {
        let cells = vec![
            Cell::from(row.region_name.clone()),
            Cell::from(format_amount(row.sum)),
            Cell::from(format_amount(row.mean)),
            Cell::from(row.count.to_string()),
            Cell::from(row.sparkline.clone()).style(Style::default().fg(Color::Green)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(24),
            Constraint::Length(18),
            Constraint::Length(14),
            Constraint::Length(10),
            Constraint::Length(22),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Regional analysis with trends "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.region_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![Span::styled(
        format!(" {} ", app.current_page.title()),
        Style::default().fg(Color::Cyan),
    )];

    if app.current_page == Page::Regions {
        let selected = app.region_state.selected().map(|i| i + 1).unwrap_or(0);
        status_spans.push(Span::raw(format!("| Row: {}/{} ", selected, app.report.regions.len())));
    }

    status_spans.push(Span::raw("| "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

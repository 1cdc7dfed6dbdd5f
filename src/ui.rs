use banking_workshop::dashboard::{self, DashboardData};
use banking_workshop::Transaction;
use anyhow::Result;
use chrono::{DateTime, Local, TimeZone};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Sparkline, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

const AUTO_REFRESH: Duration = Duration::from_secs(5);
const PAGE_JUMP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Transactions,
    Categories,
    Spending,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Transactions => Page::Categories,
            Page::Categories => Page::Spending,
            Page::Spending => Page::Transactions,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Transactions => Page::Spending,
            Page::Categories => Page::Transactions,
            Page::Spending => Page::Categories,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Transactions => "Transactions",
            Page::Categories => "Spending Categories",
            Page::Spending => "Track Spending",
        }
    }

    /// Processor module that unlocks this page
    pub fn module_hint(&self) -> &str {
        match self {
            Page::Transactions => "store_transaction + ordered_transactions (JSON + List)",
            Page::Categories => "spending_categories (Sorted Sets)",
            Page::Spending => "spending_over_time (TimeSeries)",
        }
    }
}

pub struct App {
    pub data: DashboardData,
    pub current_page: Page,
    pub transactions_state: TableState,
    pub categories_state: TableState,
    pub show_detail: bool,
    pub last_error: Option<String>,
    pub refreshed_at: DateTime<Local>,
}

impl App {
    pub fn new(data: DashboardData) -> Self {
        let mut app = Self {
            data: DashboardData::default(),
            current_page: Page::Transactions,
            transactions_state: TableState::default(),
            categories_state: TableState::default(),
            show_detail: false,
            last_error: None,
            refreshed_at: Local::now(),
        };
        app.apply_data(data);
        app
    }

    /// Swap in fresh data, keeping selections inside the new bounds
    pub fn apply_data(&mut self, data: DashboardData) {
        self.data = data;
        self.last_error = None;
        self.refreshed_at = Local::now();

        clamp_selection(&mut self.transactions_state, self.data.transactions.len());
        clamp_selection(&mut self.categories_state, self.data.categories.len());
    }

    pub fn is_unlocked(&self, page: Page) -> bool {
        let status = &self.data.status;
        match page {
            Page::Transactions => status.transactions_unlocked,
            Page::Categories => status.categories_unlocked,
            Page::Spending => status.timeseries_unlocked,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_transaction(&self) -> Option<&Transaction> {
        self.transactions_state
            .selected()
            .and_then(|i| self.data.transactions.get(i))
    }

    pub fn selected_category(&self) -> Option<&str> {
        self.categories_state
            .selected()
            .and_then(|i| self.data.categories.get(i))
            .map(|(name, _)| name.as_str())
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    /// List the cursor keys act on, with its length
    fn active_list(&mut self) -> Option<(&mut TableState, usize)> {
        match self.current_page {
            Page::Transactions => Some((&mut self.transactions_state, self.data.transactions.len())),
            Page::Categories => Some((&mut self.categories_state, self.data.categories.len())),
            Page::Spending => None,
        }
    }

    pub fn next(&mut self) {
        if let Some((state, len)) = self.active_list() {
            if len == 0 {
                return;
            }
            let i = match state.selected() {
                Some(i) if i + 1 < len => i + 1,
                _ => 0,
            };
            state.select(Some(i));
        }
    }

    pub fn previous(&mut self) {
        if let Some((state, len)) = self.active_list() {
            if len == 0 {
                return;
            }
            let i = match state.selected() {
                Some(0) | None => len - 1,
                Some(i) => i - 1,
            };
            state.select(Some(i));
        }
    }

    pub fn page_down(&mut self) {
        if let Some((state, len)) = self.active_list() {
            if len == 0 {
                return;
            }
            let i = state.selected().map_or(0, |i| (i + PAGE_JUMP).min(len - 1));
            state.select(Some(i));
        }
    }

    pub fn page_up(&mut self) {
        if let Some((state, len)) = self.active_list() {
            if len == 0 {
                return;
            }
            let i = state.selected().map_or(0, |i| i.saturating_sub(PAGE_JUMP));
            state.select(Some(i));
        }
    }

    pub fn first(&mut self) {
        if let Some((state, len)) = self.active_list() {
            if len > 0 {
                state.select(Some(0));
            }
        }
    }

    pub fn last(&mut self) {
        if let Some((state, len)) = self.active_list() {
            if len > 0 {
                state.select(Some(len - 1));
            }
        }
    }
}

fn clamp_selection(state: &mut TableState, len: usize) {
    match (state.selected(), len) {
        (_, 0) => state.select(None),
        (None, _) => state.select(Some(0)),
        (Some(i), len) if i >= len => state.select(Some(len - 1)),
        _ => {}
    }
}

/// Run the dashboard; `refresh` reloads data from Redis on `r` and every few seconds
pub fn run_ui<F>(app: &mut App, refresh: F) -> Result<()>
where
    F: FnMut() -> Result<DashboardData>,
{
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app, refresh);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B, F>(terminal: &mut Terminal<B>, app: &mut App, mut refresh: F) -> Result<()>
where
    B: ratatui::backend::Backend,
    F: FnMut() -> Result<DashboardData>,
{
    let mut last_refresh = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let mut wants_refresh = last_refresh.elapsed() >= AUTO_REFRESH;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('r') => wants_refresh = true,
                    KeyCode::Enter => app.toggle_detail(),
                    KeyCode::Tab => app.next_page(),
                    KeyCode::BackTab => app.previous_page(),
                    KeyCode::Char('1') => app.current_page = Page::Transactions,
                    KeyCode::Char('2') => app.current_page = Page::Categories,
                    KeyCode::Char('3') => app.current_page = Page::Spending,
                    KeyCode::Down | KeyCode::Char('j') => app.next(),
                    KeyCode::Up | KeyCode::Char('k') => app.previous(),
                    KeyCode::PageDown => app.page_down(),
                    KeyCode::PageUp => app.page_up(),
                    KeyCode::Home => app.first(),
                    KeyCode::End => app.last(),
                    _ => {}
                }
            }
        }

        if wants_refresh {
            match refresh() {
                Ok(data) => app.apply_data(data),
                Err(e) => app.last_error = Some(format!("{e:#}")),
            }
            last_refresh = Instant::now();
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

    if !app.is_unlocked(app.current_page) {
        render_locked(f, chunks[1], app.current_page);
    } else {
        match app.current_page {
            Page::Transactions if app.show_detail => {
                let content_chunks = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([
                        Constraint::Percentage(60), // Transaction list
                        Constraint::Percentage(40), // Detail panel
                    ])
                    .split(chunks[1]);

                render_transactions(f, content_chunks[0], app);
                render_detail_panel(f, content_chunks[1], app);
            }
            Page::Transactions => render_transactions(f, chunks[1], app),
            Page::Categories => render_categories(f, chunks[1], app),
            Page::Spending => render_spending(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Transactions, Page::Categories, Page::Spending];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let lock = if app.is_unlocked(*page) { "" } else { "🔒 " };
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(format!("{lock}{}", page.title()), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Stream: {}", app.data.stream_length),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        if app.data.status.search_unlocked {
            "Search ✓"
        } else {
            "Search ✗"
        },
        Style::default().fg(if app.data.status.search_unlocked {
            Color::Green
        } else {
            Color::DarkGray
        }),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Banking Workshop "),
    );

    f.render_widget(header, area);
}

fn render_locked(f: &mut Frame, area: Rect, page: Page) {
    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  🔒 {} is locked", page.title()),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::raw("  Complete "),
            Span::styled(page.module_hint(), Style::default().fg(Color::Cyan)),
            Span::raw(" and run the processor."),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  This page unlocks by itself once data shows up in Redis.",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    let panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(format!(" {} ", page.title())),
    );

    f.render_widget(panel, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    Row::new(cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn render_transactions(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.data.transactions.iter().map(|tx| {
        let cells = vec![
            Cell::from(format_timestamp(tx.timestamp)),
            Cell::from(truncate(tx.merchant_or_unknown(), 24)),
            Cell::from(truncate(tx.category.as_deref().unwrap_or("-"), 16)),
            Cell::from(format!("{:>10.2}", tx.amount)).style(Style::default().fg(Color::Red)),
            Cell::from(truncate(tx.location.as_deref().unwrap_or("-"), 20)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(20),
            Constraint::Length(26),
            Constraint::Length(18),
            Constraint::Length(12),
            Constraint::Length(22),
        ],
    )
    .header(header_row(&["Time", "Merchant", "Category", "Amount", "Location"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Recent Transactions "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.transactions_state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let label = |name: &'static str| Span::styled(format!("{name:<12}"), Style::default().fg(Color::Yellow));
    let value = |v: Option<&str>| Span::raw(v.unwrap_or("-").to_string());

    let content = match app.selected_transaction() {
        Some(tx) => vec![
            Line::from(vec![label("ID"), Span::raw(tx.transaction_id.clone())]),
            Line::from(vec![label("Time"), Span::raw(format_timestamp(tx.timestamp))]),
            Line::from(vec![
                label("Amount"),
                Span::styled(format!("{:.2}", tx.amount), Style::default().fg(Color::Red)),
            ]),
            Line::from(vec![label("Merchant"), value(tx.merchant.as_deref())]),
            Line::from(vec![label("Category"), value(tx.category.as_deref())]),
            Line::from(vec![label("Location"), value(tx.location.as_deref())]),
            Line::from(vec![label("Customer"), value(tx.customer_id.as_deref())]),
            Line::from(vec![
                label("Card"),
                Span::raw(format!("•••• {}", tx.card_last4.as_deref().unwrap_or("????"))),
            ]),
        ],
        None => vec![Line::from("No transaction selected")],
    };

    let panel = Paragraph::new(content).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Details "),
    );

    f.render_widget(panel, area);
}

fn render_categories(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let rows = app.data.categories.iter().map(|(category, total)| {
        Row::new(vec![
            Cell::from(truncate(category, 24)),
            Cell::from(format!("{total:>12.2}")).style(Style::default().fg(Color::Green)),
        ])
        .height(1)
    });

    let table = Table::new(rows, [Constraint::Length(26), Constraint::Length(14)])
        .header(header_row(&["Category", "Total Spent"]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" Top Categories ({:.2}) ", app.data.total_spent())),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[0], &mut app.categories_state);

    let selected = app.selected_category().unwrap_or_default().to_string();
    let merchant_rows = app.data.merchants_for(&selected).iter().map(|(merchant, amount)| {
        Row::new(vec![
            Cell::from(truncate(merchant, 28)),
            Cell::from(format!("{amount:>12.2}")),
        ])
        .height(1)
    });

    let merchants = Table::new(merchant_rows, [Constraint::Length(30), Constraint::Length(14)])
        .header(header_row(&["Merchant", "Total Spent"]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" Top Merchants: {selected} ")),
        );

    f.render_widget(merchants, chunks[1]);
}

fn render_spending(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(4)])
        .split(area);

    let points = dashboard::sparkline_points(&app.data.spending);

    let sparkline = Sparkline::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Spending per minute, last hour "),
        )
        .data(&points)
        .style(Style::default().fg(Color::Green));

    f.render_widget(sparkline, chunks[0]);

    let total: f64 = app.data.spending.iter().map(|(_, amount)| amount).sum();
    let peak = app
        .data
        .spending
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(ts, amount)| format!("{amount:.2} at {}", format_timestamp(*ts)))
        .unwrap_or_else(|| "-".to_string());

    let summary = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Total  ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("{total:.2} over {} buckets", app.data.spending.len())),
        ]),
        Line::from(vec![
            Span::styled("Peak   ", Style::default().fg(Color::Yellow)),
            Span::raw(peak),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(summary, chunks[1]);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![Span::styled(
        format!(" Updated {} ", app.refreshed_at.format("%H:%M:%S")),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(err) = &app.last_error {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Refresh failed: {}", truncate(err, 60)),
            Style::default().fg(Color::Red),
        ));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Details | "));
    status_spans.push(Span::styled("r", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Refresh | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) if millis > 0 => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => "-".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banking_workshop::UnlockStatus;

    fn tx(id: &str) -> Transaction {
        serde_json::from_value(serde_json::json!({ "transactionId": id, "amount": 1.0 })).unwrap()
    }

    fn data_with(transactions: usize, categories: usize) -> DashboardData {
        DashboardData {
            status: UnlockStatus {
                transactions_unlocked: true,
                categories_unlocked: true,
                ..Default::default()
            },
            transactions: (0..transactions).map(|i| tx(&format!("TXN-{i}"))).collect(),
            categories: (0..categories)
                .map(|i| (format!("cat-{i}"), 10.0 * i as f64))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_page_cycle() {
        assert_eq!(Page::Transactions.next(), Page::Categories);
        assert_eq!(Page::Spending.next(), Page::Transactions);
        assert_eq!(Page::Transactions.previous(), Page::Spending);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = App::new(data_with(3, 0));
        assert_eq!(app.selected_transaction().unwrap().transaction_id, "TXN-0");

        app.previous();
        assert_eq!(app.transactions_state.selected(), Some(2));
        app.next();
        assert_eq!(app.transactions_state.selected(), Some(0));
    }

    #[test]
    fn test_page_jumps_clamp() {
        let mut app = App::new(data_with(30, 0));

        app.page_down();
        assert_eq!(app.transactions_state.selected(), Some(20));
        app.page_down();
        assert_eq!(app.transactions_state.selected(), Some(29));
        app.page_up();
        assert_eq!(app.transactions_state.selected(), Some(9));
        app.page_up();
        assert_eq!(app.transactions_state.selected(), Some(0));
    }

    #[test]
    fn test_navigation_follows_page() {
        let mut app = App::new(data_with(5, 4));
        app.next_page();
        app.last();

        assert_eq!(app.selected_category(), Some("cat-3"));
        assert_eq!(app.transactions_state.selected(), Some(0));
    }

    #[test]
    fn test_refresh_clamps_selection() {
        let mut app = App::new(data_with(10, 2));
        app.last();
        assert_eq!(app.transactions_state.selected(), Some(9));

        app.apply_data(data_with(4, 0));
        assert_eq!(app.transactions_state.selected(), Some(3));
        assert_eq!(app.categories_state.selected(), None);
    }

    #[test]
    fn test_locked_pages() {
        let app = App::new(data_with(1, 1));
        assert!(app.is_unlocked(Page::Transactions));
        assert!(app.is_unlocked(Page::Categories));
        assert!(!app.is_unlocked(Page::Spending));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("Starbucks", 20), "Starbucks");
        assert_eq!(truncate("Café Délicieux Très Long", 10), "Café Dé...");
    }

    #[test]
    fn test_format_timestamp_unknown() {
        assert_eq!(format_timestamp(0), "-");
        assert_ne!(format_timestamp(1_700_000_000_000), "-");
    }
}

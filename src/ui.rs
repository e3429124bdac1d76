use std::io::{stdout, Stdout};
use std::sync::Arc;

use chrono::Utc;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::{Block, BorderType, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, Wrap},
};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::actions::ActionDispatcher;
use crate::app::{App, AppEvent, Command, LogView, MenuState, ViewMode};
use crate::config::Config;
use crate::format::{display_rows, progress_bar, truncate_or_pad, DisplayRow, RowKind};
use crate::runtime::ContainerRuntime;
use crate::stats::StatsAggregator;

pub const TITLE: &str = "dpm - Docker Project Manager";

const TREE_HELP: &str = "↑↓/PgUp/PgDn:navigate  ←→:collapse/expand  space:toggle  enter:menu  q:quit";
const MENU_HELP: &str = "↑↓:select  enter:execute  esc:back";
const LOGS_HELP: &str = "↑↓/PgUp/PgDn/g/G:scroll  q/esc:back";

const NAME_WIDTH: u16 = 40;
const STATUS_WIDTH: u16 = 25;
const PERCENT_WIDTH: u16 = 13;
const NET_WIDTH: u16 = 14;
const UPTIME_WIDTH: u16 = 12;
const BAR_CELLS: usize = 5;

const ACCENT: Color = Color::Cyan;
const MUTED: Color = Color::DarkGray;
const SELECTED_BG: Color = Color::Rgb(68, 71, 90);

type Term = Terminal<CrosstermBackend<Stdout>>;

/// Run the interactive dashboard until the operator quits.
pub async fn run(runtime: Arc<dyn ContainerRuntime>, config: &Config) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, runtime, config).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(terminal: &mut Term, runtime: Arc<dyn ContainerRuntime>, config: &Config) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
    let aggregator = Arc::new(StatsAggregator::new(Arc::clone(&runtime), config.sample_timeout()));
    let dispatcher = ActionDispatcher::new(runtime, tx.clone(), config.log_tail_lines);

    let mut app = App::new(terminal.size()?.height);
    let mut events = EventStream::new();
    // First tick fires immediately, which performs the initial load.
    let mut ticker = tokio::time::interval(config.refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(refresh_ms = config.refresh_interval_ms, show_all = config.show_all, "dashboard started");

    loop {
        terminal.draw(|f| draw(f, &app))?;

        let event = tokio::select! {
            _ = ticker.tick() => AppEvent::Tick,
            Some(event) = rx.recv() => event,
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
                Some(Ok(Event::Resize(width, height))) => AppEvent::Resize { width, height },
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
        };

        for command in app.update(event) {
            match command {
                Command::FetchContainers => spawn_fetch(&aggregator, config.show_all, &tx),
                Command::RunAction(action) => {
                    dispatcher.dispatch(action);
                }
                Command::FetchLogs(target) => {
                    dispatcher.fetch_logs(target);
                }
                Command::Quit => {
                    info!("quit requested");
                    return Ok(());
                }
            }
        }
    }
}

/// Refreshes are not serialized: a slow fetch may land after a newer one.
fn spawn_fetch(aggregator: &Arc<StatsAggregator>, all: bool, events: &UnboundedSender<AppEvent>) {
    let aggregator = Arc::clone(aggregator);
    let events = events.clone();
    tokio::spawn(async move {
        let result = aggregator.refresh(all).await;
        if let Ok(records) = &result {
            debug!(count = records.len(), "refresh complete");
        }
        let _ = events.send(AppEvent::Containers(result));
    });
}

fn draw(f: &mut Frame, app: &App) {
    let area = f.size();
    match app.mode() {
        ViewMode::Logs => {
            if let Some(logs) = &app.logs {
                draw_logs(f, logs, app.log_height(), area);
            }
        }
        ViewMode::Menu => {
            draw_dashboard(f, app, area);
            if let Some(menu) = &app.menu {
                draw_menu(f, menu, area);
            }
        }
        ViewMode::Tree => match &app.error {
            Some(message) => draw_error(f, message, area),
            None => draw_dashboard(f, app, area),
        },
    }
}

fn title_line(text: &str) -> Paragraph<'_> {
    Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
    )))
}

fn draw_dashboard(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // title + blank
            Constraint::Length(1), // header
            Constraint::Min(1),    // rows
            Constraint::Length(1),
            Constraint::Length(1), // footer
        ])
        .split(area);

    f.render_widget(title_line(TITLE), chunks[0]);

    let widths = [
        Constraint::Length(NAME_WIDTH),
        Constraint::Length(STATUS_WIDTH),
        Constraint::Length(PERCENT_WIDTH),
        Constraint::Length(PERCENT_WIDTH),
        Constraint::Length(NET_WIDTH),
        Constraint::Length(UPTIME_WIDTH),
    ];
    let header = Table::new(Vec::<Row>::new())
        .header(
            Row::new(["NAME", "STATUS", "CPU %", "MEM %", "NET RX/TX", "UPTIME"])
                .style(Style::default().fg(MUTED).add_modifier(Modifier::BOLD)),
        )
        .widths(&widths);
    f.render_widget(header, chunks[1]);

    let len = app.tree.len();
    if len == 0 {
        f.render_widget(Paragraph::new("No containers found"), chunks[2]);
    } else {
        let range = app.viewport.visible_range(len);
        let rows: Vec<Row> = display_rows(&app.tree, range, Utc::now())
            .iter()
            .map(tree_row)
            .collect();
        f.render_widget(Table::new(rows).widths(&widths), chunks[2]);
    }

    f.render_widget(Paragraph::new(footer_line(app)), chunks[4]);
}

fn tree_row(row: &DisplayRow) -> Row<'static> {
    let base = if row.selected {
        Style::default().bg(SELECTED_BG).fg(Color::White)
    } else {
        Style::default()
    };
    let label = truncate_or_pad(&row.label(), usize::from(NAME_WIDTH));

    match &row.kind {
        RowKind::Project { .. } => Row::new(vec![Cell::from(label)])
            .style(base.fg(ACCENT).add_modifier(Modifier::BOLD)),
        RowKind::Container {
            status,
            running,
            cpu_percent,
            mem_percent,
            net_io,
            uptime,
        } => {
            let status_style = if *running {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Red)
            };
            Row::new(vec![
                Cell::from(label),
                Cell::from(truncate_or_pad(status, usize::from(STATUS_WIDTH))).style(status_style),
                Cell::from(percent_cell(*cpu_percent)),
                Cell::from(percent_cell(*mem_percent)),
                Cell::from(net_io.clone()),
                Cell::from(uptime.clone()),
            ])
            .style(base)
        }
    }
}

fn percent_cell(percent: f64) -> String {
    format!("{:5.1}% {}", percent, progress_bar(percent, BAR_CELLS))
}

fn footer_line(app: &App) -> Line<'static> {
    let mut spans = Vec::new();
    let len = app.tree.len();
    if app.viewport.overflows(len) {
        let range = app.viewport.visible_range(len);
        spans.push(Span::styled(
            format!("[{}-{} of {}] ", app.viewport.top() + 1, range.end, len),
            Style::default().fg(MUTED),
        ));
    }
    spans.push(Span::styled(TREE_HELP, Style::default().fg(MUTED)));
    if let Some(note) = &app.status_note {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(note.clone(), Style::default().fg(Color::Yellow)));
    }
    Line::from(spans)
}

fn draw_error(f: &mut Frame, message: &str, area: Rect) {
    let text = vec![
        Line::from(Span::styled(
            format!("Error: {message}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled("Retrying on the next refresh.  q:quit", Style::default().fg(MUTED))),
    ];
    f.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), area);
}

fn draw_menu(f: &mut Frame, menu: &MenuState, area: Rect) {
    let width = (menu.title.chars().count() as u16 + 8)
        .max(MENU_HELP.chars().count() as u16 + 6)
        .min(area.width);
    let height = (menu.items.len() as u16 + 6).min(area.height);
    let dialog_area = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };

    f.render_widget(Clear, dialog_area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(ACCENT))
        .title(Span::styled(
            format!(" {} ", menu.title),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(dialog_area);
    f.render_widget(block, dialog_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let items: Vec<ListItem> = menu
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if i == menu.selected {
                ListItem::new(format!("> {}", item.label))
                    .style(Style::default().fg(Color::Black).bg(ACCENT).add_modifier(Modifier::BOLD))
            } else {
                ListItem::new(format!("  {}", item.label))
            }
        })
        .collect();
    f.render_widget(List::new(items), chunks[0]);
    f.render_widget(
        Paragraph::new(Span::styled(MENU_HELP, Style::default().fg(MUTED))),
        chunks[1],
    );
}

fn draw_logs(f: &mut Frame, logs: &LogView, height: usize, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    f.render_widget(title_line(&format!("{TITLE} - Logs: {}", logs.name)), chunks[0]);

    let range = logs.visible_range(height);
    let lines: Vec<Line> = logs.lines[range.clone()]
        .iter()
        .map(|l| Line::from(l.as_str()))
        .collect();
    f.render_widget(Paragraph::new(lines), chunks[1]);

    let position = if logs.lines.is_empty() {
        "No log output".to_string()
    } else {
        format!("Lines {}-{} of {}", range.start + 1, range.end, logs.lines.len())
    };
    let footer = Line::from(vec![
        Span::styled(position, Style::default().fg(MUTED)),
        Span::raw("  "),
        Span::styled(LOGS_HELP, Style::default().fg(MUTED)),
    ]);
    f.render_widget(Paragraph::new(footer), chunks[3]);
}

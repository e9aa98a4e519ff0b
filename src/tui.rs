use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    symbols::Marker,
    text::Line,
    widgets::{
        Axis, BarChart, Block, Borders, Cell, Chart, Clear, Dataset, GraphType, Paragraph, Row,
        Table, Wrap,
    },
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::chart_views::{HistogramRow, histogram_bins};
use crate::controller::{Controller, Phase, Ticket};
use crate::convert::format_date_label;
use crate::data_service::DataService;
use crate::error::ApiError;
use crate::models::{ChartData, ChartDataRequest, Coin};
use crate::transport::Transport;

const HISTOGRAM_BINS: usize = 8;

// --- Async plumbing ---

enum FetchOutcome {
    Coins(Ticket, Result<Vec<Coin>, ApiError>),
    Chart(Ticket, Result<ChartData, ApiError>),
    Export(Ticket, Result<PathBuf, ApiError>),
}

fn apply_outcome(controller: &mut Controller, outcome: FetchOutcome) {
    match outcome {
        FetchOutcome::Coins(ticket, result) => controller.apply_coins(ticket, result),
        FetchOutcome::Chart(ticket, result) => controller.apply_chart_data(ticket, result),
        FetchOutcome::Export(ticket, result) => controller.apply_export(ticket, result),
    };
}

fn spawn_coins<T: Transport + 'static>(
    service: &Arc<DataService<T>>,
    ticket: Ticket,
    token: CancelToken,
    tx: &mpsc::Sender<FetchOutcome>,
) {
    let service = Arc::clone(service);
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = service.get_coins(&token).await;
        let _ = tx.send(FetchOutcome::Coins(ticket, result)).await;
    });
}

fn spawn_chart<T: Transport + 'static>(
    service: &Arc<DataService<T>>,
    (ticket, request, token): (Ticket, ChartDataRequest, CancelToken),
    tx: &mpsc::Sender<FetchOutcome>,
) {
    let service = Arc::clone(service);
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = service.get_chart_data(&request, &token).await;
        let _ = tx.send(FetchOutcome::Chart(ticket, result)).await;
    });
}

fn spawn_export<T: Transport + 'static>(
    service: &Arc<DataService<T>>,
    (ticket, request, token): (Ticket, ChartDataRequest, CancelToken),
    tx: &mpsc::Sender<FetchOutcome>,
) {
    let service = Arc::clone(service);
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = service.export_csv(&request, &token).await;
        let _ = tx.send(FetchOutcome::Export(ticket, result)).await;
    });
}

// --- TUI ---

pub async fn run_tui<T: Transport + 'static>(service: Arc<DataService<T>>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, service).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

async fn run_app<B: Backend, T: Transport + 'static>(
    terminal: &mut Terminal<B>,
    service: Arc<DataService<T>>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<FetchOutcome>(16);
    let mut controller = Controller::new(Utc::now().timestamp());

    let (ticket, token) = controller.begin_load_coins();
    spawn_coins(&service, ticket, token, &tx);

    loop {
        controller.set_clock(Utc::now().timestamp());
        terminal.draw(|f| ui(f, &controller))?;

        while let Ok(outcome) = rx.try_recv() {
            apply_outcome(&mut controller, outcome);
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if !handle_key_event(key, &mut controller, &service, &tx) {
                        info!("quitting");
                        controller.shutdown();
                        return Ok(());
                    }
                }
                // The next draw picks up the new size.
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }
}

/// Returns false when the user asked to quit.
fn handle_key_event<T: Transport + 'static>(
    key: KeyEvent,
    controller: &mut Controller,
    service: &Arc<DataService<T>>,
    tx: &mpsc::Sender<FetchOutcome>,
) -> bool {
    // The error dialog is modal.
    if controller.state().error.is_some() {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => controller.dismiss_error(),
            KeyCode::Char('q') => return false,
            _ => {}
        }
        return true;
    }

    match key.code {
        KeyCode::Char('q') => return false,
        KeyCode::Up => controller.select_previous_coin(),
        KeyCode::Down => controller.select_next_coin(),
        KeyCode::Char('[') => controller.shift_start(-1),
        KeyCode::Char(']') => controller.shift_start(1),
        KeyCode::Char('{') => controller.shift_end(-1),
        KeyCode::Char('}') => controller.shift_end(1),
        KeyCode::Enter | KeyCode::F(5) => match controller.begin_fetch() {
            Some(request) => spawn_chart(service, request, tx),
            None => debug!("get data ignored: no coin selected"),
        },
        KeyCode::Char('d') => match controller.begin_export() {
            Some(request) => spawn_export(service, request, tx),
            None => debug!("download ignored: no coin selected"),
        },
        _ => {}
    }
    true
}

fn ui(f: &mut Frame, controller: &Controller) {
    let state = controller.state();
    let main_layout = Layout::horizontal([Constraint::Percentage(18), Constraint::Percentage(82)])
        .split(f.size());

    render_sidebar(f, controller, main_layout[0]);

    let main_chunks =
        Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).split(main_layout[1]);
    render_header(f, controller, main_chunks[0]);

    let coin_name = state.current_coin().map(|c| c.name.as_str()).unwrap_or("");
    if state.prices.is_empty() {
        f.render_widget(
            Paragraph::new("Press Enter to load data")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL)),
            main_chunks[1],
        );
    } else {
        let rows = Layout::vertical([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(main_chunks[1]);
        let halves = |area: Rect| {
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).split(area)
        };

        let top = halves(rows[0]);
        let labels: Vec<&str> = state.prices.iter().map(|p| p.label.as_str()).collect();
        let price_values: Vec<f64> = state.prices.iter().map(|p| p.value).collect();
        let fng_values: Vec<f64> = state.fear_greed.iter().map(|p| p.value).collect();
        let price_title = format!("Prices {}", coin_name);
        let fng_title = format!("Fear & Greed {}", coin_name);
        render_line_chart(f, &price_title, &labels, &price_values, Color::Cyan, top[0]);
        render_line_chart(f, &fng_title, &labels, &fng_values, Color::Yellow, top[1]);

        let middle = halves(rows[1]);
        render_scatter(f, controller, &format!("Scatter {}", coin_name), middle[0]);
        render_stats(f, controller, middle[1]);

        let bottom = halves(rows[2]);
        let price_title = format!("Price histogram {}", coin_name);
        let fng_title = format!("Fear & Greed histogram {}", coin_name);
        render_histogram(f, &price_title, &state.histogram_prices, bottom[0]);
        render_histogram(f, &fng_title, &state.histogram_fear_greed, bottom[1]);
    }

    if controller.is_loading() {
        let area = centered_rect(40, 20, main_layout[1]);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new("Loading...\nPlease wait.")
                .block(Block::default().title("Loading").borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }

    if let Some(reason) = &state.error {
        let area = centered_rect(50, 25, f.size());
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(vec![
                Line::from(reason.clone()),
                Line::from(""),
                Line::from("Esc closes").style(Style::default().fg(Color::DarkGray)),
            ])
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title("Error")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .alignment(Alignment::Center),
            area,
        );
    }
}

fn render_sidebar(f: &mut Frame, controller: &Controller, area: Rect) {
    let state = controller.state();
    let sidebar_block = Block::default()
        .borders(Borders::ALL)
        .title("Coin")
        .title_alignment(Alignment::Center);
    let inner = sidebar_block.inner(area);
    f.render_widget(sidebar_block, area);

    let chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(5)]).split(inner);

    let coin_lines: Vec<Line> = state
        .coins
        .iter()
        .enumerate()
        .map(|(i, coin)| {
            let mut line = Line::from(coin.name.clone());
            if Some(i) == state.current_coin {
                line = line.style(Style::default().fg(Color::Yellow).bg(Color::DarkGray));
            }
            line
        })
        .collect();
    f.render_widget(Paragraph::new(coin_lines), chunks[0]);

    f.render_widget(
        Paragraph::new("Enter get data\nd download CSV\n[ ] start  { } end\nq quit")
            .style(Style::default().fg(Color::DarkGray)),
        chunks[1],
    );
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "Idle",
        Phase::Loading => "Loading",
        Phase::Ready => "Ready",
        Phase::Errored => "Error",
    }
}

fn render_header(f: &mut Frame, controller: &Controller, area: Rect) {
    let range = controller.range();
    let mut title = format!(
        "Status: {}   Start: {}   End: {}",
        phase_label(controller.phase()),
        format_date_label(range.start.saturating_mul(1000)),
        format_date_label(range.end.saturating_mul(1000))
    );
    if controller.is_exporting() {
        title.push_str("   Downloading CSV...");
    } else if let Some(path) = &controller.state().last_export {
        title.push_str(&format!("   Saved {}", path.display()));
    }
    f.render_widget(
        Block::default()
            .borders(Borders::ALL)
            .title_alignment(Alignment::Center)
            .title(title),
        area,
    );
}

// Pads flat series so the line stays visible.
fn bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        [0.0, 1.0]
    } else if min == max {
        [min - 1.0, max + 1.0]
    } else {
        [min, max]
    }
}

fn render_line_chart(
    f: &mut Frame,
    title: &str,
    labels: &[&str],
    values: &[f64],
    color: Color,
    area: Rect,
) {
    let data: Vec<(f64, f64)> = values.iter().enumerate().map(|(i, &v)| (i as f64, v)).collect();
    let [min_y, max_y] = bounds(values.iter().copied());
    let max_x = values.len().saturating_sub(1).max(1) as f64;

    let datasets = vec![
        Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(color))
            .data(&data),
    ];
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, max_x])
                .labels(vec![
                    Span::raw(labels.first().copied().unwrap_or("").to_string()),
                    Span::raw(labels.last().copied().unwrap_or("").to_string()),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([min_y, max_y])
                .labels(vec![
                    Span::raw(format!("{:.1}", min_y)),
                    Span::raw(format!("{:.1}", max_y)),
                ]),
        );
    f.render_widget(chart, area);
}

fn render_scatter(f: &mut Frame, controller: &Controller, title: &str, area: Rect) {
    // Unpaired prices have no y value and are not plotted.
    let data: Vec<(f64, f64)> = controller
        .state()
        .scatter
        .iter()
        .filter_map(|p| p.fear_greed.map(|fng| (p.price, fng)))
        .collect();
    let [min_x, max_x] = bounds(data.iter().map(|(x, _)| *x));

    let datasets = vec![
        Dataset::default()
            .marker(Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Magenta))
            .data(&data),
    ];
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .x_axis(
            Axis::default()
                .title("Price")
                .style(Style::default().fg(Color::Gray))
                .bounds([min_x, max_x])
                .labels(vec![
                    Span::raw(format!("{:.1}", min_x)),
                    Span::raw(format!("{:.1}", max_x)),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("Fear & Greed")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, 100.0])
                .labels(vec![Span::raw("0"), Span::raw("50"), Span::raw("100")]),
        );
    f.render_widget(chart, area);
}

fn render_stats(f: &mut Frame, controller: &Controller, area: Rect) {
    let rows = match controller.state().correlation {
        Some(c) => vec![
            Row::new([Cell::from("Pearson"), Cell::from(format!("{:.4}", c.pearson))]),
            Row::new([Cell::from("P Value"), Cell::from(format!("{}", c.p_value))]),
        ],
        None => Vec::new(),
    };
    f.render_widget(
        Table::new(rows, [Constraint::Length(10), Constraint::Min(10)])
            .block(Block::default().borders(Borders::ALL).title("Correlation")),
        area,
    );
}

fn render_histogram(f: &mut Frame, title: &str, table: &[HistogramRow], area: Rect) {
    let bins = histogram_bins(table, HISTOGRAM_BINS);
    let labels: Vec<String> = bins.iter().map(|b| format!("{:.0}", b.lower)).collect();
    let data: Vec<(&str, u64)> = labels
        .iter()
        .zip(&bins)
        .map(|(label, bin)| (label.as_str(), bin.count))
        .collect();

    let slots = bins.len().max(1) as u16;
    let bar_width = (area.width.saturating_sub(2) / slots).saturating_sub(1).max(1);

    f.render_widget(
        BarChart::default()
            .block(Block::default().borders(Borders::ALL).title(title.to_string()))
            .data(&data[..])
            .bar_width(bar_width)
            .bar_gap(1)
            .bar_style(Style::default().fg(Color::Green))
            .value_style(Style::default().fg(Color::Black).bg(Color::Green)),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_views::histogram_table;
    use ratatui::backend::TestBackend;

    fn screen_text(controller: &Controller) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| ui(f, controller)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn flat_series_get_padded_bounds() {
        assert_eq!(bounds([5.0, 5.0].into_iter()), [4.0, 6.0]);
        assert_eq!(bounds(std::iter::empty()), [0.0, 1.0]);
        assert_eq!(bounds([1.0, 3.0, 2.0].into_iter()), [1.0, 3.0]);
    }

    #[test]
    fn error_dialog_is_rendered() {
        let mut controller = Controller::new(1_700_086_400);
        let (ticket, _) = controller.begin_load_coins();
        let err = ApiError::Status {
            code: 404,
            reason: "Not Found".into(),
        };
        controller.apply_coins(ticket, Err(err));

        let text = screen_text(&controller);
        assert!(text.contains("Not Found"));
        assert!(text.contains("Status: Error"));
    }

    #[test]
    fn header_tracks_phase() {
        let mut controller = Controller::new(1_700_086_400);
        let (ticket, _) = controller.begin_load_coins();
        assert!(screen_text(&controller).contains("Status: Loading"));

        let coin = Coin {
            id: "bitcoin".into(),
            symbol: "btc".into(),
            name: "Bitcoin".into(),
        };
        controller.apply_coins(ticket, Ok(vec![coin]));
        let text = screen_text(&controller);
        assert!(text.contains("Status: Ready"));
        assert!(text.contains("Start: 14-11-23"));
    }

    #[test]
    fn histogram_renders_without_data() {
        let mut terminal = Terminal::new(TestBackend::new(40, 10)).unwrap();
        let table = histogram_table("Price", std::iter::empty());
        terminal
            .draw(|f| render_histogram(f, "Price histogram", &table, f.size()))
            .unwrap();
    }
}

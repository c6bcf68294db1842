//! Drawing of the terminal UI.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use time::macros::format_description;
use crate::app::{App, AppState};
use crate::dispatch::DispatchState;

const TITLE: &str = concat!("Component Fetcher v", env!("CARGO_PKG_VERSION"));

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(2),
            Constraint::Length(1),
        ])
        .split(frame.area());

    match app.state() {
        AppState::Starting => {}
        AppState::SelectingPort { ports, selected, error } => {
            let title = format!("{} - Select serial port ({} baud)", TITLE, app.config().baud_rate);
            draw_port_list(frame, chunks[0], &title, ports, *selected, error.as_deref());
        }
        AppState::Running { port, .. } => draw_queue(frame, chunks[0], app, port),
    }

    draw_status(frame, chunks[1], app);
    draw_keys(frame, chunks[2], app.state());
}

fn draw_port_list(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    ports: &[String],
    selected: usize,
    error: Option<&str>,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(if error.is_some() { 1 } else { 0 })])
        .split(area);

    let block = Block::default().borders(Borders::ALL).title(title);
    if ports.is_empty() {
        let empty = Paragraph::new("No serial ports found. Press F5 to refresh.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, chunks[0]);
    } else {
        let items: Vec<ListItem> = ports.iter().map(|p| ListItem::new(p.as_str())).collect();
        let list = List::new(items)
            .block(block)
            .highlight_symbol("> ")
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = ListState::default().with_selected(Some(selected));
        frame.render_stateful_widget(list, chunks[0], &mut state);
    }

    if let Some(error) = error {
        let error = Paragraph::new(error).style(Style::default().fg(Color::Red));
        frame.render_widget(error, chunks[1]);
    }
}

fn draw_queue(frame: &mut Frame, area: Rect, app: &App, port: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let search = Paragraph::new(Line::from(vec![
        Span::raw(app.input()),
        Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
    ]))
    .block(Block::default().borders(Borders::ALL).title(format!("{} - {}", TITLE, port)));
    frame.render_widget(search, chunks[0]);

    let dispatcher = app.dispatcher();
    let items: Vec<ListItem> = dispatcher
        .queue()
        .iter()
        .map(|target| ListItem::new(target.label()))
        .collect();

    // The cursor stays visible while homed, dimmed instead of highlighted
    let (symbol, style) = match dispatcher.highlighted() {
        Some(_) => (
            "> ",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        None => ("  ", Style::default().add_modifier(Modifier::DIM)),
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!("Queue ({})", dispatcher.queue().len())))
        .highlight_symbol(symbol)
        .highlight_style(style);
    let mut state = ListState::default().with_selected(dispatcher.cursor());
    frame.render_stateful_widget(list, chunks[1], &mut state);
}

fn draw_status(frame: &mut Frame, area: Rect, app: &App) {
    let dispatcher = app.dispatcher();
    let mut sent = vec![Span::raw("Sent: ")];
    match dispatcher.last_command() {
        Some(command) => sent.push(Span::styled(command.to_string(), Style::default().fg(Color::Cyan))),
        None => sent.push(Span::raw("-")),
    }
    if let (DispatchState::Targeting, Some(target)) = (dispatcher.state(), dispatcher.current()) {
        sent.push(Span::raw(format!(" ({})", target.key)));
    }
    let sent = Line::from(sent);

    let status = match app.status() {
        Some(status) => {
            let at = status
                .at
                .format(format_description!("[hour]:[minute]:[second]"))
                .unwrap_or_default();
            let color = if status.is_error { Color::Red } else { Color::Reset };
            Line::from(Span::styled(format!("[{}] {}", at, status.text), Style::default().fg(color)))
        }
        None => Line::from(""),
    };

    frame.render_widget(Paragraph::new(vec![sent, status]), area);
}

fn draw_keys(frame: &mut Frame, area: Rect, state: &AppState) {
    let keys: &[(&str, &str)] = match state {
        AppState::Starting => &[],
        AppState::SelectingPort { .. } => &[("Enter", "Open"), ("F5", "Refresh"), ("Esc", "Quit")],
        AppState::Running { .. } => &[
            ("Enter", "Search"),
            ("^N", "Next"),
            ("^R", "Home"),
            ("Up/Down", "Select"),
            ("Esc", "Exit"),
        ],
    };

    let spans: Vec<Span> = keys
        .iter()
        .flat_map(|(key, action)| {
            [
                Span::styled(format!("[{}]", key), Style::default().fg(Color::Yellow)),
                Span::raw(format!(" {}  ", action)),
            ]
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use fetcher_link::memory::{MemoryDriver, MemoryLink};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use crate::config::Config;
    use crate::table::{LocationTable, RawTable};

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 14)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        terminal.backend().buffer().content.iter().map(|cell| cell.symbol()).collect()
    }

    fn table() -> LocationTable {
        let csv = "L,R,C,X_CM,Y_CM\n1,2,3,10,20\n";
        LocationTable::from_raw(&RawTable::from_csv(csv.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn shows_ports() {
        let driver = MemoryDriver::new(&["/dev/ttyUSB0"], MemoryLink::new());
        let mut app = App::new(Config::default(), table(), &driver);
        app.update(Instant::now());

        let screen = render(&app);

        assert!(screen.contains("/dev/ttyUSB0"));
        assert!(screen.contains("Refresh"));
    }

    #[test]
    fn shows_queue_and_last_command() {
        let driver = MemoryDriver::new(&["sim"], MemoryLink::new());
        let config = Config {
            simulate: true,
            ..Config::default()
        };
        let mut app = App::new(config, table(), &driver);
        app.update(Instant::now());
        app.search("L1R2C3");

        let screen = render(&app);

        assert!(screen.contains("L01-R02-C03"));
        assert!(screen.contains("X:10.00,Y:20.00"));
        assert!(screen.contains("Queued 1 location(s)."));
    }
}

//! The module for the main app state and logic.

use std::time::{Duration, Instant};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, info, warn};
use time::OffsetDateTime;
use fetcher_link::{Link, LinkDriver, LinkError};
use crate::clipboard::ClipboardWatcher;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::table::LocationTable;
use crate::ticker::Ticker;
use crate::utils::SelectionExt;

/// The main app state struct.
pub struct App<'a> {
    /// The configuration for the app.
    config: Config,
    /// The location table searches are resolved against.
    table: LocationTable,
    /// Lists and opens device ports.
    driver: &'a dyn LinkDriver,
    /// The current state of the app.
    state: AppState,
    /// The target queue and what was last sent to the device.
    dispatcher: Dispatcher,
    /// Text typed into the search field.
    input: String,
    /// The latest message for the status line.
    status: Option<Status>,
    /// Schedules the periodic link poll and re-send.
    ticker: Ticker,
    /// Source of clipboard text, if watching the clipboard.
    clipboard: Option<ClipboardWatcher>,

    should_quit: bool,
}

impl <'a> App<'a> {
    /// Creates a new instance of the App.
    pub fn new(config: Config, table: LocationTable, driver: &'a dyn LinkDriver) -> App<'a> {
        let period = Duration::from_millis(config.period_ms);
        App {
            config,
            table,
            driver,
            state: AppState::default(),
            dispatcher: Dispatcher::new(),
            input: String::new(),
            status: None,
            ticker: Ticker::new(period),
            clipboard: None,
            should_quit: false,
        }
    }

    /// Queues location codes copied to the clipboard while the link is open.
    pub fn with_clipboard(mut self, watcher: ClipboardWatcher) -> Self {
        self.clipboard = Some(watcher);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Runs one step of the app: starts up, feeds clipboard text, and ticks the link when due.
    pub fn update(&mut self, now: Instant) {
        if self.should_quit {
            return;
        }
        match self.state {
            AppState::Starting => {
                let ports = self.list_ports();
                if self.config.simulate {
                    if let Some(port) = ports.first().cloned() {
                        info!("Simulation mode, using {}.", port);
                        self.open_port(&port);
                        return;
                    }
                }
                let selected = self
                    .config
                    .last_port
                    .as_ref()
                    .and_then(|last| ports.iter().position(|p| p == last))
                    .unwrap_or(0);
                self.state = AppState::SelectingPort {
                    ports,
                    selected,
                    error: None,
                };
            }
            AppState::SelectingPort { .. } => {}
            AppState::Running { .. } => {
                let texts = self.clipboard.as_ref().map(ClipboardWatcher::drain).unwrap_or_default();
                for text in texts {
                    debug!("Searching clipboard text.");
                    self.search(&text);
                }

                if self.ticker.poll(now) {
                    let result = match &mut self.state {
                        AppState::Running { link, .. } => self.dispatcher.tick(&mut **link),
                        _ => Ok(()),
                    };
                    self.report(result);
                }
            }
        }
    }

    /// Handles a key press from the terminal.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            self.quit();
            return;
        }

        match &mut self.state {
            AppState::Starting => {}
            AppState::SelectingPort { ports, selected, .. } => match key.code {
                KeyCode::Up => *selected = selected.step_within(-1, ports.len()),
                KeyCode::Down => *selected = selected.step_within(1, ports.len()),
                KeyCode::Enter => {
                    if let Some(port) = ports.get(*selected).cloned() {
                        self.open_port(&port);
                    }
                }
                KeyCode::F(5) | KeyCode::Char('r') => self.refresh_ports(),
                KeyCode::Esc | KeyCode::Char('q') => self.quit(),
                _ => {}
            },
            AppState::Running { .. } => match key.code {
                KeyCode::Char('n') if ctrl => self.advance(),
                KeyCode::F(2) => self.advance(),
                KeyCode::Char('r') if ctrl => self.home(),
                KeyCode::F(3) => self.home(),
                KeyCode::Esc => self.quit(),
                KeyCode::Up => self.step_selection(-1),
                KeyCode::Down => self.step_selection(1),
                KeyCode::Enter => {
                    let text = std::mem::take(&mut self.input);
                    self.search(&text);
                }
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Char(c) if !ctrl => self.input.push(c),
                _ => {}
            },
        }
    }

    /// Queues every location code found in `text`.
    pub fn search(&mut self, text: &str) {
        let result = match &mut self.state {
            AppState::Running { link, .. } => self.dispatcher.search(text, &self.table, &mut **link),
            _ => return,
        };
        match result {
            Ok(0) => {}
            Ok(added) => self.set_status(format!("Queued {} location(s).", added), false),
            Err(e) => self.report(Err(e)),
        }
    }

    /// Moves on to the next target, as if the device had asked for it.
    pub fn advance(&mut self) {
        let result = match &mut self.state {
            AppState::Running { link, .. } => self.dispatcher.advance(&mut **link),
            _ => return,
        };
        self.report(result);
    }

    /// Sends the device home.
    pub fn home(&mut self) {
        let result = match &mut self.state {
            AppState::Running { link, .. } => self.dispatcher.home(&mut **link),
            _ => return,
        };
        self.report(result);
    }

    /// Stops the app. The queue is dropped and the link closed.
    pub fn quit(&mut self) {
        info!("Exiting.");
        self.dispatcher.clear();
        self.input.clear();
        self.clipboard = None;
        self.state = AppState::Starting;
        self.should_quit = true;
    }

    fn step_selection(&mut self, delta: isize) {
        if let Some(cursor) = self.dispatcher.cursor() {
            let index = cursor.step_within(delta, self.dispatcher.queue().len());
            self.dispatcher.select(index);
        }
    }

    fn list_ports(&mut self) -> Vec<String> {
        match self.driver.ports() {
            Ok(ports) => {
                debug!("Found ports: {:?}", ports);
                ports
            }
            Err(e) => {
                warn!("{}", e);
                self.set_status(e.to_string(), true);
                Vec::new()
            }
        }
    }

    fn refresh_ports(&mut self) {
        let ports = self.list_ports();
        if let AppState::SelectingPort { ports: current, selected, error } = &mut self.state {
            *selected = (*selected).min(ports.len().saturating_sub(1));
            *current = ports;
            *error = None;
        }
    }

    fn open_port(&mut self, port: &str) {
        match self.driver.open(port) {
            Ok(link) => {
                info!("Connected to {}.", port);
                if !self.config.simulate && self.config.last_port.as_deref() != Some(port) {
                    if let Err(e) = self.config.remember_port(port) {
                        warn!("Failed to remember port: {}", e);
                    }
                }
                self.state = AppState::Running {
                    port: port.to_string(),
                    link,
                };
                self.ticker = Ticker::new(Duration::from_millis(self.config.period_ms));
                self.set_status(format!("Connected to {}.", port), false);
            }
            Err(e) => {
                warn!("{}", e);
                if let AppState::SelectingPort { error, .. } = &mut self.state {
                    *error = Some(e.to_string());
                }
                self.set_status(e.to_string(), true);
            }
        }
    }

    fn report(&mut self, result: Result<(), LinkError>) {
        if let Err(e) = result {
            warn!("Failed to send to device: {}", e);
            self.set_status(format!("Failed to send to device: {}", e), true);
        }
    }

    fn set_status(&mut self, text: String, is_error: bool) {
        self.status = Some(Status {
            at: OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
            text,
            is_error,
        });
    }
}

/// Enum that can represent the different states of the application.
#[derive(Default)]
pub enum AppState {
    /// The initial state of the application, before the ports are listed.
    #[default]
    Starting,
    /// The user is picking the port the device is connected to.
    SelectingPort {
        /// Names of the available ports.
        ports: Vec<String>,
        /// Index of the highlighted port.
        selected: usize,
        /// Why the last attempt to open a port failed.
        error: Option<String>,
    },
    /// The link is open and targets are being sent.
    Running {
        /// Name of the open port.
        port: String,
        link: Box<dyn Link>,
    },
}

/// A message for the status line.
#[derive(Clone, Debug)]
pub struct Status {
    pub at: OffsetDateTime,
    pub text: String,
    pub is_error: bool,
}

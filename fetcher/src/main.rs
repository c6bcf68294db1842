mod app;
mod clipboard;
mod config;
mod dispatch;
mod parser;
mod table;
mod ticker;
mod ui;
mod utils;

use std::env::var;
use std::io;
use std::time::{Duration, Instant};
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use dotenv::dotenv;
use log::{debug, info, warn, LevelFilter};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use fetcher_link::LinkDriver;
use fetcher_link::memory::{MemoryDriver, MemoryLink};
use fetcher_link::serial::SerialDriver;
use crate::app::App;
use crate::clipboard::ClipboardWatcher;
use crate::config::Config;
use crate::table::LocationTable;

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

/// Owns the terminal while the UI runs. Dropping it, also while unwinding from a panic,
/// puts the terminal back into its normal mode.
struct TerminalSession<B: Backend> {
    terminal: Terminal<B>,
    restore: fn(),
}

impl TerminalSession<CrosstermBackend<io::Stdout>> {
    fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            restore_terminal();
            return Err(e);
        }
        match Terminal::new(CrosstermBackend::new(stdout)) {
            Ok(terminal) => Ok(Self {
                terminal,
                restore: restore_terminal,
            }),
            Err(e) => {
                restore_terminal();
                Err(e)
            }
        }
    }
}

impl<B: Backend> Drop for TerminalSession<B> {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        (self.restore)();
    }
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

fn init_logger() -> eyre::Result<()> {
    let log_path = var("FETCHER_LOG_FILE").unwrap_or_else(|_| "component_fetcher.log".to_string());
    let log_file = std::fs::File::create(&log_path)?;

    pretty_env_logger::formatted_builder()
        .filter_module("component_fetcher", LevelFilter::Info)
        .filter_module("fetcher_link", LevelFilter::Info)
        .parse_default_env()
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .try_init()?;
    Ok(())
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    init_logger()?;

    info!("Component Fetcher starting...");

    debug!("Trying to load config...");
    let mut config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    config.apply_env();
    debug!("{:?}", config);

    let table = LocationTable::load(&config.table_path, config.sheet.as_deref())?;
    if table.is_empty() {
        warn!("Location table {} has no usable rows.", config.table_path.display());
    }

    let serial_driver;
    let memory_driver;
    let driver: &dyn LinkDriver = if config.simulate {
        memory_driver = MemoryDriver::new(&["simulated"], MemoryLink::new().with_echo(true));
        &memory_driver
    } else {
        serial_driver = SerialDriver::new(config.baud_rate)
            .with_timeout(Duration::from_millis(config.read_timeout_ms));
        &serial_driver
    };
    debug!("{:?} initialized.", driver);

    let clipboard = config
        .watch_clipboard
        .then(|| ClipboardWatcher::spawn(Duration::from_millis(config.clipboard_poll_ms)));

    let mut app = App::new(config, table, driver);
    if let Some(watcher) = clipboard {
        app = app.with_clipboard(watcher);
    }

    let mut session = TerminalSession::new()?;

    info!("Starting main loop...");
    let result = run(&mut session.terminal, &mut app);

    // Restore the terminal before reporting any error
    drop(session);

    info!("Component Fetcher stopped.");
    result
}

fn run(terminal: &mut Tui, app: &mut App) -> eyre::Result<()> {
    loop {
        terminal.draw(|frame| ui::draw(frame, app))?;

        // Poll input for up to 1/20th of a second
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }
        if app.should_quit() {
            return Ok(());
        }

        app.update(Instant::now());
    }
}

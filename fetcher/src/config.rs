use std::env::var_os;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use dotenv::var;
use log::warn;
use serde::{Serialize, Deserialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// The spreadsheet or CSV file holding the location table.
    pub table_path: PathBuf,
    /// The sheet to read from a workbook. The first sheet is used if unset.
    pub sheet: Option<String>,
    pub baud_rate: u32,
    /// How often the device link is polled and the current command re-sent.
    pub period_ms: u64,
    pub read_timeout_ms: u64,
    /// Whether to queue location codes copied to the clipboard.
    pub watch_clipboard: bool,
    pub clipboard_poll_ms: u64,
    /// The port opened successfully last time, preselected on startup.
    pub last_port: Option<String>,
    /// Sends commands to an in-memory link instead of a serial port.
    #[serde(skip)]
    pub simulate: bool,
    /// The file this config was loaded from and is saved to.
    #[serde(skip)]
    pub file: PathBuf,
}

impl Config {
    fn default_path() -> PathBuf {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("fetcher.json"));
        PathBuf::from(config_str)
    }

    pub fn try_load() -> Option<Self> {
        Self::try_load_from(&Self::default_path())
    }

    pub fn try_load_from(config_path: &Path) -> Option<Self> {
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            match serde_json::from_reader::<_, Self>(reader) {
                Ok(config) => Some(Self {
                    file: config_path.to_path_buf(),
                    ..config
                }),
                Err(e) => {
                    warn!("Ignoring invalid config {}: {}", config_path.display(), e);
                    None
                }
            }
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&self.file)
    }

    pub fn save_to(&self, config_path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Records the last opened port and persists only that field.
    ///
    /// The file is reloaded first, so environment overrides applied to `self` never reach it.
    pub fn remember_port(&mut self, port: &str) -> std::io::Result<()> {
        self.last_port = Some(port.to_string());
        let mut stored = Self::try_load_from(&self.file).unwrap_or_default();
        stored.last_port = self.last_port.clone();
        stored.save_to(&self.file)
    }

    /// Applies `FETCHER_*` overrides from the environment (and `.env`).
    pub fn apply_env(&mut self) {
        if let Ok(path) = var("FETCHER_TABLE") {
            self.table_path = PathBuf::from(path);
        }
        if let Ok(sheet) = var("FETCHER_SHEET") {
            self.sheet = Some(sheet).filter(|s| !s.is_empty());
        }
        if let Ok(baud_rate) = var("FETCHER_BAUD_RATE") {
            match baud_rate.parse() {
                Ok(baud_rate) => self.baud_rate = baud_rate,
                Err(e) => warn!("Ignoring FETCHER_BAUD_RATE={:?}: {}", baud_rate, e),
            }
        }
        if let Ok(watch) = var("FETCHER_WATCH_CLIPBOARD") {
            self.watch_clipboard = is_truthy(&watch);
        }
        if let Ok(simulate) = var("FETCHER_SIMULATE") {
            self.simulate = is_truthy(&simulate);
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            table_path: PathBuf::from("locations.xlsx"),
            sheet: None,
            baud_rate: 115200,
            period_ms: 500,
            read_timeout_ms: 100,
            watch_clipboard: false,
            clipboard_poll_ms: 500,
            last_port: None,
            simulate: false,
            file: Self::default_path(),
        }
    }
}

//! Configuration loading and root folder resolution
//!
//! Resolution order, highest priority first:
//! 1. Command-line argument (applied by the service binary)
//! 2. Environment variable
//! 3. TOML config file (`<root>/cantina.toml`)
//! 4. Compiled default

use chrono::NaiveTime;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::time::{self, DayPolicy};
use crate::{Error, Result};

pub const ROOT_FOLDER_ENV: &str = "CANTINA_ROOT_FOLDER";
pub const ADMIN_SECRET_ENV: &str = "CANTINA_ADMIN_SECRET";
pub const PORT_ENV: &str = "PORT";
pub const CONFIG_FILE_NAME: &str = "cantina.toml";

/// What a reset removes from the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Delete every record
    #[default]
    Full,
    /// Delete records older than the current day window (approximate)
    KeepToday,
}

/// Service configuration
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(skip)]
    pub root_folder: PathBuf,
    pub bind_addr: String,
    pub directory_file: PathBuf,
    pub database_file: PathBuf,
    pub archive_dir: PathBuf,
    pub admin_secret: Option<String>,
    pub utc_offset_minutes: i32,
    pub reset_time: String,
    pub reset_policy: ResetPolicy,
    pub archive_on_reset: bool,
    pub storage_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_folder: PathBuf::from("."),
            bind_addr: "0.0.0.0:3000".to_string(),
            directory_file: PathBuf::from("matriculas.csv"),
            database_file: PathBuf::from("cantina.db"),
            archive_dir: PathBuf::from("archive"),
            admin_secret: None,
            utc_offset_minutes: 0,
            reset_time: "00:00".to_string(),
            reset_policy: ResetPolicy::Full,
            archive_on_reset: true,
            storage_timeout_ms: 2000,
        }
    }
}

// Admin secret is redacted
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("root_folder", &self.root_folder)
            .field("bind_addr", &self.bind_addr)
            .field("directory_file", &self.directory_file)
            .field("database_file", &self.database_file)
            .field("archive_dir", &self.archive_dir)
            .field("admin_secret", &self.admin_secret.as_ref().map(|_| "<redacted>"))
            .field("utc_offset_minutes", &self.utc_offset_minutes)
            .field("reset_time", &self.reset_time)
            .field("reset_policy", &self.reset_policy)
            .field("archive_on_reset", &self.archive_on_reset)
            .field("storage_timeout_ms", &self.storage_timeout_ms)
            .finish()
    }
}

impl Config {
    /// Load `<root>/cantina.toml` (if present) and apply environment overrides
    pub fn load(root_folder: &Path) -> Result<Self> {
        let path = root_folder.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let parsed = Self::from_toml_str(&content)?;
            info!("Loaded configuration from {}", path.display());
            parsed
        } else {
            info!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.root_folder = root_folder.to_path_buf();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Environment overrides: admin secret and listening port
    pub fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var(ADMIN_SECRET_ENV) {
            if !secret.is_empty() {
                self.admin_secret = Some(secret);
            }
        }
        if let Ok(port) = std::env::var(PORT_ENV) {
            if let Ok(port) = port.trim().parse::<u16>() {
                self.set_port(port);
            }
        }
    }

    /// Replace the port of `bind_addr`, keeping the host
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .bind_addr
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| self.bind_addr.clone());
        self.bind_addr = format!("{}:{}", host, port);
    }

    pub fn validate(&self) -> Result<()> {
        self.day_policy()?;
        self.reset_at()?;
        if self.storage_timeout_ms == 0 {
            return Err(Error::Config("storage_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn day_policy(&self) -> Result<DayPolicy> {
        DayPolicy::from_offset_minutes(self.utc_offset_minutes)
    }

    pub fn reset_at(&self) -> Result<NaiveTime> {
        time::parse_time_of_day(&self.reset_time)
    }

    pub fn storage_timeout(&self) -> Duration {
        time::millis_to_duration(self.storage_timeout_ms)
    }

    pub fn directory_path(&self) -> PathBuf {
        self.resolve(&self.directory_file)
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database_file)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.resolve(&self.archive_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_folder.join(path)
        }
    }
}

/// Root folder: CLI argument, then `CANTINA_ROOT_FOLDER`, then platform default
pub fn resolve_root_folder(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    default_root_folder()
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/cantina (or /var/lib/cantina for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("cantina"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/cantina"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("cantina"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\cantina"))
    } else {
        dirs::data_dir()
            .map(|d| d.join("cantina"))
            .unwrap_or_else(|| PathBuf::from("./cantina_data"))
    }
}

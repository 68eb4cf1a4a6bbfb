use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::export::{DateFormats, ExportFormat};

pub const APP_NAME: &str = "taskboard";

#[derive(Debug, Deserialize)]
pub struct Taskboard {
    pub database: PathBuf,
    pub editor: String,
    pub log_file: PathBuf,
    pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Export {
    pub file_name: PathBuf,
    pub format: ExportFormat,
    pub sheet_name: String,
    pub date_format: String,
    pub datetime_format: String,
}

#[derive(Debug, Deserialize)]
pub struct Configuration {
    pub taskboard: Taskboard,
    pub export: Export,
}

const DEFAULT_CONFIG: &str = r#"
[taskboard]
# Relative paths are resolved against the data directory.
database = "taskboard.db"
editor = "vim"
log_file = "taskboard.log"
# Overridden by RUST_LOG.
log_level = "warn"

[export]
file_name = "tasks.xlsx"
# xlsx or csv
format = "xlsx"
sheet_name = "Tasks"
date_format = "%-m/%-d/%Y"
datetime_format = "%-m/%-d/%Y, %-I:%M:%S %p"

"#;

impl Configuration {
    /// Loads defaults, then the config file, then `TASKBOARD_*` variables
    /// (`TASKBOARD_EXPORT__FORMAT=csv`). Without an explicit path the file
    /// lives in the user config dir and is created on first run.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = config_dir().join(format!("{APP_NAME}.toml"));
                if !p.exists() {
                    write_default(&p);
                }
                p
            }
        };

        let settings = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(config_path).required(path.is_some()))
            .add_source(env)
            .build()?;
        let cfg = settings.try_deserialize::<Configuration>()?;
        cfg.date_formats()?;
        Ok(cfg)
    }

    pub fn date_formats(&self) -> Result<DateFormats, ConfigError> {
        DateFormats::new(&self.export.date_format, &self.export.datetime_format)
            .map_err(ConfigError::Message)
    }

    pub fn database_path(&self) -> PathBuf {
        data_dir().join(&self.taskboard.database)
    }

    pub fn log_path(&self) -> PathBuf {
        data_dir().join(&self.taskboard.log_file)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("TASKBOARD")
        .prefix_separator("_")
        .separator("__")
}

/// `~/.local/share/taskboard` or the platform equivalent.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

fn write_default(path: &Path) {
    let result = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| fs::write(path, DEFAULT_CONFIG.trim()));
    if let Err(e) = result {
        eprintln!("Couldn't write default config to {}: {e}", path.display());
    }
}

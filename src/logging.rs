use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::config::Configuration;

/// Where log lines go. The board owns the terminal, so it logs to a file.
pub enum Sink {
    Stderr,
    File,
}

pub fn init(cfg: &Configuration, sink: Sink) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.taskboard.log_level))?;

    match sink {
        Sink::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        Sink::File => {
            let path = cfg.log_path();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
    }
    Ok(())
}

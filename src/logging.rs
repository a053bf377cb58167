//! Console and log file output.
//!
//! Every event goes to stdout and is appended to
//! `<exe_dir>/logs/powerplay_ocr.log`. If the log file cannot be opened the
//! run continues with console output only.

use anyhow::{anyhow, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::paths::get_logs_dir;

const LOG_FILE: &str = "powerplay_ocr.log";
const TIME_FORMAT: &str = "%H:%M:%S%.3f";

/// Installs the global subscriber. `RUST_LOG` overrides the default level.
pub fn init(verbose: bool) -> Result<()> {
    let default_level = if verbose { "powerplay_ocr=debug" } else { "powerplay_ocr=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = fmt::layer()
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(false);

    let log_dir = get_logs_dir();
    let file_layer = std::fs::create_dir_all(&log_dir)
        .and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_dir.join(LOG_FILE))
        })
        .ok()
        .map(|file| {
            fmt::layer()
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

//! File logging for the terminal client
//!
//! The terminal belongs to the UI, so tracing output goes to
//! ~/.local/share/docchat/logs/docchat.log (or platform equivalent).

use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,docchat=debug,docchat_core=debug";

pub fn log_file_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("docchat").join("logs").join("docchat.log"))
}

/// Install the global subscriber. The returned guard must be held until exit
/// so buffered lines are flushed.
pub fn init_logging() -> Option<WorkerGuard> {
    let Some(path) = log_file_path() else {
        eprintln!("[docchat] No data directory available, logging disabled");
        return None;
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("[docchat] Failed to create log directory {:?}: {}", parent, e);
            return None;
        }
    }

    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("[docchat] Failed to open log file {:?}: {}", path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true),
    );

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("[docchat] Failed to set tracing subscriber: {}", e);
        return None;
    }

    tracing::info!("Logging initialized, writing to {:?}", path);
    Some(guard)
}

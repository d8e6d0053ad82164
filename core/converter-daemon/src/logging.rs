//! Tracing setup for the daemon.
//!
//! Human-readable lines always go to stdout. Setting `JPGCONVERTER_LOG_DIR` adds
//! a daily-rolling file in that directory; the returned guard must be held until
//! exit so buffered lines get flushed.

use std::env;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEBUG_ENV: &str = "JPGCONVERTER_DEBUG_LOG";
const LOG_DIR_ENV: &str = "JPGCONVERTER_LOG_DIR";
const LOG_FILE_PREFIX: &str = "jpgconverter.log";

pub fn init() -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_filter())
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn build_filter() -> EnvFilter {
    let debug_enabled = env::var(DEBUG_ENV)
        .map(|value| is_truthy(&value))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn log_dir() -> Option<PathBuf> {
    env::var_os(LOG_DIR_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

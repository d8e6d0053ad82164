//! JPGconverter daemon entrypoint.
//!
//! Watches `~/Documents/JPGconverter` (or the folder given on the command line)
//! and lowercases the name of each file dropped into it once the file has
//! settled. Runs in the foreground until SIGINT/SIGTERM.

mod logging;
mod signals;

use clap::Parser;
use converter_core::stability::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use converter_core::{
    ensure_watch_dir, NotifySource, Reactor, ShutdownToken, StabilityDetector, StabilityPolicy,
    WatchConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "jpgconverter")]
#[command(about = "Lowercases the names of files dropped into the JPGconverter folder")]
#[command(version)]
struct Cli {
    /// Folder to watch (defaults to $JPGCONVERTER_DIR, then ~/Documents/JPGconverter)
    #[arg(long, value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Size samples taken before giving up on a file
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// Delay between size samples, in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    poll_interval_ms: u64,
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to resolve watch folder");
            std::process::exit(1);
        }
    };

    let target = match ensure_watch_dir(config.watch_dir()) {
        Ok(target) => target,
        Err(err) => {
            error!(
                error = %err,
                path = %config.watch_dir().display(),
                "Failed to prepare watch folder"
            );
            std::process::exit(1);
        }
    };
    info!(
        path = %target.path().display(),
        created = target.was_created(),
        "JPGconverter folder available"
    );

    let source = match NotifySource::watch(&target) {
        Ok(source) => source,
        Err(err) => {
            error!(error = %err, "Failed to start folder watcher");
            std::process::exit(1);
        }
    };

    let shutdown = ShutdownToken::new();
    if let Err(err) = signals::install(shutdown.clone()) {
        warn!(error = %err, "Failed to install signal handlers; stop with SIGKILL");
    }

    let policy = config.policy();
    let reactor = Reactor::new(source, StabilityDetector::new(policy), shutdown.clone());
    let handle = match reactor.spawn() {
        Ok(handle) => handle,
        Err(err) => {
            error!(error = %err, "Failed to spawn reactor thread");
            std::process::exit(1);
        }
    };
    info!(
        path = %target.path().display(),
        max_attempts = policy.max_attempts,
        poll_interval_ms = policy.poll_interval.as_millis() as u64,
        "Watching folder"
    );

    let stats = match handle.join() {
        Ok(stats) => stats,
        Err(_) => {
            error!("Reactor thread panicked");
            std::process::exit(1);
        }
    };
    shutdown.cancel();

    info!(
        renamed = stats.renamed,
        unchanged = stats.unchanged,
        directories = stats.directories,
        not_ready = stats.not_ready,
        unsupported = stats.unsupported,
        failed = stats.failed,
        source_errors = stats.source_errors,
        "JPGconverter stopped"
    );
}

fn resolve_config(cli: &Cli) -> converter_core::Result<WatchConfig> {
    let config = match &cli.dir {
        Some(dir) => WatchConfig::with_dir(dir.clone()),
        None => WatchConfig::from_env()?,
    };
    Ok(config.with_policy(StabilityPolicy {
        max_attempts: cli.max_attempts,
        poll_interval: Duration::from_millis(cli.poll_interval_ms),
    }))
}

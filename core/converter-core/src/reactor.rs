//! Event reactor: turns creation events into lowercase renames.
//!
//! Events are handled one at a time on a single worker. Each candidate is first
//! run through the [`StabilityDetector`], which may block for several seconds;
//! events that arrive meanwhile wait in the source's queue and are processed in
//! delivery order. At most one rename is in flight at any time.

use fs_err as fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{ConverterError, Result};
use crate::shutdown::ShutdownToken;
use crate::source::{EventSource, Next, SourceEvent};
use crate::stability::{NotReadyReason, Readiness, StabilityDetector};

/// How long the worker waits on the source before re-checking the shutdown token.
pub const SOURCE_POLL_TICK: Duration = Duration::from_millis(250);

/// A rename from a candidate path to its lowercased sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl RenamePlan {
    pub fn apply(&self) -> Result<()> {
        fs::rename(&self.from, &self.to).map_err(|source| ConverterError::Rename {
            from: self.from.clone(),
            to: self.to.clone(),
            source,
        })
    }
}

/// Plans the rename for `path`, keeping its directory and lowercasing the base name.
///
/// Returns `None` when the base name is already lowercase or is not valid UTF-8.
pub fn plan_rename(path: &Path) -> Option<RenamePlan> {
    let base = path.file_name()?.to_str()?;
    let lowered = base.to_lowercase();
    if lowered == base {
        return None;
    }
    Some(RenamePlan {
        from: path.to_path_buf(),
        to: path.with_file_name(lowered),
    })
}

/// What happened to one creation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Renamed { from: PathBuf, to: PathBuf },
    AlreadyLowercase,
    SkippedDirectory,
    NotReady(NotReadyReason),
    /// Base name missing or not UTF-8, so it has no lowercase form.
    UnsupportedName,
    RenameFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactorStats {
    pub renamed: u64,
    pub unchanged: u64,
    pub directories: u64,
    pub not_ready: u64,
    pub unsupported: u64,
    pub failed: u64,
    pub source_errors: u64,
}

impl ReactorStats {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Renamed { .. } => self.renamed += 1,
            Outcome::AlreadyLowercase => self.unchanged += 1,
            Outcome::SkippedDirectory => self.directories += 1,
            Outcome::NotReady(_) => self.not_ready += 1,
            Outcome::UnsupportedName => self.unsupported += 1,
            Outcome::RenameFailed => self.failed += 1,
        }
    }
}

pub struct Reactor<S> {
    source: S,
    detector: StabilityDetector,
    shutdown: ShutdownToken,
    stats: ReactorStats,
}

impl<S: EventSource> Reactor<S> {
    /// The detector is bound to `shutdown` so a pending stability wait stops early on cancellation.
    pub fn new(source: S, detector: StabilityDetector, shutdown: ShutdownToken) -> Self {
        Self {
            source,
            detector: detector.with_shutdown(shutdown.clone()),
            shutdown,
            stats: ReactorStats::default(),
        }
    }

    pub fn stats(&self) -> ReactorStats {
        self.stats
    }

    /// Runs until the source closes or shutdown is requested.
    pub fn run(mut self) -> ReactorStats {
        loop {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested, stopping reactor");
                break;
            }

            match self.source.next_event(SOURCE_POLL_TICK) {
                Next::Idle => continue,
                Next::Closed => {
                    info!("Event source closed, stopping reactor");
                    break;
                }
                Next::Event(SourceEvent::Created(path)) => {
                    self.handle_created(&path);
                }
                Next::Event(SourceEvent::Error(message)) => {
                    self.stats.source_errors += 1;
                    warn!(error = %message, "Watcher error");
                }
            }
        }

        self.source.close();
        self.stats
    }

    /// Waits for `path` to settle and lowercases its name.
    pub fn handle_created(&mut self, path: &Path) -> Outcome {
        let outcome = self.process(path);
        self.stats.record(&outcome);
        outcome
    }

    fn process(&self, path: &Path) -> Outcome {
        match self.detector.probe(path) {
            Readiness::Ready { samples } => {
                debug!(path = %path.display(), samples, "Candidate settled");
            }
            Readiness::NotReady {
                reason: NotReadyReason::Directory,
                ..
            } => {
                debug!(path = %path.display(), "Ignoring directory");
                return Outcome::SkippedDirectory;
            }
            Readiness::NotReady {
                reason: NotReadyReason::Cancelled,
                ..
            } => {
                debug!(path = %path.display(), "Shutdown requested before file settled");
                return Outcome::NotReady(NotReadyReason::Cancelled);
            }
            Readiness::NotReady { reason, samples } => {
                warn!(path = %path.display(), %reason, samples, "Could not access file");
                return Outcome::NotReady(reason);
            }
        }

        let Some(base) = path.file_name().and_then(|name| name.to_str()) else {
            warn!(path = %path.display(), "File name is not valid UTF-8, leaving it alone");
            return Outcome::UnsupportedName;
        };

        let Some(plan) = plan_rename(path) else {
            debug!(name = base, "Name already lowercase");
            return Outcome::AlreadyLowercase;
        };

        match plan.apply() {
            Ok(()) => {
                info!(
                    from = base,
                    to = %display_name(&plan.to),
                    "Renamed file"
                );
                Outcome::Renamed {
                    from: plan.from,
                    to: plan.to,
                }
            }
            Err(err) => {
                error!(name = base, error = %err, "Failed to rename file");
                Outcome::RenameFailed
            }
        }
    }
}

impl<S: EventSource + Send + 'static> Reactor<S> {
    /// Moves the reactor onto its own worker thread.
    pub fn spawn(self) -> io::Result<JoinHandle<ReactorStats>> {
        thread::Builder::new()
            .name("reactor".to_string())
            .spawn(move || self.run())
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

//! File stabilization detection.
//!
//! A file that just appeared in the watched folder may still be written by the
//! program that created it. The detector polls the file until two consecutive
//! samples report the same size and the file can be opened for read/write, which
//! approximates "the writer is done" without any signal from the writer.
//!
//! # Decision Rules
//!
//! Each attempt stats the path:
//!
//! 1. Stat fails (vanished, permission denied) → not ready, no retry.
//! 2. Path is a directory → not ready, no retry.
//! 3. Size equals the previous sample and a read/write open succeeds → ready.
//! 4. Otherwise record the size, sleep one interval and try again.
//!
//! The first sample has no predecessor, so a positive decision always needs at
//! least two samples, even for an empty file that never grows. When the attempt
//! budget runs out the file is reported not ready.
//!
//! # Known Limits
//!
//! The heuristic only looks at sizes. A writer that pauses for longer than one
//! interval with an unchanged size, or that preallocates a sparse file, can be
//! mistaken for a finished one.

use fs_err as fs;
use std::fmt;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

use crate::shutdown::ShutdownToken;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Polling budget for a single candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityPolicy {
    pub max_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for StabilityPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl StabilityPolicy {
    /// Upper bound on how long one check can block.
    pub fn max_wait(&self) -> Duration {
        self.poll_interval
            .saturating_mul(self.max_attempts.saturating_sub(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    /// Stat failed: the file was removed or is not accessible.
    Gone,
    Directory,
    /// The attempt budget ran out before the file settled.
    TimedOut,
    Cancelled,
}

impl NotReadyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotReadyReason::Gone => "gone",
            NotReadyReason::Directory => "directory",
            NotReadyReason::TimedOut => "timed_out",
            NotReadyReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a stability check. `samples` counts the stat calls that were made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready { samples: u32 },
    NotReady { reason: NotReadyReason, samples: u32 },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }

    pub fn samples(&self) -> u32 {
        match self {
            Readiness::Ready { samples } | Readiness::NotReady { samples, .. } => *samples,
        }
    }
}

/// Polls candidate files until they are safe to rename.
#[derive(Debug, Clone, Default)]
pub struct StabilityDetector {
    policy: StabilityPolicy,
    shutdown: Option<ShutdownToken>,
}

impl StabilityDetector {
    pub fn new(policy: StabilityPolicy) -> Self {
        Self {
            policy,
            shutdown: None,
        }
    }

    /// Stops waiting between attempts once `token` is cancelled.
    pub fn with_shutdown(mut self, token: ShutdownToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn policy(&self) -> StabilityPolicy {
        self.policy
    }

    pub fn is_ready(&self, path: &Path) -> bool {
        self.probe(path).is_ready()
    }

    /// Blocks for up to [`StabilityPolicy::max_wait`] and reports whether the
    /// file settled. Never returns an error; every failure is a not-ready reason.
    pub fn probe(&self, path: &Path) -> Readiness {
        let mut last_size: Option<u64> = None;

        for attempt in 1..=self.policy.max_attempts {
            let metadata = match fs::metadata(path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "Candidate stat failed");
                    return Readiness::NotReady {
                        reason: NotReadyReason::Gone,
                        samples: attempt,
                    };
                }
            };

            if metadata.is_dir() {
                return Readiness::NotReady {
                    reason: NotReadyReason::Directory,
                    samples: attempt,
                };
            }

            let size = metadata.len();
            trace!(path = %path.display(), attempt, size, "Candidate sampled");

            if last_size == Some(size) && can_open_read_write(path) {
                return Readiness::Ready { samples: attempt };
            }
            last_size = Some(size);

            if self.is_cancelled() {
                return Readiness::NotReady {
                    reason: NotReadyReason::Cancelled,
                    samples: attempt,
                };
            }
            if attempt < self.policy.max_attempts {
                thread::sleep(self.policy.poll_interval);
            }
        }

        Readiness::NotReady {
            reason: NotReadyReason::TimedOut,
            samples: self.policy.max_attempts,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(ShutdownToken::is_cancelled)
            .unwrap_or(false)
    }
}

// The handle is dropped before returning so no descriptor outlives the check.
fn can_open_read_write(path: &Path) -> bool {
    match fs::OpenOptions::new().read(true).write(true).open(path) {
        Ok(_file) => true,
        Err(err) => {
            trace!(path = %path.display(), error = %err, "Candidate still locked");
            false
        }
    }
}

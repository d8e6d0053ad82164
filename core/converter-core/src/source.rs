//! Observation sources feeding the reactor.
//!
//! The reactor only needs something that yields creation events and errors and
//! that can be closed. [`NotifySource`] watches one directory through `notify`;
//! [`ChannelSource`] is an in-memory stand-in driven by an mpsc sender.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ConverterError, Result};
use crate::storage::WatchTarget;

/// A single item delivered by an observation source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A new entry appeared in the watched directory.
    Created(PathBuf),
    /// The observation mechanism reported a problem. Never fatal.
    Error(String),
}

/// Result of waiting on a source for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Event(SourceEvent),
    /// Nothing relevant arrived before the timeout.
    Idle,
    /// Every producer is gone; no further events will arrive.
    Closed,
}

pub trait EventSource {
    /// Waits up to `timeout` for the next event.
    fn next_event(&mut self, timeout: Duration) -> Next;

    /// Stops producing events. Already queued events may still be drained.
    fn close(&mut self) {}
}

// Rename cookies remembered to collapse the `To`/`Both` pair inotify emits per move.
const RENAME_TRACKER_MEMORY: usize = 16;

/// Non-recursive `notify` watch on a single directory.
///
/// New entries arrive either as `Create` or, when moved in from elsewhere, as
/// the destination side of a rename. Both become [`SourceEvent::Created`].
pub struct NotifySource {
    rx: Receiver<notify::Result<Event>>,
    pending: VecDeque<SourceEvent>,
    seen_trackers: VecDeque<usize>,
    // Dropping the watcher deregisters the OS watch and closes the channel.
    watcher: Option<RecommendedWatcher>,
    target: PathBuf,
}

impl NotifySource {
    pub fn watch(target: &WatchTarget) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .map_err(ConverterError::WatcherInit)?;

        watcher
            .watch(target.path(), RecursiveMode::NonRecursive)
            .map_err(|source| ConverterError::WatchPath {
                path: target.path().to_path_buf(),
                source,
            })?;

        Ok(Self {
            rx,
            pending: VecDeque::new(),
            seen_trackers: VecDeque::new(),
            watcher: Some(watcher),
            target: target.path().to_path_buf(),
        })
    }

    /// Paths of entries that newly appeared in the folder because of `event`.
    fn created_paths(&mut self, event: Event) -> Vec<PathBuf> {
        match event.kind {
            EventKind::Create(_) => event.paths,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                if self.already_seen(event.tracker()) {
                    return Vec::new();
                }
                event.paths
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if self.already_seen(event.tracker()) {
                    return Vec::new();
                }
                event.paths.into_iter().nth(1).into_iter().collect()
            }
            kind => {
                debug!(?kind, paths = ?event.paths, "Ignoring event");
                Vec::new()
            }
        }
    }

    /// Records a rename cookie, returning true when it was already handled.
    fn already_seen(&mut self, tracker: Option<usize>) -> bool {
        let Some(tracker) = tracker else {
            return false;
        };
        if self.seen_trackers.contains(&tracker) {
            return true;
        }
        if self.seen_trackers.len() == RENAME_TRACKER_MEMORY {
            self.seen_trackers.pop_front();
        }
        self.seen_trackers.push_back(tracker);
        false
    }
}

impl EventSource for NotifySource {
    fn next_event(&mut self, timeout: Duration) -> Next {
        if let Some(event) = self.pending.pop_front() {
            return Next::Event(event);
        }

        match self.rx.recv_timeout(timeout) {
            Ok(Ok(event)) => {
                let paths = self.created_paths(event);
                self.pending
                    .extend(paths.into_iter().map(SourceEvent::Created));
                self.pending.pop_front().map(Next::Event).unwrap_or(Next::Idle)
            }
            Ok(Err(err)) => Next::Event(SourceEvent::Error(err.to_string())),
            Err(RecvTimeoutError::Timeout) => Next::Idle,
            Err(RecvTimeoutError::Disconnected) => Next::Closed,
        }
    }

    fn close(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(err) = watcher.unwatch(&self.target) {
                warn!(error = %err, path = %self.target.display(), "Failed to unwatch folder");
            }
        }
    }
}

/// In-memory source. Closes once every sender has been dropped.
pub struct ChannelSource {
    rx: Receiver<SourceEvent>,
}

pub fn channel_source() -> (Sender<SourceEvent>, ChannelSource) {
    let (tx, rx) = mpsc::channel();
    (tx, ChannelSource { rx })
}

impl EventSource for ChannelSource {
    fn next_event(&mut self, timeout: Duration) -> Next {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Next::Event(event),
            Err(RecvTimeoutError::Timeout) => Next::Idle,
            Err(RecvTimeoutError::Disconnected) => Next::Closed,
        }
    }
}

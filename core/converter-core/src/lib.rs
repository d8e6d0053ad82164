//! # converter-core
//!
//! Watches one folder and lowercases the name of every file that lands in it,
//! once the file has stopped changing.
//!
//! ## Design Principles
//!
//! - **Synchronous**: std threads and mpsc channels, no async runtime.
//! - **Sequential**: one reactor thread handles events in delivery order, so at
//!   most one rename is in flight for the watched folder.
//! - **Local failures stay local**: a file that vanishes, stays locked or fails
//!   to rename is logged and skipped. Only setup errors are returned to callers.
//! - **Swappable sources**: the reactor is generic over [`EventSource`], so tests
//!   drive it with [`ChannelSource`] instead of a real filesystem watch.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use converter_core::{ensure_watch_dir, NotifySource, Reactor, ShutdownToken,
//!     StabilityDetector, WatchConfig};
//!
//! let config = WatchConfig::from_env()?;
//! let target = ensure_watch_dir(config.watch_dir())?;
//! let source = NotifySource::watch(&target)?;
//! let shutdown = ShutdownToken::new();
//! let reactor = Reactor::new(source, StabilityDetector::new(config.policy()), shutdown.clone());
//! let stats = reactor.spawn()?.join();
//! ```

pub mod error;
pub mod reactor;
pub mod shutdown;
pub mod source;
pub mod stability;
pub mod storage;

pub use error::{ConverterError, Result};
pub use reactor::{plan_rename, Outcome, Reactor, ReactorStats, RenamePlan};
pub use shutdown::ShutdownToken;
pub use source::{channel_source, ChannelSource, EventSource, Next, NotifySource, SourceEvent};
pub use stability::{NotReadyReason, Readiness, StabilityDetector, StabilityPolicy};
pub use storage::{default_watch_dir, ensure_watch_dir, WatchConfig, WatchTarget};

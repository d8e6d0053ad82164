//! Error types for converter-core operations.
//!
//! Only setup failures and rename failures are represented here. The stability
//! detector never returns errors; it folds every failure into a not-ready
//! [`Readiness`](crate::stability::Readiness).

use std::path::PathBuf;

/// All errors that can occur while provisioning, watching or renaming.
#[derive(Debug, thiserror::Error)]
pub enum ConverterError {
    // ─────────────────────────────────────────────────────────────────────
    // Provisioning Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to inspect watch directory: {source}")]
    StatDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Watch target is not a directory: {0}")]
    NotADirectory(PathBuf),

    // ─────────────────────────────────────────────────────────────────────
    // Observation Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Failed to create filesystem watcher: {0}")]
    WatcherInit(#[source] notify::Error),

    #[error("Failed to watch {path}: {source}")]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Rename Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Rename failed: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using ConverterError.
pub type Result<T> = std::result::Result<T, ConverterError>;

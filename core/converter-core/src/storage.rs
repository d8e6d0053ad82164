//! Watch-target resolution and provisioning.
//!
//! The watched folder defaults to `~/Documents/JPGconverter`. It can be moved
//! with the `JPGCONVERTER_DIR` environment variable, and the daemon lets a CLI
//! flag override both. Whatever path wins is created on first use.
//!
//! Tests use [`WatchConfig::with_dir`] to point at a temp directory.

use fs_err as fs;
use std::env;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{ConverterError, Result};
use crate::stability::StabilityPolicy;

pub const WATCH_DIR_ENV: &str = "JPGCONVERTER_DIR";

const DOCUMENTS_DIR: &str = "Documents";
const WATCH_DIR_NAME: &str = "JPGconverter";
#[cfg(unix)]
const WATCH_DIR_MODE: u32 = 0o755;

/// Resolved runtime settings for one watcher process.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    watch_dir: PathBuf,
    policy: StabilityPolicy,
}

impl WatchConfig {
    /// Reads `JPGCONVERTER_DIR`, falling back to the folder under the home directory.
    pub fn from_env() -> Result<Self> {
        let watch_dir = match env::var_os(WATCH_DIR_ENV) {
            Some(value) if !value.is_empty() => PathBuf::from(value),
            _ => default_watch_dir()?,
        };
        Ok(Self::with_dir(watch_dir))
    }

    pub fn with_dir(watch_dir: impl Into<PathBuf>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            policy: StabilityPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: StabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    pub fn policy(&self) -> StabilityPolicy {
        self.policy
    }
}

/// Returns `<home>/Documents/JPGconverter`.
pub fn default_watch_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(ConverterError::HomeDirNotFound)?;
    Ok(home.join(DOCUMENTS_DIR).join(WATCH_DIR_NAME))
}

/// An existing, canonicalized directory that is safe to register with a watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    path: PathBuf,
    created: bool,
}

impl WatchTarget {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when provisioning had to create the directory.
    pub fn was_created(&self) -> bool {
        self.created
    }
}

/// Makes sure `path` exists as a directory, creating it (and any parents) if needed.
pub fn ensure_watch_dir(path: &Path) -> Result<WatchTarget> {
    let created = match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => false,
        Ok(_) => return Err(ConverterError::NotADirectory(path.to_path_buf())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            create_watch_dir(path)?;
            info!(path = %path.display(), "Created watch folder");
            true
        }
        Err(err) => {
            return Err(ConverterError::StatDir {
                path: path.to_path_buf(),
                source: err,
            })
        }
    };

    let canonical = fs::canonicalize(path).map_err(|err| ConverterError::StatDir {
        path: path.to_path_buf(),
        source: err,
    })?;

    Ok(WatchTarget {
        path: canonical,
        created,
    })
}

fn create_watch_dir(path: &Path) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(WATCH_DIR_MODE);
    }
    builder
        .create(path)
        .map_err(|err| ConverterError::CreateDir {
            path: path.to_path_buf(),
            source: err,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_directory_with_parents() {
        let temp = tempdir().unwrap();
        let wanted = temp.path().join("Documents").join("JPGconverter");

        let target = ensure_watch_dir(&wanted).unwrap();

        assert!(target.was_created());
        assert!(wanted.is_dir());
        assert_eq!(target.path(), std::fs::canonicalize(&wanted).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn created_directory_is_owner_writable_and_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let wanted = temp.path().join("JPGconverter");
        ensure_watch_dir(&wanted).unwrap();

        let mode = std::fs::metadata(&wanted).unwrap().permissions().mode() & 0o777;
        // umask can only clear bits
        assert_eq!(mode & !WATCH_DIR_MODE, 0);
        assert_eq!(mode & 0o700, 0o700);
    }

    #[test]
    fn existing_directory_is_reused() {
        let temp = tempdir().unwrap();

        let target = ensure_watch_dir(temp.path()).unwrap();

        assert!(!target.was_created());
        assert_eq!(target.path(), std::fs::canonicalize(temp.path()).unwrap());
    }

    #[test]
    fn regular_file_is_rejected() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("JPGconverter");
        std::fs::write(&file, b"not a folder").unwrap();

        let err = ensure_watch_dir(&file).unwrap_err();
        assert!(matches!(err, ConverterError::NotADirectory(path) if path == file));
    }

    #[test]
    fn default_dir_lives_under_documents() {
        let dir = default_watch_dir().unwrap();
        assert!(dir.ends_with("Documents/JPGconverter"));
    }

    #[test]
    fn with_dir_uses_default_policy() {
        let config = WatchConfig::with_dir("/tmp/watch");
        assert_eq!(config.watch_dir(), Path::new("/tmp/watch"));
        assert_eq!(config.policy(), StabilityPolicy::default());
    }
}

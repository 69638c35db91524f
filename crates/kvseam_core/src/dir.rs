//! Store directory layout and locking.
//!
//! ```text
//! <store_path>/
//! ├─ LOCK     # Advisory lock held while the store is open
//! └─ kv.log   # The store log
//! ```

use crate::error::{KvError, KvResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "kv.log";

/// An opened store directory.
///
/// Holds an exclusive lock on `LOCK` until dropped, so one directory is
/// served by at most one open store.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens `path`, creating it when `create_if_missing` is set, and takes
    /// the directory lock.
    ///
    /// # Errors
    ///
    /// - [`KvError::InvalidFormat`] if the path is missing (and may not be
    ///   created) or is not a directory
    /// - [`KvError::StoreLocked`] if another handle holds the lock
    /// - I/O errors
    pub fn open(path: &Path, create_if_missing: bool) -> KvResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(KvError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(KvError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(KvError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// The directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the store log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Whether a non-empty log is already present.
    pub fn has_log(&self) -> KvResult<bool> {
        match fs::metadata(self.log_path()) {
            Ok(meta) => Ok(meta.len() > 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

//! Advisory lock serializing reconciliation cycles on one config directory.

use std::fs::{self, File, OpenOptions};
use std::time::Duration;

use fs2::FileExt;
use tracing::debug;

use crate::constants::ConfigPath;
use crate::io::lock_with_retry;
use crate::{ConfigRoot, Error, Result};

/// Holds `.gitops/.lock` for as long as it is alive.
///
/// Two cycles running against the same directory would race on the domain
/// files and the sync state; callers that mutate take this lock first.
#[derive(Debug)]
pub struct CycleLock {
    file: File,
}

impl CycleLock {
    /// Acquire the lock, retrying with backoff until `timeout` elapses.
    pub fn acquire(root: &ConfigRoot, timeout: Duration) -> Result<Self> {
        let path = root.resolve(ConfigPath::CycleLock.as_str())?.to_native();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;
        lock_with_retry(&file, &path, timeout)?;
        debug!(path = %path.display(), "acquired cycle lock");
        Ok(Self { file })
    }
}

impl Drop for CycleLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

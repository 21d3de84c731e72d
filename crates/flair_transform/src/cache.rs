//! Generated CSS files.
//!
//! In import-injecting mode each source module gets one CSS file named after
//! a hash of its path. [`CssCache`] remembers the current file of every
//! module; when a rebuild produces a different name (timestamped names do on
//! every build) the previous file is deleted after a delay, so a browser
//! still holding the old import can finish loading it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use crate::background;
use crate::error::CacheError;

/// Delay before a superseded CSS file is deleted.
pub const STALE_FILE_DELAY: Duration = Duration::from_secs(2);

/// Deterministic CSS file name for a source module.
///
/// `timestamp` (unix millis) is appended when set.
pub fn css_file_name(file_path: &str, timestamp: Option<u128>) -> String {
    let digest = Sha256::digest(file_path.as_bytes());
    let mut name = String::with_capacity(48);
    for byte in &digest[..16] {
        name.push_str(&format!("{byte:02x}"));
    }
    if let Some(timestamp) = timestamp {
        name.push('-');
        name.push_str(&timestamp.to_string());
    }
    name.push_str(".css");
    name
}

pub(crate) fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis())
}

/// Write `css` to `path`, creating parent directories.
pub fn write_css_file(path: &Path, css: &str) -> Result<(), CacheError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, css).map_err(|source| CacheError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Module → generated CSS file bookkeeping.
#[derive(Debug)]
pub struct CssCache {
    generated: Mutex<FxHashMap<String, String>>,
    pending_deletions: Mutex<FxHashMap<PathBuf, JoinHandle<()>>>,
    deletion_delay: Duration,
}

impl Default for CssCache {
    fn default() -> Self {
        Self::with_deletion_delay(STALE_FILE_DELAY)
    }
}

static GLOBAL_CACHE: LazyLock<CssCache> = LazyLock::new(CssCache::default);

impl CssCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deletion_delay(deletion_delay: Duration) -> Self {
        Self {
            generated: Mutex::new(FxHashMap::default()),
            pending_deletions: Mutex::new(FxHashMap::default()),
            deletion_delay,
        }
    }

    /// The process-wide cache used when options carry none.
    pub fn global() -> &'static Self {
        &GLOBAL_CACHE
    }

    /// Current generated file name for a module.
    pub fn generated_name(&self, file_id: &str) -> Option<String> {
        self.generated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(file_id)
            .cloned()
    }

    /// Write the CSS of `file_id` into `out_dir` and record it.
    ///
    /// Returns the generated file name.
    pub fn persist(
        &self,
        out_dir: &Path,
        file_id: &str,
        css: &str,
        timestamp: Option<u128>,
    ) -> Result<String, CacheError> {
        fs::create_dir_all(out_dir).map_err(|source| CacheError::CreateDir {
            path: out_dir.to_path_buf(),
            source,
        })?;
        let name = css_file_name(file_id, timestamp);
        let path = out_dir.join(&name);
        fs::write(&path, css).map_err(|source| CacheError::Write { path, source })?;
        self.record(out_dir, file_id, &name);
        Ok(name)
    }

    /// Record `name` as the current file of `file_id`.
    ///
    /// A different previously recorded file is scheduled for deletion, and
    /// any pending deletion of `name` itself is cancelled.
    pub fn record(&self, out_dir: &Path, file_id: &str, name: &str) {
        self.cancel_deletion(&out_dir.join(name));

        let previous = self
            .generated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file_id.to_string(), name.to_string());

        if let Some(previous) = previous
            && previous != name
        {
            self.schedule_deletion(out_dir.join(previous));
        }
    }

    /// Cancel a scheduled deletion. Returns whether one was pending.
    pub fn cancel_deletion(&self, path: &Path) -> bool {
        let handle = self
            .pending_deletions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
        match handle {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    fn schedule_deletion(&self, path: PathBuf) {
        let Some(runtime) = background::handle() else {
            tracing::debug!("no background runtime, keeping stale css file {}", path.display());
            return;
        };
        let delay = self.deletion_delay;
        let target = path.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = fs::remove_file(&target) {
                tracing::debug!("failed to remove stale css file {}: {err}", target.display());
            }
        });

        let mut pending = self
            .pending_deletions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|_, handle| !handle.is_finished());
        if let Some(replaced) = pending.insert(path, handle) {
            replaced.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn file_names_are_deterministic() {
        let name = css_file_name("/app/src/Button.tsx", None);
        assert_eq!(name, css_file_name("/app/src/Button.tsx", None));
        assert_ne!(name, css_file_name("/app/src/Card.tsx", None));
        assert_eq!(name.len(), 32 + ".css".len());
        assert!(name.bytes().take(32).all(|b| b.is_ascii_hexdigit()));

        let stamped = css_file_name("/app/src/Button.tsx", Some(1_700_000_000_000));
        assert_eq!(stamped, name.replace(".css", "-1700000000000.css"));
    }

    #[test]
    fn persist_writes_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("generated");
        let cache = CssCache::new();

        let name = cache.persist(&out_dir, "src/App.tsx", ".a{color:red}", None).unwrap();
        assert_eq!(fs::read_to_string(out_dir.join(&name)).unwrap(), ".a{color:red}");
        assert_eq!(cache.generated_name("src/App.tsx"), Some(name));
    }

    #[test]
    fn superseded_file_is_deleted_after_delay() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CssCache::with_deletion_delay(Duration::from_millis(20));

        let first = cache.persist(dir.path(), "App.tsx", ".a{}", Some(1)).unwrap();
        let second = cache.persist(dir.path(), "App.tsx", ".b{}", Some(2)).unwrap();
        assert!(dir.path().join(&first).exists());

        thread::sleep(Duration::from_millis(300));
        assert!(!dir.path().join(&first).exists());
        assert!(dir.path().join(&second).exists());
    }

    #[test]
    fn reusing_a_name_cancels_its_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CssCache::with_deletion_delay(Duration::from_millis(100));

        let first = cache.persist(dir.path(), "App.tsx", ".a{}", Some(1)).unwrap();
        let second = cache.persist(dir.path(), "App.tsx", ".b{}", Some(2)).unwrap();
        let again = cache.persist(dir.path(), "App.tsx", ".a{}", Some(1)).unwrap();
        assert_eq!(first, again);

        thread::sleep(Duration::from_millis(400));
        assert!(dir.path().join(&first).exists());
        assert!(!dir.path().join(&second).exists());
    }

    #[test]
    fn unchanged_name_schedules_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CssCache::with_deletion_delay(Duration::from_millis(10));

        let name = cache.persist(dir.path(), "App.tsx", ".a{}", None).unwrap();
        cache.persist(dir.path(), "App.tsx", ".a{color:red}", None).unwrap();

        thread::sleep(Duration::from_millis(100));
        assert!(dir.path().join(&name).exists());
    }

    #[test]
    fn write_css_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dist/styles/app.css");
        write_css_file(&path, "body{margin:0}").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "body{margin:0}");
    }
}

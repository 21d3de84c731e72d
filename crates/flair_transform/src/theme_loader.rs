//! Loading the user theme from disk.
//!
//! Themes are JSON documents matching [`ThemeConfig`]. A host either calls
//! [`ThemeLoader::reload`] when it knows the file changed, or subscribes with
//! [`ThemeLoader::watch`] and receives a fresh config on every change.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::oneshot;

use crate::background;
use crate::error::ThemeLoadError;
use crate::theme::ThemeConfig;

/// File names probed by [`ThemeLoader::discover`], in order.
pub const THEME_FILE_NAMES: [&str; 2] = ["flair.theme.json", ".flair/theme.json"];

/// Reads a theme file.
#[derive(Debug, Clone)]
pub struct ThemeLoader {
    path: PathBuf,
}

impl ThemeLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Find a theme file in `root`.
    pub fn discover(root: &Path) -> Option<Self> {
        THEME_FILE_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
            .map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the theme file.
    pub fn reload(&self) -> Result<ThemeConfig, ThemeLoadError> {
        let json = fs::read_to_string(&self.path).map_err(|source| ThemeLoadError::Read {
            path: self.path.clone(),
            source,
        })?;
        ThemeConfig::from_json(&json).map_err(|source| ThemeLoadError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Poll the theme file and call `on_change` with a reloaded config each
    /// time its modification time or size changes.
    ///
    /// Polling stops when the returned [`ThemeWatch`] is cancelled or dropped.
    /// Returns `None` when no background runtime is available.
    pub fn watch<F>(&self, poll_interval: Duration, on_change: F) -> Option<ThemeWatch>
    where
        F: Fn(Result<ThemeConfig, ThemeLoadError>) + Send + 'static,
    {
        let handle = background::handle()?;
        let loader = self.clone();
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let mut last_seen = file_stamp(&loader.path);

        handle.spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stamp = file_stamp(&loader.path);
                        if stamp != last_seen {
                            last_seen = stamp;
                            on_change(loader.reload());
                        }
                    }
                    _ = &mut cancel_rx => break,
                }
            }
        });

        Some(ThemeWatch {
            cancel_tx: Some(cancel_tx),
        })
    }
}

fn file_stamp(path: &Path) -> Option<(SystemTime, u64)> {
    let metadata = fs::metadata(path).ok()?;
    Some((metadata.modified().ok()?, metadata.len()))
}

/// Subscription returned by [`ThemeLoader::watch`].
///
/// The watch is cancelled when this handle is dropped.
#[derive(Debug)]
pub struct ThemeWatch {
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl ThemeWatch {
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ThemeWatch {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn reload_reads_json_theme() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("flair.theme.json"),
            r##"{ "prefix": "t", "tokens": { "bg": "#fff" } }"##,
        )
        .unwrap();

        let loader = ThemeLoader::discover(dir.path()).unwrap();
        let theme = loader.reload().unwrap();
        assert_eq!(theme.prefix.as_deref(), Some("t"));
        assert_eq!(theme.token(&["bg"]).as_deref(), Some("#fff"));
    }

    #[test]
    fn discover_without_theme_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ThemeLoader::discover(dir.path()).is_none());
    }

    #[test]
    fn reload_reports_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flair.theme.json");

        let missing = ThemeLoader::new(&path).reload().unwrap_err();
        assert!(matches!(missing, ThemeLoadError::Read { .. }));

        fs::write(&path, "{ tokens: }").unwrap();
        let invalid = ThemeLoader::new(&path).reload().unwrap_err();
        assert!(matches!(invalid, ThemeLoadError::Parse { .. }));
    }

    #[test]
    fn watch_delivers_changes_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flair.theme.json");
        fs::write(&path, r#"{ "tokens": { "bg": "white" } }"#).unwrap();

        let (tx, rx) = mpsc::channel();
        let mut watch = ThemeLoader::new(&path)
            .watch(Duration::from_millis(10), move |theme| {
                let _ = tx.send(theme.map(|theme| theme.token(&["bg"])));
            })
            .unwrap();

        fs::write(&path, r##"{ "tokens": { "bg": "#000000" } }"##).unwrap();
        let update = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(update.as_deref(), Some("#000000"));

        watch.cancel();
        std::thread::sleep(Duration::from_millis(50));
        while rx.try_recv().is_ok() {}
        fs::write(&path, r#"{ "tokens": { "bg": "a-much-longer-value" } }"#).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }
}

//! Filesystem change events for a single watched file
//!
//! The parent directory is watched non-recursively so editors that save by
//! writing a temp file and renaming it over the original are still seen.
//! Events are filtered down to the watched file name and forwarded to a
//! tokio channel; the content itself is read by the consumer.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Cannot watch {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("File watcher failed: {0}")]
    Notify(#[from] notify::Error),
}

/// Keeps the underlying watcher alive; events stop when this is dropped
#[derive(Debug)]
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl FileWatcher {
    /// Start watching `path`; each relevant change yields the watched path.
    pub fn start(path: &Path) -> Result<(Self, UnboundedReceiver<PathBuf>), WatchError> {
        let path = path.canonicalize().map_err(|source| WatchError::Resolve {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = path.file_name().map(OsString::from).unwrap_or_default();

        let (tx, rx) = mpsc::unbounded_channel();
        let target = path.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_change_to(&event, &name) {
                    let _ = tx.send(target.clone());
                }
            }
            Err(e) => warn!(error = %e, "file watcher error"),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!(path = %path.display(), dir = %dir.display(), "file watcher started");

        Ok((
            Self {
                _watcher: watcher,
                path,
            },
            rx,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_change_to(event: &Event, name: &OsString) -> bool {
    let relevant = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    relevant
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some_and(|n| n == name.as_os_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};
    use std::time::Duration;
    use tempfile::tempdir;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_only_writes_to_the_watched_name_count() {
        let name = OsString::from("calc.py");
        let modify = || EventKind::Modify(ModifyKind::Data(DataChange::Content));
        assert!(is_change_to(&event(modify(), "/src/calc.py"), &name));
        assert!(is_change_to(
            &event(EventKind::Create(CreateKind::File), "/src/calc.py"),
            &name
        ));
        assert!(!is_change_to(&event(modify(), "/src/other.py"), &name));
        assert!(!is_change_to(
            &event(EventKind::Remove(RemoveKind::File), "/src/calc.py"),
            &name
        ));
        assert!(!is_change_to(
            &event(EventKind::Access(AccessKind::Any), "/src/calc.py"),
            &name
        ));
    }

    #[test]
    fn test_missing_file_cannot_be_watched() {
        let dir = tempdir().unwrap();
        let err = FileWatcher::start(&dir.path().join("absent.py")).unwrap_err();
        assert!(matches!(err, WatchError::Resolve { .. }));
    }

    #[tokio::test]
    async fn test_write_to_file_is_reported() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("calc.py");
        std::fs::write(&file, "x = 1\n").unwrap();

        let (watcher, mut rx) = FileWatcher::start(&file).unwrap();
        std::fs::write(dir.path().join("other.py"), "y = 2\n").unwrap();
        std::fs::write(&file, "x = 2\n").unwrap();

        let changed = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no change event within 10s")
            .unwrap();
        assert_eq!(changed.as_path(), watcher.path());
        assert_eq!(changed.file_name().unwrap(), "calc.py");
    }
}

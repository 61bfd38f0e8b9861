//! File watcher for hot reload of the JSON source.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::distconf::error::Result;
use crate::distconf::sources::JsonConfig;

/// Reloads a [`JsonConfig`] whenever its file is created or modified.
pub struct FileWatcher {
    path: PathBuf,
    config: Arc<JsonConfig>,
}

impl FileWatcher {
    pub fn new(path: &Path, config: Arc<JsonConfig>) -> Self {
        Self {
            path: path.to_path_buf(),
            config,
        }
    }

    /// Start watching in a background thread.
    ///
    /// The parent directory is watched rather than the file itself so that
    /// editors replacing the file are still noticed. Dropping the returned
    /// watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let path = self.path.clone();
        let config = self.config.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if Self::is_reload_event(&event, file_name.as_ref()) {
                        tracing::info!(path = %path.display(), "Config file change detected, reloading");
                        if let Err(e) = config.refresh_file(&path) {
                            tracing::error!(
                                path = %path.display(),
                                error = %e,
                                "Failed to reload config, keeping current values"
                            );
                        }
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }

    fn is_reload_event(event: &Event, file_name: Option<&OsString>) -> bool {
        (event.kind.is_modify() || event.kind.is_create())
            && event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n.to_os_string()).as_ref() == file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distconf::reader::Reader;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
    use notify::EventKind;
    use std::io::Write;

    fn event(kind: EventKind, path: &str) -> Event {
        Event {
            kind,
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_is_reload_event() {
        let name = OsString::from("config.json");
        let modify = || EventKind::Modify(ModifyKind::Data(DataChange::Content));

        assert!(FileWatcher::is_reload_event(&event(modify(), "/etc/hebe/config.json"), Some(&name)));
        assert!(FileWatcher::is_reload_event(
            &event(EventKind::Create(CreateKind::File), "/etc/hebe/config.json"),
            Some(&name)
        ));
        assert!(!FileWatcher::is_reload_event(&event(modify(), "/etc/hebe/other.json"), Some(&name)));
        assert!(!FileWatcher::is_reload_event(
            &event(EventKind::Remove(RemoveKind::File), "/etc/hebe/config.json"),
            Some(&name)
        ));
    }

    #[test]
    fn test_reloads_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"Port": "80"}"#).unwrap();

        let config = Arc::new(JsonConfig::from_file(&path).unwrap());
        let _watcher = FileWatcher::new(&path, config.clone()).run().unwrap();

        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(br#"{"Port": "81"}"#).unwrap();
        file.sync_all().unwrap();
        drop(file);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while config.get("Port").unwrap() != Some(b"81".to_vec()) {
            assert!(std::time::Instant::now() < deadline, "reload not observed");
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a temp file and renaming it over the original keep
//! triggering reloads. A save that leaves the text unchanged publishes nothing.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::RelayConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<RelayConfig>,
}

/// Last published file text; decides whether a change event is a real edit.
#[derive(Debug, Default)]
struct ReloadState {
    last_content: Option<String>,
}

impl ReloadState {
    /// Re-read `path`. Returns a config only for new text that validates.
    fn reload(&mut self, path: &Path) -> Option<RelayConfig> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                // Mid-rename the file can briefly be missing.
                tracing::debug!(error = %e, path = ?path, "Config file not readable yet");
                return None;
            }
        };
        // An empty file is a truncate seen mid-write, not an intent to reset.
        if content.trim().is_empty() || self.last_content.as_deref() == Some(content.as_str()) {
            return None;
        }

        match parse_config(&content) {
            Ok(config) => {
                self.last_content = Some(content);
                tracing::info!(
                    upstream = %config.relay.upstream,
                    prefix = %config.relay.prefix,
                    hosts = config.relay.hosts.len(),
                    "Config file change detected, reloading"
                );
                Some(config)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                None
            }
        }
    }
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RelayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching in a background thread.
    ///
    /// The returned watcher must be kept alive for updates to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let file_name: Option<OsString> = path.file_name().map(|n| n.to_os_string());
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut state = ReloadState {
            last_content: fs::read_to_string(&path).ok(),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if !touches_config || event.kind.is_access() {
                        return;
                    }
                    if let Some(config) = state.reload(&path) {
                        let _ = tx.send(config);
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("html-relay-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_reload_skips_unchanged_and_invalid() {
        let path = temp_dir("reload-state").join("relay.toml");
        fs::write(&path, "[relay]\nupstream = \"https://one.test\"\n").unwrap();

        let mut state = ReloadState::default();
        let first = state.reload(&path).unwrap();
        assert_eq!(first.relay.upstream, "https://one.test");

        // Same text again: nothing to publish.
        assert!(state.reload(&path).is_none());

        fs::write(&path, "[timeouts]\nrequest_secs = 0\n").unwrap();
        assert!(state.reload(&path).is_none());

        fs::write(&path, "[relay]\nupstream = \"https://two.test\"\n").unwrap();
        assert_eq!(state.reload(&path).unwrap().relay.upstream, "https://two.test");

        fs::write(&path, "").unwrap();
        assert!(state.reload(&path).is_none());

        fs::remove_file(&path).unwrap();
        assert!(state.reload(&path).is_none());
    }

    #[tokio::test]
    async fn test_watcher_publishes_edits() {
        let path = temp_dir("watcher").join("relay.toml");
        fs::write(&path, "[relay]\nupstream = \"https://one.test\"\n").unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _handle = watcher.run().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        fs::write(&path, "[relay]\nupstream = \"https://two.test\"\n").unwrap();

        let update = tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .expect("no reload within timeout")
            .expect("watcher channel closed");
        assert_eq!(update.relay.upstream, "https://two.test");
    }
}

//! Configuration file watcher for hot reload.
//!
//! A single save usually raises several notify events (truncate, write,
//! metadata). Events are collapsed until the file has been quiet for the
//! settle window, then the file is loaded once. A reload equal to the last
//! configuration sent is dropped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::KernelConfig;

/// Default quiet period before a burst of events triggers a reload.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(200);

pub struct ConfigWatcher {
    path: PathBuf,
    settle: Duration,
    updates: mpsc::UnboundedSender<KernelConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for reloaded configurations.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<KernelConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                settle: DEFAULT_SETTLE,
                updates,
            },
            rx,
        )
    }

    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Start watching. Must be called from inside a tokio runtime; the reload
    /// task stops once the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let _ = events_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        tokio::spawn(reload_on_change(self.path, self.settle, events_rx, self.updates));
        Ok(watcher)
    }
}

async fn reload_on_change(
    path: PathBuf,
    settle: Duration,
    mut events: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<KernelConfig>,
) {
    let mut last_sent: Option<KernelConfig> = None;

    while events.recv().await.is_some() {
        let mut absorbed = 1usize;
        while let Ok(Some(())) = tokio::time::timeout(settle, events.recv()).await {
            absorbed += 1;
        }

        match load_config(&path) {
            Ok(config) if last_sent.as_ref() == Some(&config) => {
                tracing::debug!(path = %path.display(), events = absorbed, "Config file unchanged");
            }
            Ok(config) => {
                tracing::info!(path = %path.display(), events = absorbed, "Config file changed, reloading");
                if updates.send(config.clone()).is_err() {
                    return;
                }
                last_sent = Some(config);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to reload config, keeping current configuration"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn next_update(
        rx: &mut mpsc::UnboundedReceiver<KernelConfig>,
        wait: Duration,
    ) -> Option<KernelConfig> {
        tokio::time::timeout(wait, rx.recv()).await.ok().flatten()
    }

    #[tokio::test]
    async fn burst_of_writes_yields_one_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.toml");
        std::fs::write(&path, "timeout_ms = 5000\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _watcher = watcher.settle(Duration::from_millis(300)).run().unwrap();

        for ms in [1000, 2000, 1234] {
            std::fs::write(&path, format!("timeout_ms = {ms}\n")).unwrap();
        }

        let config = next_update(&mut rx, Duration::from_secs(5)).await.unwrap();
        assert_eq!(config.timeout_ms, 1234);
        assert!(next_update(&mut rx, Duration::from_millis(800)).await.is_none());
    }

    #[tokio::test]
    async fn identical_or_invalid_contents_are_not_sent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.toml");
        std::fs::write(&path, "timeout_ms = 5000\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _watcher = watcher.run().unwrap();

        std::fs::write(&path, "timeout_ms = 700\n").unwrap();
        let config = next_update(&mut rx, Duration::from_secs(5)).await.unwrap();
        assert_eq!(config.timeout_ms, 700);

        std::fs::write(&path, "timeout_ms = 700\n").unwrap();
        assert!(next_update(&mut rx, Duration::from_millis(800)).await.is_none());

        std::fs::write(&path, "timeout_ms = 0\n").unwrap();
        assert!(next_update(&mut rx, Duration::from_millis(800)).await.is_none());

        std::fs::write(&path, "timeout_ms = 900\n").unwrap();
        let config = next_update(&mut rx, Duration::from_secs(5)).await.unwrap();
        assert_eq!(config.timeout_ms, 900);
    }
}

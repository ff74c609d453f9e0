//! Configuration file watcher for hot reload.
//!
//! Only the level threshold can change in a running process; the rest of
//! the configuration is fixed when the logger is built.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Watcher, RecursiveMode, Event, RecommendedWatcher, Config};
use tokio::sync::mpsc;
use crate::config::loader::load_config;
use crate::config::schema::LoggingConfiguration;
use crate::observability::level::AtomicLevel;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<LoggingConfiguration>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<LoggingConfiguration>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            update_tx,
        }, update_rx)
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for updates to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let ConfigWatcher { path, update_tx } = self;
        let reload_path = path.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = %e, "Config watch error");
                    return;
                }
            };
            if !(event.kind.is_modify() || event.kind.is_create()) {
                return;
            }

            match load_config(&reload_path) {
                Ok(new_config) => {
                    tracing::debug!(path = %reload_path.display(), "Logging config reloaded");
                    let _ = update_tx.send(new_config);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Rejected logging config change, keeping current level");
                }
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Logging config watcher started");
        Ok(watcher)
    }
}

/// Apply reloaded configurations to a level handle until the channel closes.
pub async fn apply_level_updates(
    level: AtomicLevel,
    mut updates: mpsc::UnboundedReceiver<LoggingConfiguration>,
) {
    while let Some(config) = updates.recv().await {
        match level.set_level_str(&config.level) {
            Ok(previous) => {
                tracing::info!(from = %previous, to = %config.level, "Log level updated");
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring reloaded level"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[tokio::test]
    async fn test_updates_adjust_level() {
        let (level, _reload_layer) = AtomicLevel::new(LevelFilter::INFO);
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(LoggingConfiguration {
            level: "error".into(),
            ..Default::default()
        })
        .unwrap();
        tx.send(LoggingConfiguration {
            level: "bogus".into(),
            ..Default::default()
        })
        .unwrap();
        drop(tx);

        apply_level_updates(level.clone(), rx).await;
        assert_eq!(level.level(), LevelFilter::ERROR);
    }

    #[tokio::test]
    async fn test_file_change_is_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[log]\nlevel = \"info\"\n").unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _watcher = watcher.run().unwrap();

        std::fs::write(&path, "[log]\nlevel = \"error\"\n").unwrap();

        let reloaded = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match updates.recv().await {
                    Some(config) if config.level == "error" => return config,
                    Some(_) => continue,
                    None => panic!("watcher channel closed"),
                }
            }
        })
        .await
        .expect("no reload within 5s");
        assert_eq!(reloaded.level, "error");
    }
}

//! Snapshot file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::store::{load_snapshot, StoreSnapshot};

/// A watcher that monitors the store snapshot file for changes.
pub struct SnapshotWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<StoreSnapshot>,
}

impl SnapshotWatcher {
    /// Create a new SnapshotWatcher.
    ///
    /// Returns the watcher and a receiver for reloaded snapshots.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<StoreSnapshot>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for events to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::debug!(path = ?path, "Snapshot change detected");
                        match load_snapshot(&path) {
                            Ok(snapshot) => {
                                let _ = tx.send(snapshot);
                            }
                            Err(e) => {
                                tracing::error!(
                                    error = %e,
                                    "Failed to reload snapshot. Keeping current resolution."
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Snapshot watcher started");
        Ok(watcher)
    }
}

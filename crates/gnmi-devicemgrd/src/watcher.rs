//! Device table watcher.
//!
//! Re-reads the `[[device]]` table of the configuration file on an interval
//! and feeds the differences to the [`NodeListener`]. The `[bridge]` section
//! is read once at startup; later edits to it need a restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DaemonConfig, DeviceConfig};
use crate::error::DeviceResult;
use crate::listener::{DeviceChange, NodeListener};

#[derive(Debug)]
pub struct DeviceTableWatcher {
    path: PathBuf,
    interval: Duration,
    snapshot: HashMap<String, DeviceConfig>,
}

impl DeviceTableWatcher {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            snapshot: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Devices as of the last successful read.
    pub fn snapshot(&self) -> &HashMap<String, DeviceConfig> {
        &self.snapshot
    }

    /// Diffs `devices` against the snapshot and adopts them.
    ///
    /// Deletions come first, then writes and modifications, each sorted by
    /// device id.
    pub fn diff(&mut self, devices: Vec<DeviceConfig>) -> Vec<DeviceChange> {
        let next: HashMap<String, DeviceConfig> = devices
            .into_iter()
            .map(|device| (device.id.clone(), device))
            .collect();

        let mut deleted: Vec<&String> = self
            .snapshot
            .keys()
            .filter(|id| !next.contains_key(*id))
            .collect();
        deleted.sort();
        let mut changes: Vec<DeviceChange> = deleted
            .into_iter()
            .map(|id| DeviceChange::Deleted(id.clone()))
            .collect();

        let mut ids: Vec<&String> = next.keys().collect();
        ids.sort();
        for id in ids {
            let device = &next[id];
            match self.snapshot.get(id) {
                None => changes.push(DeviceChange::Written(device.clone())),
                Some(previous) if previous != device => {
                    changes.push(DeviceChange::SubtreeModified(device.clone()))
                }
                Some(_) => {}
            }
        }

        self.snapshot = next;
        changes
    }

    /// Reads the file once and returns the changes since the last read.
    pub fn poll(&mut self) -> DeviceResult<Vec<DeviceChange>> {
        let config = DaemonConfig::load(&self.path)?;
        Ok(self.diff(config.devices))
    }

    /// Polls until `shutdown` fires, delivering each batch to `listener`.
    ///
    /// A file that fails to load keeps the previous snapshot.
    pub async fn run(mut self, listener: Arc<NodeListener>, shutdown: CancellationToken) {
        let interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX);
        info!(path = %self.path.display(), interval_ms, "Watching device table");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.poll() {
                Ok(changes) if changes.is_empty() => {}
                Ok(changes) => {
                    debug!(changes = changes.len(), "Device table changed");
                    listener.handle_changes(changes).await;
                }
                Err(e) => warn!(error = %e, "Failed to reload device table, keeping previous snapshot"),
            }
        }
        info!("Device table watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionManagerConfig, DeviceConnectionManager};
    use crate::store::MemoryOperationalStore;
    use gnmi_connector::session::mock::MockSessionProvider;
    use gnmi_yang::SchemaContext;
    use pretty_assertions::assert_eq;

    fn device(id: &str, address: &str) -> DeviceConfig {
        DeviceConfig::plaintext(id, address, 9339)
    }

    fn table(devices: &[(&str, &str)]) -> String {
        devices
            .iter()
            .map(|(id, address)| {
                format!("[[device]]\nid = \"{id}\"\naddress = \"{address}\"\nplaintext = true\n")
            })
            .collect()
    }

    #[test]
    fn test_diff() {
        let mut watcher = DeviceTableWatcher::new("/unused", Duration::from_secs(1));
        let changes = watcher.diff(vec![device("b", "10.0.0.2"), device("a", "10.0.0.1")]);
        assert_eq!(
            changes,
            vec![
                DeviceChange::Written(device("a", "10.0.0.1")),
                DeviceChange::Written(device("b", "10.0.0.2")),
            ]
        );

        assert!(watcher
            .diff(vec![device("a", "10.0.0.1"), device("b", "10.0.0.2")])
            .is_empty());

        let changes = watcher.diff(vec![device("b", "10.0.0.3"), device("c", "10.0.0.4")]);
        assert_eq!(
            changes,
            vec![
                DeviceChange::Deleted("a".into()),
                DeviceChange::SubtreeModified(device("b", "10.0.0.3")),
                DeviceChange::Written(device("c", "10.0.0.4")),
            ]
        );
        assert_eq!(watcher.snapshot().len(), 2);
    }

    #[test]
    fn test_bad_file_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devicemgrd.toml");
        std::fs::write(&path, table(&[("leaf1", "10.0.0.1")])).unwrap();

        let mut watcher = DeviceTableWatcher::new(&path, Duration::from_secs(1));
        assert_eq!(watcher.poll().unwrap().len(), 1);

        std::fs::write(&path, "[[device]\nbroken").unwrap();
        assert!(watcher.poll().is_err());
        assert!(watcher.snapshot().contains_key("leaf1"));

        std::fs::write(&path, table(&[])).unwrap();
        assert_eq!(
            watcher.poll().unwrap(),
            vec![DeviceChange::Deleted("leaf1".into())]
        );
    }

    #[tokio::test]
    async fn test_run_delivers_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devicemgrd.toml");
        std::fs::write(&path, table(&[("leaf1", "10.0.0.1")])).unwrap();

        let provider = Arc::new(MockSessionProvider::new());
        let manager = Arc::new(DeviceConnectionManager::new(
            provider.clone(),
            Arc::new(SchemaContext::empty()),
            ConnectionManagerConfig::default(),
        ));
        let store = Arc::new(MemoryOperationalStore::new());
        let listener = Arc::new(NodeListener::new(manager.clone(), store, 2));
        let shutdown = CancellationToken::new();

        let watcher = DeviceTableWatcher::new(&path, Duration::from_millis(20));
        let task = tokio::spawn(watcher.run(listener.clone(), shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        listener.wait_idle().await;
        assert_eq!(manager.connected_count(), 1);

        std::fs::write(&path, table(&[])).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.connected_count(), 0);

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(provider.events(), vec!["create 10.0.0.1:9339", "close 10.0.0.1:9339"]);
    }
}

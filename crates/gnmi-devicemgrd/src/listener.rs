//! Node Lifecycle Listener.
//!
//! Turns observed device configuration changes into connect and disconnect
//! calls. Dispatch is sequential; connect attempts run on a bounded worker
//! pool so one hanging device cannot hold up the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::config::DeviceConfig;
use crate::connection::DeviceConnectionManager;
use crate::error::DeviceError;
use crate::store::{NodeState, OperationalStore};

/// One observed change of a device record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceChange {
    /// The record was written (created or replaced).
    Written(DeviceConfig),
    /// Something below the record changed.
    SubtreeModified(DeviceConfig),
    /// The record was removed.
    Deleted(String),
}

impl DeviceChange {
    pub fn device_id(&self) -> &str {
        match self {
            DeviceChange::Written(config) | DeviceChange::SubtreeModified(config) => &config.id,
            DeviceChange::Deleted(id) => id,
        }
    }
}

#[derive(Debug)]
struct KnownDevice {
    generation: u64,
    config: DeviceConfig,
}

type KnownDevices = Arc<Mutex<HashMap<String, KnownDevice>>>;

/// Serializes record writes with record removals.
type RecordLock = Arc<tokio::sync::Mutex<()>>;

/// Drives each device through Connecting, Connected or Failed, and back
/// to Disconnected.
pub struct NodeListener {
    manager: Arc<DeviceConnectionManager>,
    store: Arc<dyn OperationalStore>,
    known: KnownDevices,
    records: RecordLock,
    permits: Arc<Semaphore>,
    tasks: TaskTracker,
    next_generation: AtomicU64,
}

impl NodeListener {
    /// Creates a listener running at most `connect_workers` connect attempts at once.
    pub fn new(
        manager: Arc<DeviceConnectionManager>,
        store: Arc<dyn OperationalStore>,
        connect_workers: usize,
    ) -> Self {
        Self {
            manager,
            store,
            known: Arc::new(Mutex::new(HashMap::new())),
            records: Arc::new(tokio::sync::Mutex::new(())),
            permits: Arc::new(Semaphore::new(connect_workers.max(1))),
            tasks: TaskTracker::new(),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn manager(&self) -> &Arc<DeviceConnectionManager> {
        &self.manager
    }

    /// Applies a batch of changes in order.
    pub async fn handle_changes(&self, changes: Vec<DeviceChange>) {
        for change in changes {
            match change {
                DeviceChange::Written(config) | DeviceChange::SubtreeModified(config) => {
                    self.on_written(config)
                }
                DeviceChange::Deleted(id) => self.on_deleted(&id).await,
            }
        }
    }

    /// Waits until every connect attempt spawned so far has finished.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Stops all work and disconnects every device.
    pub async fn shutdown(&self) {
        info!("Stopping node listener");
        self.known.lock().clear();
        self.tasks.close();
        self.manager.disconnect_all().await;
        self.tasks.wait().await;
        self.manager.disconnect_all().await;
    }

    fn on_written(&self, config: DeviceConfig) {
        let generation = {
            let mut known = self.known.lock();
            if let Some(previous) = known.get(&config.id) {
                if previous.config == config {
                    debug!(device = %config.id, "Connection parameters unchanged, ignoring");
                    return;
                }
            }
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
            known.insert(
                config.id.clone(),
                KnownDevice {
                    generation,
                    config: config.clone(),
                },
            );
            generation
        };

        info!(device = %config.id, address = %config.endpoint(), "Device configuration changed");
        self.spawn_connect(config, generation);
    }

    #[instrument(skip(self))]
    async fn on_deleted(&self, device: &str) {
        self.known.lock().remove(device);
        self.manager.disconnect(device).await;
        let _records = self.records.lock().await;
        match self.store.remove_node_state(device).await {
            Ok(_) => info!("Device removed"),
            Err(e) => warn!(error = %e, "Failed to remove operational record"),
        }
    }

    fn spawn_connect(&self, config: DeviceConfig, generation: u64) {
        let manager = self.manager.clone();
        let store = self.store.clone();
        let known = self.known.clone();
        let records = self.records.clone();
        let permits = self.permits.clone();

        self.tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let id = config.id.clone();
            if !is_current(&known, &id, generation) {
                debug!(device = %id, "Superseded before connecting");
                return;
            }

            manager.disconnect(&id).await;
            let recorder = Recorder {
                store: &*store,
                known: &known,
                records: &records,
                device: &id,
                generation,
            };
            if !recorder.record(NodeState::connecting()).await {
                debug!(device = %id, "Superseded before connecting");
                return;
            }

            match manager.connect(&config).await {
                Ok(connection) => {
                    let state = NodeState::connected(connection.capabilities().to_vec());
                    let recorded = recorder.record(state).await;
                    let deleted = !known.lock().contains_key(&id);
                    if !recorded && deleted {
                        debug!(device = %id, "Deleted while connecting");
                        manager.disconnect(&id).await;
                    }
                }
                Err(e) if e.is_cancellation() => {
                    debug!(device = %id, "Connect cancelled");
                }
                Err(e) => {
                    let reason = match e {
                        DeviceError::ConnectionFailed { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    warn!(device = %id, %reason, "Recording connect failure");
                    recorder.record(NodeState::failed(reason)).await;
                }
            }
        });
    }
}

fn is_current(known: &KnownDevices, device: &str, generation: u64) -> bool {
    known
        .lock()
        .get(device)
        .is_some_and(|k| k.generation == generation)
}

/// Operational record writer of one connect attempt.
struct Recorder<'a> {
    store: &'a dyn OperationalStore,
    known: &'a KnownDevices,
    records: &'a RecordLock,
    device: &'a str,
    generation: u64,
}

impl Recorder<'_> {
    /// Writes `state` unless a newer change for the device arrived meanwhile.
    ///
    /// The generation is checked under the record lock, so a delete cannot
    /// slip in between the check and the write. Returns false when superseded.
    async fn record(&self, state: NodeState) -> bool {
        let _records = self.records.lock().await;
        if !is_current(self.known, self.device, self.generation) {
            return false;
        }
        if let Err(e) = self.store.put_node_state(self.device, state).await {
            warn!(device = self.device, error = %e, "Failed to write operational record");
        }
        true
    }
}

//! Operational status records of devices.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::DeviceResult;

/// Connection state of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Not terminal: the next configuration write retries.
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational record of one device, as seen by operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub status: ConnectionState,
    pub failure_reason: Option<String>,
    /// Models advertised by the device, as `name@version`.
    pub capabilities: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl NodeState {
    pub fn connecting() -> Self {
        Self::with_status(ConnectionState::Connecting)
    }

    pub fn connected(capabilities: Vec<String>) -> Self {
        Self {
            capabilities,
            ..Self::with_status(ConnectionState::Connected)
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            failure_reason: Some(reason.into()),
            ..Self::with_status(ConnectionState::Failed)
        }
    }

    fn with_status(status: ConnectionState) -> Self {
        Self {
            status,
            failure_reason: None,
            capabilities: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Sink for device status records, keyed by device id.
#[async_trait]
pub trait OperationalStore: Send + Sync {
    async fn put_node_state(&self, device: &str, state: NodeState) -> DeviceResult<()>;

    /// Removes the record; returns whether one existed.
    async fn remove_node_state(&self, device: &str) -> DeviceResult<bool>;

    async fn node_state(&self, device: &str) -> DeviceResult<Option<NodeState>>;
}

/// In-process [`OperationalStore`].
#[derive(Debug, Default)]
pub struct MemoryOperationalStore {
    records: Mutex<HashMap<String, NodeState>>,
}

impl MemoryOperationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record.
    pub fn snapshot(&self) -> HashMap<String, NodeState> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl OperationalStore for MemoryOperationalStore {
    async fn put_node_state(&self, device: &str, state: NodeState) -> DeviceResult<()> {
        self.records.lock().insert(device.to_string(), state);
        Ok(())
    }

    async fn remove_node_state(&self, device: &str) -> DeviceResult<bool> {
        Ok(self.records.lock().remove(device).is_some())
    }

    async fn node_state(&self, device: &str) -> DeviceResult<Option<NodeState>> {
        Ok(self.records.lock().get(device).cloned())
    }
}

//! gNMI device connection manager.
//!
//! This crate implements the `devicemgrd` daemon, which keeps one gNMI
//! connection per configured device and exposes each device as a
//! transactional data broker.
//!
//! # Responsibilities
//!
//! - Watch the device table of the configuration file ([`DeviceTableWatcher`])
//! - Connect, reconnect and disconnect devices as their records change
//!   ([`NodeListener`], [`DeviceConnectionManager`])
//! - Record per-device connection status and failure reasons
//!   ([`OperationalStore`])
//!
//! # Device states
//!
//! | State | Entered when |
//! |-------|--------------|
//! | `Connecting` | A new or changed device record was observed |
//! | `Connected` | Session established and capabilities negotiated |
//! | `Failed` | Session or negotiation error; retried on the next record change |
//! | `Disconnected` | Device deleted, or torn down before reconnecting |
//!
//! # Example
//!
//! ```ignore
//! use gnmi_devicemgrd::{DeviceChange, NodeListener};
//!
//! let listener = NodeListener::new(manager, store, 4);
//! listener.handle_changes(vec![DeviceChange::Written(device)]).await;
//! ```

pub mod config;
mod connection;
mod error;
mod listener;
mod store;
mod watcher;

pub use config::{DaemonConfig, DeviceConfig};
pub use connection::{ConnectionManagerConfig, DeviceConnection, DeviceConnectionManager};
pub use error::{DeviceError, DeviceResult};
pub use listener::{DeviceChange, NodeListener};
pub use store::{ConnectionState, MemoryOperationalStore, NodeState, OperationalStore};
pub use watcher::DeviceTableWatcher;

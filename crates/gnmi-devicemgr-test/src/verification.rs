//! Verification helpers for bridge scenarios
//!
//! Assertions over the operational store and the connection manager.

use gnmi_devicemgrd::{
    ConnectionState, DeviceConnectionManager, DeviceError, NodeState, OperationalStore,
};
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Store error: {0}")]
    Store(#[from] DeviceError),

    #[error("No status record for device '{device}'")]
    RecordNotFound { device: String },

    #[error("Unexpected status record for device '{device}'")]
    UnexpectedRecord { device: String },

    #[error("Device '{device}': expected {expected}, got {actual}")]
    StatusMismatch {
        device: String,
        expected: ConnectionState,
        actual: ConnectionState,
    },

    #[error("Device '{device}' failed without a reason")]
    MissingReason { device: String },

    #[error("Expected {expected} connected devices, found {actual}")]
    ConnectionCountMismatch { expected: usize, actual: usize },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Operational store verification helper
pub struct StateVerifier<'a> {
    store: &'a dyn OperationalStore,
}

impl<'a> StateVerifier<'a> {
    pub fn new(store: &'a dyn OperationalStore) -> Self {
        Self { store }
    }

    /// Returns the record of `device`, failing if there is none.
    pub async fn record(&self, device: &str) -> VerifyResult<NodeState> {
        self.store
            .node_state(device)
            .await?
            .ok_or_else(|| VerificationError::RecordNotFound {
                device: device.to_string(),
            })
    }

    /// Verify the recorded status of a device
    pub async fn assert_status(&self, device: &str, expected: ConnectionState) -> VerifyResult<NodeState> {
        let record = self.record(device).await?;
        if record.status != expected {
            return Err(VerificationError::StatusMismatch {
                device: device.to_string(),
                expected,
                actual: record.status,
            });
        }
        Ok(record)
    }

    /// Verify a device is `Failed` with a non-empty reason; returns the reason
    pub async fn assert_failed(&self, device: &str) -> VerifyResult<String> {
        let record = self.assert_status(device, ConnectionState::Failed).await?;
        match record.failure_reason {
            Some(reason) if !reason.is_empty() => Ok(reason),
            _ => Err(VerificationError::MissingReason {
                device: device.to_string(),
            }),
        }
    }

    /// Verify that no record exists for a device
    pub async fn assert_absent(&self, device: &str) -> VerifyResult<()> {
        if self.store.node_state(device).await?.is_some() {
            return Err(VerificationError::UnexpectedRecord {
                device: device.to_string(),
            });
        }
        Ok(())
    }
}

/// Verify the number of devices with a ready connection
pub fn assert_connected_count(manager: &DeviceConnectionManager, expected: usize) -> VerifyResult<()> {
    let actual = manager.connected_count();
    if actual != expected {
        return Err(VerificationError::ConnectionCountMismatch { expected, actual });
    }
    Ok(())
}

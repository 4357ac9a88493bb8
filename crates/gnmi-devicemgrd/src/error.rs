//! Error types for the device manager.

use gnmi_connector::SessionError;
use thiserror::Error;

/// Result type for device manager operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Device connection lifecycle errors.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No connection exists for the device.
    #[error("Device {device} is not connected")]
    NotConnected {
        /// Device identifier.
        device: String,
    },

    /// A connect attempt for the device has not finished yet.
    #[error("Device {device} is still connecting")]
    ConnectionPending {
        /// Device identifier.
        device: String,
    },

    /// The last connect attempt failed.
    #[error("Connection to device {device} failed: {reason}")]
    ConnectionFailed {
        /// Device identifier.
        device: String,
        /// Human readable reason, also written to the operational store.
        reason: String,
    },

    /// The connect attempt was superseded by a delete or a newer configuration.
    #[error("Connect attempt for device {device} was cancelled")]
    Cancelled {
        /// Device identifier.
        device: String,
    },

    /// Invalid daemon or device configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session layer failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Operational store failure.
    #[error("Operational store error: {0}")]
    Store(String),
}

impl DeviceError {
    pub fn not_connected(device: impl Into<String>) -> Self {
        Self::NotConnected {
            device: device.into(),
        }
    }

    pub fn pending(device: impl Into<String>) -> Self {
        Self::ConnectionPending {
            device: device.into(),
        }
    }

    pub fn failed(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            device: device.into(),
            reason: reason.into(),
        }
    }

    pub fn cancelled(device: impl Into<String>) -> Self {
        Self::Cancelled {
            device: device.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if a later attempt may succeed without a config change.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeviceError::ConnectionPending { .. } | DeviceError::ConnectionFailed { .. } => true,
            DeviceError::Session(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns true for attempts cancelled by a concurrent delete or reconfiguration.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DeviceError::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeviceError::failed("leaf1", "connection refused");
        assert_eq!(
            err.to_string(),
            "Connection to device leaf1 failed: connection refused"
        );
        assert_eq!(
            DeviceError::pending("leaf1").to_string(),
            "Device leaf1 is still connecting"
        );
    }

    #[test]
    fn test_cancellation_is_not_a_failure() {
        let err = DeviceError::cancelled("leaf1");
        assert!(err.is_cancellation());
        assert!(!err.is_retryable());
        assert!(!DeviceError::failed("leaf1", "x").is_cancellation());
    }

    #[test]
    fn test_retryable_session_errors() {
        let err = DeviceError::from(SessionError::Rpc(tonic::Status::unavailable("down")));
        assert!(err.is_retryable());
        let err = DeviceError::from(SessionError::configuration("tls.ca_bundle", "empty"));
        assert!(!err.is_retryable());
    }
}

//! Transport channel with in-flight call tracking.

use std::time::Duration;

use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tracing::{debug, warn};

use super::{ConnectionParams, SecurityMode};
use crate::error::{SessionError, SessionResult};

/// A transport channel shared by every session with the same parameters.
///
/// Each RPC holds a token from the channel's tracker for its duration, so
/// [`ManagedChannel::shutdown`] can wait for in-flight calls to drain.
#[derive(Debug)]
pub struct ManagedChannel {
    id: u64,
    address: String,
    channel: Channel,
    calls: TaskTracker,
}

impl ManagedChannel {
    /// Builds a lazily connecting channel for `params`.
    ///
    /// TLS material is validated here, so bad certificates fail at connect
    /// time rather than on the first RPC.
    pub fn open(id: u64, params: &ConnectionParams, connect_timeout: Duration) -> SessionResult<Self> {
        let mut endpoint = Endpoint::from_shared(params.uri())?.connect_timeout(connect_timeout);

        if let SecurityMode::Tls(material) = &params.security {
            material.validate()?;
            let mut tls = ClientTlsConfig::new()
                .ca_certificate(Certificate::from_pem(material.ca_bundle.as_bytes()));
            if let (Some(chain), Some(key)) = (&material.client_cert_chain, &material.private_key) {
                tls = tls.identity(Identity::from_pem(chain.as_bytes(), key.as_bytes()));
            }
            if let Some(domain) = &material.domain_name {
                tls = tls.domain_name(domain.clone());
            }
            endpoint = endpoint.tls_config(tls)?;
        }

        debug!(channel = id, address = %params.address, scheme = params.security.scheme(), "Opening channel");
        Ok(Self::from_channel(id, params.address.clone(), endpoint.connect_lazy()))
    }

    /// Wraps an existing channel.
    pub fn from_channel(id: u64, address: impl Into<String>, channel: Channel) -> Self {
        Self {
            id,
            address: address.into(),
            channel,
            calls: TaskTracker::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns a clone of the underlying tonic channel.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Returns true until [`ManagedChannel::shutdown`] has been called.
    pub fn is_open(&self) -> bool {
        !self.calls.is_closed()
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }

    /// Registers a call; the returned token must live until the call completes.
    pub fn begin_call(&self) -> SessionResult<TaskTrackerToken> {
        if self.calls.is_closed() {
            return Err(SessionError::Closed {
                address: self.address.clone(),
            });
        }
        Ok(self.calls.token())
    }

    /// Refuses new calls and waits up to `grace` for in-flight calls to finish.
    pub async fn shutdown(&self, grace: Duration) -> SessionResult<()> {
        self.calls.close();
        match tokio::time::timeout(grace, self.calls.wait()).await {
            Ok(()) => {
                debug!(channel = self.id, address = %self.address, "Channel shut down");
                Ok(())
            }
            Err(_) => {
                let in_flight = self.calls.len();
                warn!(channel = self.id, address = %self.address, in_flight, "Channel shutdown timed out");
                Err(SessionError::ShutdownTimeout {
                    address: self.address.clone(),
                    grace_ms: u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                    in_flight,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_channel() -> ManagedChannel {
        let params = ConnectionParams::plaintext("127.0.0.1:9339");
        ManagedChannel::open(1, &params, Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn test_shutdown_without_calls() {
        let channel = lazy_channel();
        assert!(channel.is_open());
        channel.shutdown(Duration::from_millis(50)).await.unwrap();
        assert!(!channel.is_open());
        assert!(matches!(
            channel.begin_call(),
            Err(SessionError::Closed { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_call() {
        let channel = lazy_channel();
        let token = channel.begin_call().unwrap();
        assert_eq!(channel.in_flight(), 1);

        let dropper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(token);
        });
        channel.shutdown(Duration::from_secs(2)).await.unwrap();
        dropper.await.unwrap();
        assert_eq!(channel.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_timeout_is_an_error() {
        let channel = lazy_channel();
        let _token = channel.begin_call().unwrap();
        let err = channel.shutdown(Duration::from_millis(10)).await.unwrap_err();
        match err {
            SessionError::ShutdownTimeout { in_flight, grace_ms, .. } => {
                assert_eq!(in_flight, 1);
                assert_eq!(grace_ms, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_tls_without_material_fails_at_open() {
        let params = ConnectionParams::tls("127.0.0.1:9339", Default::default());
        let err = ManagedChannel::open(2, &params, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SessionError::Configuration { .. }));
    }
}

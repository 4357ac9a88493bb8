//! Device Connection Manager.
//!
//! Keeps at most one connection per device id. A connect attempt occupies
//! the device's slot as `Pending` until the session is up and capabilities
//! are negotiated; transactions requested meanwhile fail with
//! [`DeviceError::ConnectionPending`] instead of waiting or reaching a stale
//! session.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gnmi_connector::broker::{BrokerOptions, ReadOnlyTransaction, ReadWriteTransaction, WriteTransaction};
use gnmi_connector::{
    ConnectionParams, GnmiDataBroker, GnmiSession, JsonEncoding, PathCodec, SessionHandle,
    SessionProvider, UpdateCodec,
};
use gnmi_proto::gnmi::{CapabilityRequest, ModelData};
use gnmi_yang::SchemaContext;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::DeviceConfig;
use crate::error::{DeviceError, DeviceResult};
use crate::store::ConnectionState;

/// Settings shared by every device connection.
#[derive(Debug, Clone)]
pub struct ConnectionManagerConfig {
    pub encoding: JsonEncoding,
    /// Deadline for each of session creation and capability negotiation.
    pub connect_timeout: Duration,
}

impl Default for ConnectionManagerConfig {
    fn default() -> Self {
        Self {
            encoding: JsonEncoding::JsonIetf,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// The live binding of one device: session, codecs and parameters.
#[derive(Debug)]
pub struct DeviceConnection {
    device: String,
    params: ConnectionParams,
    broker: GnmiDataBroker,
    capabilities: Vec<String>,
}

impl DeviceConnection {
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn broker(&self) -> &GnmiDataBroker {
        &self.broker
    }

    pub fn session(&self) -> &Arc<dyn GnmiSession> {
        self.broker.session()
    }

    /// Models advertised by the device at connect time.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }
}

#[derive(Debug)]
enum Slot {
    Pending {
        generation: u64,
        cancel: CancellationToken,
    },
    Ready {
        config: DeviceConfig,
        connection: Arc<DeviceConnection>,
        handle: SessionHandle,
    },
    Failed {
        reason: String,
    },
}

/// Connects, reconnects and disconnects devices by id.
pub struct DeviceConnectionManager {
    provider: Arc<dyn SessionProvider>,
    schema: Arc<SchemaContext>,
    config: ConnectionManagerConfig,
    slots: Mutex<HashMap<String, Slot>>,
    next_generation: AtomicU64,
}

impl fmt::Debug for DeviceConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConnectionManager")
            .field("config", &self.config)
            .field("devices", &self.slots.lock().len())
            .finish()
    }
}

impl DeviceConnectionManager {
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        schema: Arc<SchemaContext>,
        config: ConnectionManagerConfig,
    ) -> Self {
        Self {
            provider,
            schema,
            config,
            slots: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Connects `device`, replacing any connection with other parameters.
    ///
    /// Returns the existing connection when one with identical parameters
    /// is already up. Fails with [`DeviceError::Cancelled`] when a
    /// disconnect or a newer connect for the same id supersedes this attempt.
    #[instrument(skip(self, device), fields(device = %device.id))]
    pub async fn connect(&self, device: &DeviceConfig) -> DeviceResult<Arc<DeviceConnection>> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();

        let previous = {
            let mut slots = self.slots.lock();
            if let Some(Slot::Ready {
                config, connection, ..
            }) = slots.get(&device.id)
            {
                if config == device {
                    debug!("Connection already up to date");
                    return Ok(connection.clone());
                }
            }
            slots.insert(
                device.id.clone(),
                Slot::Pending {
                    generation,
                    cancel: cancel.clone(),
                },
            )
        };
        if let Some(previous) = previous {
            info!("Tearing down previous connection");
            self.teardown(&device.id, previous).await;
        }

        info!(address = %device.endpoint(), "Connecting");
        let result = self.establish(device, &cancel).await;
        self.finish(device, generation, result).await
    }

    /// Drops the device's connection or cancels its pending attempt.
    ///
    /// Returns false if the device was unknown.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, device: &str) -> bool {
        let slot = self.slots.lock().remove(device);
        match slot {
            Some(slot) => {
                info!("Disconnecting");
                self.teardown(device, slot).await;
                true
            }
            None => false,
        }
    }

    pub async fn disconnect_all(&self) {
        for device in self.device_ids() {
            self.disconnect(&device).await;
        }
    }

    /// The usable connection of `device`.
    pub fn connection(&self, device: &str) -> DeviceResult<Arc<DeviceConnection>> {
        match self.slots.lock().get(device) {
            Some(Slot::Ready { connection, .. }) => Ok(connection.clone()),
            Some(Slot::Pending { .. }) => Err(DeviceError::pending(device)),
            Some(Slot::Failed { reason }) => Err(DeviceError::failed(device, reason.clone())),
            None => Err(DeviceError::not_connected(device)),
        }
    }

    pub fn state(&self, device: &str) -> ConnectionState {
        match self.slots.lock().get(device) {
            Some(Slot::Ready { .. }) => ConnectionState::Connected,
            Some(Slot::Pending { .. }) => ConnectionState::Connecting,
            Some(Slot::Failed { .. }) => ConnectionState::Failed,
            None => ConnectionState::Disconnected,
        }
    }

    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.slots.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn connected_count(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready { .. }))
            .count()
    }

    pub fn new_read_only_transaction(&self, device: &str) -> DeviceResult<ReadOnlyTransaction> {
        Ok(self.connection(device)?.broker().new_read_only_transaction())
    }

    pub fn new_write_only_transaction(&self, device: &str) -> DeviceResult<WriteTransaction> {
        Ok(self.connection(device)?.broker().new_write_only_transaction())
    }

    pub fn new_read_write_transaction(&self, device: &str) -> DeviceResult<ReadWriteTransaction> {
        Ok(self.connection(device)?.broker().new_read_write_transaction())
    }

    async fn establish(
        &self,
        device: &DeviceConfig,
        cancel: &CancellationToken,
    ) -> DeviceResult<(SessionHandle, Arc<DeviceConnection>)> {
        let params = device.connection_params()?;
        let mapping = device.datastore_mapping()?;
        let timeout = self.config.connect_timeout;

        let handle = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DeviceError::cancelled(&device.id)),
            created = tokio::time::timeout(timeout, self.provider.create_session(&params)) => {
                created.map_err(|_| DeviceError::failed(&device.id, "timed out creating session"))??
            }
        };

        let negotiated = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DeviceError::cancelled(&device.id)),
            result = tokio::time::timeout(timeout, self.negotiate(device, handle.session())) => {
                result.unwrap_or_else(|_| {
                    Err(DeviceError::failed(&device.id, "timed out waiting for capabilities"))
                })
            }
        };
        let capabilities = match negotiated {
            Ok(capabilities) => capabilities,
            Err(e) => {
                self.release(&device.id, handle).await;
                return Err(e);
            }
        };

        let codec = UpdateCodec::new(
            PathCodec::new(
                self.schema.clone(),
                device.extensions.prefix_first_element_with_module_name,
            ),
            self.config.encoding,
        );
        let options = BrokerOptions {
            mapping,
            use_models: device.configured_models(),
        };
        let broker = GnmiDataBroker::new(device.id.clone(), handle.session().clone(), codec, options);
        let connection = Arc::new(DeviceConnection {
            device: device.id.clone(),
            params,
            broker,
            capabilities,
        });
        Ok((handle, connection))
    }

    /// Checks the device speaks the configured encoding and lists its models.
    async fn negotiate(
        &self,
        device: &DeviceConfig,
        session: &Arc<dyn GnmiSession>,
    ) -> DeviceResult<Vec<String>> {
        let response = session.capabilities(CapabilityRequest::default()).await?;

        let encoding = self.config.encoding;
        if !response.supported_encodings.contains(&(encoding.to_proto() as i32)) {
            return Err(DeviceError::failed(
                &device.id,
                format!("device does not support the {encoding} encoding"),
            ));
        }

        for model in &device.extensions.models {
            if !response.supported_models.iter().any(|m| m.name == model.name) {
                warn!(device = %device.id, model = %model.name, "Configured model not advertised by device");
            }
        }

        debug!(
            device = %device.id,
            version = %response.g_nmi_version,
            models = response.supported_models.len(),
            "Capabilities negotiated"
        );
        Ok(response.supported_models.iter().map(describe_model).collect())
    }

    async fn finish(
        &self,
        device: &DeviceConfig,
        generation: u64,
        result: DeviceResult<(SessionHandle, Arc<DeviceConnection>)>,
    ) -> DeviceResult<Arc<DeviceConnection>> {
        let id = &device.id;
        match result {
            Ok((handle, connection)) => {
                let stale = {
                    let mut slots = self.slots.lock();
                    if is_current(&slots, id, generation) {
                        slots.insert(
                            id.clone(),
                            Slot::Ready {
                                config: device.clone(),
                                connection: connection.clone(),
                                handle,
                            },
                        );
                        None
                    } else {
                        Some(handle)
                    }
                };
                if let Some(handle) = stale {
                    debug!(device = %id, "Connect attempt superseded");
                    self.release(id, handle).await;
                    return Err(DeviceError::cancelled(id));
                }
                info!(device = %id, models = connection.capabilities.len(), "Connected");
                Ok(connection)
            }
            Err(e) if e.is_cancellation() => {
                debug!(device = %id, "Connect attempt cancelled");
                Err(e)
            }
            Err(e) => {
                let reason = match e {
                    DeviceError::ConnectionFailed { reason, .. } => reason,
                    other => other.to_string(),
                };
                {
                    let mut slots = self.slots.lock();
                    if !is_current(&slots, id, generation) {
                        return Err(DeviceError::cancelled(id));
                    }
                    slots.insert(
                        id.clone(),
                        Slot::Failed {
                            reason: reason.clone(),
                        },
                    );
                }
                warn!(device = %id, %reason, "Connect failed");
                Err(DeviceError::failed(id, reason))
            }
        }
    }

    async fn teardown(&self, device: &str, slot: Slot) {
        match slot {
            Slot::Pending { cancel, .. } => cancel.cancel(),
            Slot::Ready { handle, .. } => self.release(device, handle).await,
            Slot::Failed { .. } => {}
        }
    }

    async fn release(&self, device: &str, handle: SessionHandle) {
        if let Err(e) = self.provider.close_session(handle).await {
            warn!(device, error = %e, "Failed to close session");
        }
    }
}

fn is_current(slots: &HashMap<String, Slot>, device: &str, generation: u64) -> bool {
    matches!(
        slots.get(device),
        Some(Slot::Pending { generation: current, .. }) if *current == generation
    )
}

fn describe_model(model: &ModelData) -> String {
    if model.version.is_empty() {
        model.name.clone()
    } else {
        format!("{}@{}", model.name, model.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use gnmi_connector::session::mock::{model, MockSessionProvider};
    use gnmi_connector::session::Credentials;
    use gnmi_connector::SessionError;
    use gnmi_proto::gnmi::{CapabilityResponse, Encoding};
    use pretty_assertions::assert_eq;

    fn manager(provider: Arc<MockSessionProvider>) -> Arc<DeviceConnectionManager> {
        Arc::new(DeviceConnectionManager::new(
            provider,
            Arc::new(SchemaContext::empty()),
            ConnectionManagerConfig::default(),
        ))
    }

    fn leaf1() -> DeviceConfig {
        DeviceConfig::plaintext("leaf1", "10.0.0.1", 9339)
    }

    #[tokio::test]
    async fn test_connect_and_reuse() {
        let provider = Arc::new(MockSessionProvider::new());
        provider.push_capabilities(
            "10.0.0.1:9339",
            Ok(CapabilityResponse {
                supported_models: vec![model("openconfig-interfaces", "OpenConfig", "2.5.0")],
                supported_encodings: vec![Encoding::JsonIetf as i32],
                g_nmi_version: "0.8.0".into(),
            }),
        );
        let manager = manager(provider.clone());

        let first = manager.connect(&leaf1()).await.unwrap();
        assert_eq!(first.capabilities(), &["openconfig-interfaces@2.5.0".to_string()]);
        assert_eq!(manager.state("leaf1"), ConnectionState::Connected);

        let second = manager.connect(&leaf1()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.created().len(), 1);
        assert!(manager.new_write_only_transaction("leaf1").is_ok());
    }

    #[tokio::test]
    async fn test_changed_params_replace_connection() {
        let provider = Arc::new(MockSessionProvider::new());
        let manager = manager(provider.clone());
        manager.connect(&leaf1()).await.unwrap();

        let mut changed = leaf1();
        changed.username = Some("admin".into());
        changed.password = Some("admin".into());
        let connection = manager.connect(&changed).await.unwrap();

        assert_eq!(
            provider.events(),
            vec!["create 10.0.0.1:9339", "close 10.0.0.1:9339", "create 10.0.0.1:9339"]
        );
        assert_eq!(provider.live_sessions(), 1);
        assert_eq!(manager.device_ids(), vec!["leaf1"]);
        assert_eq!(
            connection.params().credentials,
            Some(Credentials::new("admin", "admin"))
        );
    }

    #[tokio::test]
    async fn test_pending_connection_refuses_transactions() {
        let provider = Arc::new(MockSessionProvider::new());
        provider.set_create_delay(Duration::from_millis(200));
        let manager = manager(provider.clone());

        let connecting = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.connect(&leaf1()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(manager.state("leaf1"), ConnectionState::Connecting);
        let err = manager.new_read_only_transaction("leaf1").unwrap_err();
        assert!(matches!(err, DeviceError::ConnectionPending { .. }));

        connecting.await.unwrap().unwrap();
        assert!(manager.new_read_only_transaction("leaf1").is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending_connect() {
        let provider = Arc::new(MockSessionProvider::new());
        provider.set_create_delay(Duration::from_millis(200));
        let manager = manager(provider.clone());

        let connecting = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.connect(&leaf1()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(manager.disconnect("leaf1").await);

        let err = connecting.await.unwrap().unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(provider.live_sessions(), 0);
        assert_eq!(manager.state("leaf1"), ConnectionState::Disconnected);
        assert!(matches!(
            manager.connection("leaf1"),
            Err(DeviceError::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_connect_is_recorded_in_slot() {
        let provider = Arc::new(MockSessionProvider::new());
        provider.fail_address("10.0.0.1:9339", "connection refused");
        let manager = manager(provider);

        let err = manager.connect(&leaf1()).await.unwrap_err();
        match &err {
            DeviceError::ConnectionFailed { device, reason } => {
                assert_eq!(device, "leaf1");
                assert!(reason.contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(manager.state("leaf1"), ConnectionState::Failed);
        assert!(matches!(
            manager.new_read_only_transaction("leaf1"),
            Err(DeviceError::ConnectionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_encoding_negotiation_failure_releases_session() {
        let provider = Arc::new(MockSessionProvider::new());
        provider.push_capabilities(
            "10.0.0.1:9339",
            Ok(CapabilityResponse {
                supported_encodings: vec![Encoding::Proto as i32],
                ..Default::default()
            }),
        );
        let manager = manager(provider.clone());

        let err = manager.connect(&leaf1()).await.unwrap_err();
        assert!(err.to_string().contains("json_ietf"));
        assert_eq!(provider.live_sessions(), 0);
        assert_eq!(provider.events(), vec!["create 10.0.0.1:9339", "close 10.0.0.1:9339"]);
    }

    #[tokio::test]
    async fn test_capability_rpc_error_fails_connect() {
        let provider = Arc::new(MockSessionProvider::new());
        provider.push_capabilities(
            "10.0.0.1:9339",
            Err(SessionError::Rpc(tonic::Status::unauthenticated("bad password"))),
        );
        let manager = manager(provider.clone());
        let err = manager.connect(&leaf1()).await.unwrap_err();
        assert!(matches!(err, DeviceError::ConnectionFailed { .. }));
        assert!(err.to_string().contains("bad password"));
        assert_eq!(provider.live_sessions(), 0);
    }

    #[tokio::test]
    async fn test_configured_models_become_use_models() {
        let provider = Arc::new(MockSessionProvider::new());
        let manager = manager(provider);
        let mut device = leaf1();
        device.extensions.models = vec![ModelConfig {
            name: "openconfig-interfaces".into(),
            organization: "OpenConfig".into(),
            version: "2.5.0".into(),
        }];

        let connection = manager.connect(&device).await.unwrap();
        assert_eq!(
            connection.broker().options().use_models,
            vec![model("openconfig-interfaces", "OpenConfig", "2.5.0")]
        );
        assert!(connection.capabilities().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_all() {
        let provider = Arc::new(MockSessionProvider::new());
        let manager = manager(provider.clone());
        manager.connect(&leaf1()).await.unwrap();
        manager
            .connect(&DeviceConfig::plaintext("leaf2", "10.0.0.2", 9339))
            .await
            .unwrap();
        assert_eq!(manager.connected_count(), 2);

        manager.disconnect_all().await;
        assert_eq!(manager.connected_count(), 0);
        assert_eq!(provider.live_sessions(), 0);
        assert!(!manager.disconnect("leaf1").await);
    }
}

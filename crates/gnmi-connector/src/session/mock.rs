//! Scriptable in-memory sessions for tests.
//!
//! [`MockSession`] records every request and answers from per-RPC queues;
//! an empty queue yields an empty successful response. [`MockSessionProvider`]
//! hands out mock sessions and keeps per-parameter counts the way the real
//! manager does.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use gnmi_proto::gnmi::{
    CapabilityRequest, CapabilityResponse, Encoding, GetRequest, GetResponse, ModelData,
    SetRequest, SetResponse, SubscribeRequest, SubscribeResponse,
};
use gnmi_proto::gnoi::{cert, file, os, system};
use parking_lot::Mutex;

use super::{ConnectionParams, GnmiSession, SessionHandle, SessionProvider, SubscribeStream};
use crate::error::{SessionError, SessionResult};

#[derive(Debug, Default)]
struct MockState {
    closed: bool,
    capabilities: VecDeque<SessionResult<CapabilityResponse>>,
    get_responses: VecDeque<SessionResult<GetResponse>>,
    set_responses: VecDeque<SessionResult<SetResponse>>,
    subscribe_updates: Vec<SubscribeResponse>,
    get_requests: Vec<GetRequest>,
    set_requests: Vec<SetRequest>,
    subscribe_requests: Vec<SubscribeRequest>,
    calls: Vec<&'static str>,
}

/// A recording, scriptable [`GnmiSession`].
#[derive(Debug, Default)]
pub struct MockSession {
    address: String,
    latency: Option<Duration>,
    state: Mutex<MockState>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Delays every response, to keep calls in flight.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_capabilities(&self, response: SessionResult<CapabilityResponse>) {
        self.state.lock().capabilities.push_back(response);
    }

    pub fn push_get(&self, response: SessionResult<GetResponse>) {
        self.state.lock().get_responses.push_back(response);
    }

    pub fn push_set(&self, response: SessionResult<SetResponse>) {
        self.state.lock().set_responses.push_back(response);
    }

    /// Updates replayed to every subscriber.
    pub fn set_subscribe_updates(&self, updates: Vec<SubscribeResponse>) {
        self.state.lock().subscribe_updates = updates;
    }

    pub fn get_requests(&self) -> Vec<GetRequest> {
        self.state.lock().get_requests.clone()
    }

    pub fn set_requests(&self) -> Vec<SetRequest> {
        self.state.lock().set_requests.clone()
    }

    pub fn subscribe_requests(&self) -> Vec<SubscribeRequest> {
        self.state.lock().subscribe_requests.clone()
    }

    /// Names of the RPCs issued so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    /// Makes every later call fail with [`SessionError::Closed`].
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    async fn enter(&self, rpc: &'static str) -> SessionResult<()> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(SessionError::Closed {
                    address: self.address.clone(),
                });
            }
            state.calls.push(rpc);
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }
}

/// Capabilities of a well-behaved target: JSON and JSON_IETF, no models.
pub fn default_capabilities() -> CapabilityResponse {
    CapabilityResponse {
        supported_models: Vec::new(),
        supported_encodings: vec![Encoding::Json as i32, Encoding::JsonIetf as i32],
        g_nmi_version: "0.10.0".to_string(),
    }
}

/// Builds a model descriptor.
pub fn model(name: &str, organization: &str, version: &str) -> ModelData {
    ModelData {
        name: name.to_string(),
        organization: organization.to_string(),
        version: version.to_string(),
    }
}

#[async_trait]
impl GnmiSession for MockSession {
    async fn capabilities(&self, _request: CapabilityRequest) -> SessionResult<CapabilityResponse> {
        self.enter("capabilities").await?;
        let scripted = self.state.lock().capabilities.pop_front();
        scripted.unwrap_or_else(|| Ok(default_capabilities()))
    }

    async fn get(&self, request: GetRequest) -> SessionResult<GetResponse> {
        self.enter("get").await?;
        let mut state = self.state.lock();
        state.get_requests.push(request);
        state
            .get_responses
            .pop_front()
            .unwrap_or_else(|| Ok(GetResponse::default()))
    }

    async fn set(&self, request: SetRequest) -> SessionResult<SetResponse> {
        self.enter("set").await?;
        let mut state = self.state.lock();
        state.set_requests.push(request);
        state
            .set_responses
            .pop_front()
            .unwrap_or_else(|| Ok(SetResponse::default()))
    }

    async fn subscribe(
        &self,
        mut requests: BoxStream<'static, SubscribeRequest>,
    ) -> SessionResult<SubscribeStream> {
        self.enter("subscribe").await?;
        if let Some(first) = requests.next().await {
            self.state.lock().subscribe_requests.push(first);
        }
        let updates = self.state.lock().subscribe_updates.clone();
        Ok(futures::stream::iter(updates.into_iter().map(Ok)).boxed())
    }

    async fn time(&self) -> SessionResult<system::TimeResponse> {
        self.enter("time").await?;
        Ok(system::TimeResponse {
            time: 1_700_000_000_000_000_000,
        })
    }

    async fn reboot(&self, _request: system::RebootRequest) -> SessionResult<system::RebootResponse> {
        self.enter("reboot").await?;
        Ok(system::RebootResponse {})
    }

    async fn verify_os(&self) -> SessionResult<os::VerifyResponse> {
        self.enter("verify_os").await?;
        Ok(os::VerifyResponse {
            version: "mock-1.0".to_string(),
            activation_fail_message: String::new(),
        })
    }

    async fn stat_file(&self, path: &str) -> SessionResult<file::StatResponse> {
        self.enter("stat_file").await?;
        Ok(file::StatResponse {
            stats: vec![file::StatInfo {
                path: path.to_string(),
                ..Default::default()
            }],
        })
    }

    async fn remove_file(&self, _path: &str) -> SessionResult<()> {
        self.enter("remove_file").await
    }

    async fn get_certificates(&self) -> SessionResult<cert::GetCertificatesResponse> {
        self.enter("get_certificates").await?;
        Ok(cert::GetCertificatesResponse::default())
    }
}

#[derive(Debug, Default)]
struct ProviderState {
    sessions: HashMap<u64, (ConnectionParams, Arc<MockSession>)>,
    ref_counts: HashMap<ConnectionParams, usize>,
    created: Vec<ConnectionParams>,
    closed: Vec<ConnectionParams>,
    failures: HashMap<String, String>,
    capabilities: HashMap<String, VecDeque<SessionResult<CapabilityResponse>>>,
    events: Vec<String>,
}

/// A [`SessionProvider`] handing out [`MockSession`]s.
#[derive(Debug, Default)]
pub struct MockSessionProvider {
    state: Mutex<ProviderState>,
    next_id: AtomicU64,
    create_delay: Mutex<Option<Duration>>,
}

impl MockSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes session creation for `address` fail with a configuration error.
    pub fn fail_address(&self, address: impl Into<String>, message: impl Into<String>) {
        self.state
            .lock()
            .failures
            .insert(address.into(), message.into());
    }

    /// Scripts the capability answer of the next session created for `address`.
    pub fn push_capabilities(&self, address: impl Into<String>, response: SessionResult<CapabilityResponse>) {
        self.state
            .lock()
            .capabilities
            .entry(address.into())
            .or_default()
            .push_back(response);
    }

    /// Delays session creation, to keep connect attempts pending.
    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock() = Some(delay);
    }

    /// Live session for `params`, most recent first.
    pub fn session_for(&self, params: &ConnectionParams) -> Option<Arc<MockSession>> {
        let state = self.state.lock();
        state
            .sessions
            .iter()
            .filter(|(_, (p, _))| p == params)
            .max_by_key(|(id, _)| **id)
            .map(|(_, (_, session))| session.clone())
    }

    /// Parameters of every session created, in order.
    pub fn created(&self) -> Vec<ConnectionParams> {
        self.state.lock().created.clone()
    }

    /// Parameters of every session closed, in order.
    pub fn closed(&self) -> Vec<ConnectionParams> {
        self.state.lock().closed.clone()
    }

    /// `create <address>` / `close <address>` in call order.
    pub fn events(&self) -> Vec<String> {
        self.state.lock().events.clone()
    }

    pub fn live_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn ref_counts(&self) -> HashMap<ConnectionParams, usize> {
        self.state.lock().ref_counts.clone()
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    async fn create_session(&self, params: &ConnectionParams) -> SessionResult<SessionHandle> {
        let delay = *self.create_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if let Some(message) = state.failures.get(&params.address) {
            return Err(SessionError::configuration("address", message.clone()));
        }
        let session = Arc::new(MockSession::with_address(params.address.clone()));
        if let Some(queue) = state.capabilities.get_mut(&params.address) {
            if let Some(response) = queue.pop_front() {
                session.push_capabilities(response);
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        state.sessions.insert(id, (params.clone(), session.clone()));
        *state.ref_counts.entry(params.clone()).or_default() += 1;
        state.created.push(params.clone());
        state.events.push(format!("create {}", params.address));
        Ok(SessionHandle::new(id, params.clone(), session))
    }

    async fn close_session(&self, handle: SessionHandle) -> SessionResult<()> {
        let mut state = self.state.lock();
        let (params, session) = state
            .sessions
            .remove(&handle.id())
            .ok_or(SessionError::UnknownSession(handle.id()))?;
        session.close();
        if let Some(count) = state.ref_counts.get_mut(&params) {
            *count -= 1;
            if *count == 0 {
                state.ref_counts.remove(&params);
            }
        }
        state.events.push(format!("close {}", params.address));
        state.closed.push(params);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_requests_and_replays_responses() {
        let session = MockSession::new();
        session.push_get(Err(SessionError::Rpc(tonic::Status::not_found("gone"))));

        let err = session.get(GetRequest::default()).await.unwrap_err();
        assert!(err.is_not_found());
        let ok = session.get(GetRequest::default()).await.unwrap();
        assert!(ok.notification.is_empty());

        assert_eq!(session.get_requests().len(), 2);
        assert_eq!(session.calls(), vec!["get", "get"]);
    }

    #[tokio::test]
    async fn test_closed_mock_fails() {
        let session = MockSession::with_address("10.0.0.1:9339");
        session.close();
        assert!(matches!(
            session.set(SetRequest::default()).await,
            Err(SessionError::Closed { .. })
        ));
    }

    #[tokio::test]
    async fn test_provider_tracks_ref_counts() {
        let provider = MockSessionProvider::new();
        let params = ConnectionParams::plaintext("10.0.0.1:9339");
        let a = provider.create_session(&params).await.unwrap();
        let b = provider.create_session(&params).await.unwrap();
        assert_eq!(provider.ref_counts().get(&params), Some(&2));

        provider.close_session(a).await.unwrap();
        provider.close_session(b).await.unwrap();
        assert!(provider.ref_counts().is_empty());
        assert_eq!(
            provider.events(),
            vec![
                "create 10.0.0.1:9339",
                "create 10.0.0.1:9339",
                "close 10.0.0.1:9339",
                "close 10.0.0.1:9339"
            ]
        );
    }

    #[tokio::test]
    async fn test_subscribe_replays_updates() {
        let session = MockSession::new();
        session.set_subscribe_updates(vec![SubscribeResponse {
            response: Some(gnmi_proto::gnmi::subscribe_response::Response::SyncResponse(true)),
        }]);
        let requests = futures::stream::iter(vec![SubscribeRequest::default()]).boxed();
        let stream = session.subscribe(requests).await.unwrap();
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(session.subscribe_requests().len(), 1);
    }
}

//! gRPC-backed session.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use gnmi_proto::gnmi::{
    CapabilityRequest, CapabilityResponse, GetRequest, GetResponse, GnmiClient, SetRequest,
    SetResponse, SubscribeRequest,
};
use gnmi_proto::gnoi::{cert, file, os, system, GnoiClient};
use gnmi_proto::RpcClient;
use tonic::metadata::{AsciiMetadataValue, MetadataValue};
use tonic::Request;

use super::{Credentials, GnmiSession, ManagedChannel, SubscribeStream};
use crate::error::{SessionError, SessionResult};

/// Adds `username`/`password` metadata to every outgoing call.
#[derive(Debug, Clone)]
pub struct CredentialAttacher {
    username: AsciiMetadataValue,
    password: AsciiMetadataValue,
}

impl CredentialAttacher {
    pub fn new(credentials: &Credentials) -> SessionResult<Self> {
        let username = MetadataValue::try_from(credentials.username.as_str())
            .map_err(|e| SessionError::configuration("username", e.to_string()))?;
        let password = MetadataValue::try_from(credentials.password.as_str())
            .map_err(|e| SessionError::configuration("password", e.to_string()))?;
        Ok(Self { username, password })
    }

    pub fn attach<T>(&self, request: &mut Request<T>) {
        let metadata = request.metadata_mut();
        metadata.insert("username", self.username.clone());
        metadata.insert("password", self.password.clone());
    }
}

/// A session issuing real RPCs over a shared [`ManagedChannel`].
#[derive(Debug)]
pub struct GrpcSession {
    channel: Arc<ManagedChannel>,
    credentials: Option<CredentialAttacher>,
    gnmi: GnmiClient,
    gnoi: GnoiClient,
}

impl GrpcSession {
    pub fn new(channel: Arc<ManagedChannel>, credentials: Option<CredentialAttacher>) -> Self {
        let rpc = RpcClient::new(channel.channel());
        Self {
            gnmi: GnmiClient::new(rpc.clone()),
            gnoi: GnoiClient::new(rpc),
            channel,
            credentials,
        }
    }

    pub fn channel(&self) -> &Arc<ManagedChannel> {
        &self.channel
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(credentials) = &self.credentials {
            credentials.attach(&mut request);
        }
        request
    }
}

#[async_trait]
impl GnmiSession for GrpcSession {
    async fn capabilities(&self, request: CapabilityRequest) -> SessionResult<CapabilityResponse> {
        let _call = self.channel.begin_call()?;
        let response = self.gnmi.clone().capabilities(self.request(request)).await?;
        Ok(response.into_inner())
    }

    async fn get(&self, request: GetRequest) -> SessionResult<GetResponse> {
        let _call = self.channel.begin_call()?;
        let response = self.gnmi.clone().get(self.request(request)).await?;
        Ok(response.into_inner())
    }

    async fn set(&self, request: SetRequest) -> SessionResult<SetResponse> {
        let _call = self.channel.begin_call()?;
        let response = self.gnmi.clone().set(self.request(request)).await?;
        Ok(response.into_inner())
    }

    async fn subscribe(
        &self,
        requests: BoxStream<'static, SubscribeRequest>,
    ) -> SessionResult<SubscribeStream> {
        // Only stream establishment is tracked; a long-lived subscription
        // must not hold channel shutdown hostage.
        let _call = self.channel.begin_call()?;
        let response = self.gnmi.clone().subscribe(self.request(requests)).await?;
        Ok(response
            .into_inner()
            .map(|item| item.map_err(SessionError::from))
            .boxed())
    }

    async fn time(&self) -> SessionResult<system::TimeResponse> {
        let _call = self.channel.begin_call()?;
        let response = self
            .gnoi
            .clone()
            .time(self.request(system::TimeRequest {}))
            .await?;
        Ok(response.into_inner())
    }

    async fn reboot(&self, request: system::RebootRequest) -> SessionResult<system::RebootResponse> {
        let _call = self.channel.begin_call()?;
        let response = self.gnoi.clone().reboot(self.request(request)).await?;
        Ok(response.into_inner())
    }

    async fn verify_os(&self) -> SessionResult<os::VerifyResponse> {
        let _call = self.channel.begin_call()?;
        let response = self
            .gnoi
            .clone()
            .verify(self.request(os::VerifyRequest {}))
            .await?;
        Ok(response.into_inner())
    }

    async fn stat_file(&self, path: &str) -> SessionResult<file::StatResponse> {
        let _call = self.channel.begin_call()?;
        let request = file::StatRequest {
            path: path.to_string(),
        };
        let response = self.gnoi.clone().stat(self.request(request)).await?;
        Ok(response.into_inner())
    }

    async fn remove_file(&self, path: &str) -> SessionResult<()> {
        let _call = self.channel.begin_call()?;
        let request = file::RemoveRequest {
            remote_file: path.to_string(),
        };
        self.gnoi.clone().remove(self.request(request)).await?;
        Ok(())
    }

    async fn get_certificates(&self) -> SessionResult<cert::GetCertificatesResponse> {
        let _call = self.channel.begin_call()?;
        let response = self
            .gnoi
            .clone()
            .get_certificates(self.request(cert::GetCertificatesRequest {}))
            .await?;
        Ok(response.into_inner())
    }
}

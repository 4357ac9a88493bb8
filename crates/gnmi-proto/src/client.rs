//! Shared unary/streaming call plumbing for the hand-written client stubs.

use tonic::client::Grpc;
use tonic::codec::{ProstCodec, Streaming};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tonic::{GrpcMethod, Request, Response, Status};

/// A gRPC client bound to one channel, shared by all service stubs.
#[derive(Debug, Clone)]
pub struct RpcClient {
    inner: Grpc<Channel>,
}

impl RpcClient {
    /// Creates a client over an established (or lazily connecting) channel.
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: Grpc::new(channel),
        }
    }

    async fn ready(&mut self) -> Result<(), Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unavailable(format!("service was not ready: {e}")))
    }

    /// Issues a unary call to `/{service}/{method}`.
    pub async fn unary<Req, Resp>(
        &mut self,
        mut request: Request<Req>,
        service: &'static str,
        method: &'static str,
        path: &'static str,
    ) -> Result<Response<Resp>, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        self.ready().await?;
        request
            .extensions_mut()
            .insert(GrpcMethod::new(service, method));
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        self.inner
            .unary(request, PathAndQuery::from_static(path), codec)
            .await
    }

    /// Issues a bidirectional streaming call to `/{service}/{method}`.
    pub async fn streaming<S, Req, Resp>(
        &mut self,
        mut request: Request<S>,
        service: &'static str,
        method: &'static str,
        path: &'static str,
    ) -> Result<Response<Streaming<Resp>>, Status>
    where
        S: futures::Stream<Item = Req> + Send + 'static,
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        self.ready().await?;
        request
            .extensions_mut()
            .insert(GrpcMethod::new(service, method));
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        self.inner
            .streaming(request, PathAndQuery::from_static(path), codec)
            .await
    }
}

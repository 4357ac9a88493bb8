//! gNOI operational services: system, os, file and certificate management.

use tonic::{Request, Response, Status};

use crate::RpcClient;

pub mod system {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TimeRequest {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TimeResponse {
        /// Nanoseconds since the epoch.
        #[prost(uint64, tag = "1")]
        pub time: u64,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum RebootMethod {
        Unknown = 0,
        Cold = 1,
        Powerdown = 2,
        Halt = 3,
        Warm = 4,
        Nsf = 5,
        Powerup = 7,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RebootRequest {
        #[prost(enumeration = "RebootMethod", tag = "1")]
        pub method: i32,
        /// Delay in nanoseconds before the reboot is issued.
        #[prost(uint64, tag = "2")]
        pub delay: u64,
        #[prost(string, tag = "3")]
        pub message: String,
        #[prost(bool, tag = "5")]
        pub force: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RebootResponse {}
}

pub mod os {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct VerifyRequest {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct VerifyResponse {
        #[prost(string, tag = "1")]
        pub version: String,
        #[prost(string, tag = "2")]
        pub activation_fail_message: String,
    }
}

pub mod file {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StatRequest {
        #[prost(string, tag = "1")]
        pub path: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StatInfo {
        #[prost(string, tag = "1")]
        pub path: String,
        #[prost(uint64, tag = "2")]
        pub last_modified: u64,
        #[prost(uint32, tag = "3")]
        pub permissions: u32,
        #[prost(uint64, tag = "4")]
        pub size: u64,
        #[prost(uint32, tag = "5")]
        pub umask: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StatResponse {
        #[prost(message, repeated, tag = "1")]
        pub stats: Vec<StatInfo>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RemoveRequest {
        #[prost(string, tag = "1")]
        pub remote_file: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RemoveResponse {}
}

pub mod cert {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum CertificateType {
        Unknown = 0,
        X509 = 1,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Certificate {
        #[prost(enumeration = "CertificateType", tag = "1")]
        pub r#type: i32,
        #[prost(bytes, tag = "2")]
        pub certificate: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CertificateInfo {
        #[prost(string, tag = "1")]
        pub certificate_id: String,
        #[prost(message, optional, tag = "2")]
        pub certificate: Option<Certificate>,
        #[prost(int64, tag = "4")]
        pub modification_time: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetCertificatesRequest {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetCertificatesResponse {
        #[prost(message, repeated, tag = "1")]
        pub certificate_info: Vec<CertificateInfo>,
    }
}

/// Client stub for the gNOI services a target exposes on the gNMI port.
#[derive(Debug, Clone)]
pub struct GnoiClient {
    inner: RpcClient,
}

impl GnoiClient {
    pub fn new(inner: RpcClient) -> Self {
        Self { inner }
    }

    pub async fn time(
        &mut self,
        request: Request<system::TimeRequest>,
    ) -> Result<Response<system::TimeResponse>, Status> {
        self.inner
            .unary(request, "gnoi.system.System", "Time", "/gnoi.system.System/Time")
            .await
    }

    pub async fn reboot(
        &mut self,
        request: Request<system::RebootRequest>,
    ) -> Result<Response<system::RebootResponse>, Status> {
        self.inner
            .unary(request, "gnoi.system.System", "Reboot", "/gnoi.system.System/Reboot")
            .await
    }

    pub async fn verify(
        &mut self,
        request: Request<os::VerifyRequest>,
    ) -> Result<Response<os::VerifyResponse>, Status> {
        self.inner
            .unary(request, "gnoi.os.OS", "Verify", "/gnoi.os.OS/Verify")
            .await
    }

    pub async fn stat(
        &mut self,
        request: Request<file::StatRequest>,
    ) -> Result<Response<file::StatResponse>, Status> {
        self.inner
            .unary(request, "gnoi.file.File", "Stat", "/gnoi.file.File/Stat")
            .await
    }

    pub async fn remove(
        &mut self,
        request: Request<file::RemoveRequest>,
    ) -> Result<Response<file::RemoveResponse>, Status> {
        self.inner
            .unary(request, "gnoi.file.File", "Remove", "/gnoi.file.File/Remove")
            .await
    }

    pub async fn get_certificates(
        &mut self,
        request: Request<cert::GetCertificatesRequest>,
    ) -> Result<Response<cert::GetCertificatesResponse>, Status> {
        self.inner
            .unary(
                request,
                "gnoi.certificate.CertificateManagement",
                "GetCertificates",
                "/gnoi.certificate.CertificateManagement/GetCertificates",
            )
            .await
    }
}

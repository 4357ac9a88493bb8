//! Sessions to gNMI targets and the channel-sharing session manager.
//!
//! A [`SessionHandle`] wraps one [`GnmiSession`]; many sessions with equal
//! [`ConnectionParams`] share a single reference-counted transport channel
//! owned by the [`SessionManager`].

mod channel;
mod grpc;
mod manager;
pub mod mock;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use gnmi_proto::gnmi::{
    CapabilityRequest, CapabilityResponse, GetRequest, GetResponse, SetRequest, SetResponse,
    SubscribeRequest, SubscribeResponse,
};
use gnmi_proto::gnoi::{cert, file, os, system};

use crate::error::{SessionError, SessionResult};

pub use channel::ManagedChannel;
pub use grpc::{CredentialAttacher, GrpcSession};
pub use manager::{ChannelSnapshot, SessionManager, SessionManagerConfig};

/// Stream of subscription updates returned by [`GnmiSession::subscribe`].
pub type SubscribeStream = BoxStream<'static, SessionResult<SubscribeResponse>>;

/// Username/password pair attached as call metadata.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// PEM-encoded TLS material.
///
/// The CA bundle authenticates the target; the client chain and private key
/// are optional but must be given together.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct TlsMaterial {
    pub ca_bundle: String,
    pub client_cert_chain: Option<String>,
    pub private_key: Option<String>,
    /// Overrides the server name checked against the target certificate.
    pub domain_name: Option<String>,
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca_bundle_len", &self.ca_bundle.len())
            .field("client_cert_chain", &self.client_cert_chain.is_some())
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("domain_name", &self.domain_name)
            .finish()
    }
}

impl TlsMaterial {
    /// Checks that every PEM blob parses and holds the expected items.
    pub fn validate(&self) -> SessionResult<()> {
        let ca_count = count_certificates("tls.ca_bundle", &self.ca_bundle)?;
        if ca_count == 0 {
            return Err(SessionError::configuration(
                "tls.ca_bundle",
                "no certificate found in CA bundle",
            ));
        }

        match (&self.client_cert_chain, &self.private_key) {
            (None, None) => Ok(()),
            (Some(chain), Some(key)) => {
                if count_certificates("tls.client_cert_chain", chain)? == 0 {
                    return Err(SessionError::configuration(
                        "tls.client_cert_chain",
                        "no certificate found in client certificate chain",
                    ));
                }
                let parsed = rustls_pemfile::private_key(&mut key.as_bytes())
                    .map_err(|e| SessionError::configuration("tls.private_key", e.to_string()))?;
                if parsed.is_none() {
                    return Err(SessionError::configuration(
                        "tls.private_key",
                        "no private key found",
                    ));
                }
                Ok(())
            }
            (Some(_), None) => Err(SessionError::configuration(
                "tls.private_key",
                "client certificate chain given without a private key",
            )),
            (None, Some(_)) => Err(SessionError::configuration(
                "tls.client_cert_chain",
                "private key given without a client certificate chain",
            )),
        }
    }
}

fn count_certificates(field: &str, pem: &str) -> SessionResult<usize> {
    let mut count = 0;
    for cert in rustls_pemfile::certs(&mut pem.as_bytes()) {
        cert.map_err(|e| SessionError::configuration(field, e.to_string()))?;
        count += 1;
    }
    Ok(count)
}

/// Transport security of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SecurityMode {
    Plaintext,
    Tls(TlsMaterial),
}

impl SecurityMode {
    pub fn scheme(&self) -> &'static str {
        match self {
            SecurityMode::Plaintext => "http",
            SecurityMode::Tls(_) => "https",
        }
    }
}

/// Everything needed to reach one target.
///
/// Equality and hashing cover every field: this is the channel cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionParams {
    /// `host:port` of the target.
    pub address: String,
    pub security: SecurityMode,
    pub credentials: Option<Credentials>,
}

impl ConnectionParams {
    /// Plaintext parameters without credentials.
    pub fn plaintext(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            security: SecurityMode::Plaintext,
            credentials: None,
        }
    }

    /// TLS parameters without credentials.
    pub fn tls(address: impl Into<String>, material: TlsMaterial) -> Self {
        Self {
            address: address.into(),
            security: SecurityMode::Tls(material),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Returns the URI used to build the transport endpoint.
    pub fn uri(&self) -> String {
        format!("{}://{}", self.security.scheme(), self.address)
    }
}

/// RPC surface of one session.
///
/// All calls are asynchronous and never block the caller's thread. A call
/// on a session whose channel has been shut down fails with
/// [`SessionError::Closed`].
#[async_trait]
pub trait GnmiSession: Send + Sync + fmt::Debug {
    async fn capabilities(&self, request: CapabilityRequest) -> SessionResult<CapabilityResponse>;

    async fn get(&self, request: GetRequest) -> SessionResult<GetResponse>;

    async fn set(&self, request: SetRequest) -> SessionResult<SetResponse>;

    /// Opens a bidirectional subscription stream.
    async fn subscribe(
        &self,
        requests: BoxStream<'static, SubscribeRequest>,
    ) -> SessionResult<SubscribeStream>;

    async fn time(&self) -> SessionResult<system::TimeResponse>;

    async fn reboot(&self, request: system::RebootRequest) -> SessionResult<system::RebootResponse>;

    async fn verify_os(&self) -> SessionResult<os::VerifyResponse>;

    async fn stat_file(&self, path: &str) -> SessionResult<file::StatResponse>;

    async fn remove_file(&self, path: &str) -> SessionResult<()>;

    async fn get_certificates(&self) -> SessionResult<cert::GetCertificatesResponse>;
}

/// A live session returned by [`SessionProvider::create_session`].
///
/// The handle must be given back to [`SessionProvider::close_session`] so the
/// channel reference is released.
#[derive(Debug)]
pub struct SessionHandle {
    id: u64,
    params: ConnectionParams,
    session: Arc<dyn GnmiSession>,
}

impl SessionHandle {
    pub fn new(id: u64, params: ConnectionParams, session: Arc<dyn GnmiSession>) -> Self {
        Self {
            id,
            params,
            session,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn session(&self) -> &Arc<dyn GnmiSession> {
        &self.session
    }
}

/// Creates and closes sessions.
///
/// Implemented by [`SessionManager`]; the device layer depends on this trait
/// so it can run against mocks.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn create_session(&self, params: &ConnectionParams) -> SessionResult<SessionHandle>;

    async fn close_session(&self, handle: SessionHandle) -> SessionResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOGUS_PEM: &str = "-----BEGIN CERTIFICATE-----\n!!!not base64!!!\n-----END CERTIFICATE-----\n";

    #[test]
    fn test_params_equality_covers_credentials() {
        let a = ConnectionParams::plaintext("10.0.0.1:9339");
        let b = a.clone().with_credentials(Credentials::new("admin", "admin"));
        assert_ne!(a, b);
        assert_eq!(a, ConnectionParams::plaintext("10.0.0.1:9339"));
    }

    #[test]
    fn test_uri_scheme() {
        assert_eq!(
            ConnectionParams::plaintext("10.0.0.1:9339").uri(),
            "http://10.0.0.1:9339"
        );
        let tls = ConnectionParams::tls("dev:57400", TlsMaterial::default());
        assert_eq!(tls.uri(), "https://dev:57400");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new("admin", "s3cret");
        assert!(!format!("{:?}", creds).contains("s3cret"));

        let tls = TlsMaterial {
            private_key: Some("KEYDATA".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", tls).contains("KEYDATA"));
    }

    #[test]
    fn test_tls_validation_rejects_missing_ca() {
        let err = TlsMaterial::default().validate().unwrap_err();
        assert!(matches!(err, SessionError::Configuration { ref field, .. } if field == "tls.ca_bundle"));
    }

    #[test]
    fn test_tls_validation_rejects_malformed_pem() {
        let tls = TlsMaterial {
            ca_bundle: BOGUS_PEM.into(),
            ..Default::default()
        };
        assert!(matches!(
            tls.validate(),
            Err(SessionError::Configuration { .. })
        ));
    }
}

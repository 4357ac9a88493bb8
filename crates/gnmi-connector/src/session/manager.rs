//! Channel cache with per-parameter reference counting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use super::{
    ConnectionParams, CredentialAttacher, GrpcSession, ManagedChannel, SessionHandle,
    SessionProvider,
};
use crate::error::{SessionError, SessionResult};

/// Tunables for [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Maximum wait for in-flight calls when the last session of a channel closes.
    pub shutdown_grace: Duration,
    /// Deadline for establishing the transport connection.
    pub connect_timeout: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Diagnostic copy of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub channel_id: u64,
    pub address: String,
    pub ref_count: usize,
    pub in_flight: usize,
    pub open: bool,
}

#[derive(Debug)]
struct ChannelEntry {
    channel: Arc<ManagedChannel>,
    ref_count: usize,
}

#[derive(Debug, Default)]
struct ChannelCache {
    channels: HashMap<ConnectionParams, ChannelEntry>,
    sessions: HashMap<u64, ConnectionParams>,
}

/// Owns the transport channels and hands out sessions bound to them.
///
/// Every cache and counter mutation happens under one lock, which is never
/// held across an await. A channel is in the cache if and only if at least
/// one of its sessions is open.
#[derive(Debug)]
pub struct SessionManager {
    config: SessionManagerConfig,
    cache: Mutex<ChannelCache>,
    next_channel_id: AtomicU64,
    next_session_id: AtomicU64,
}

impl SessionManager {
    pub fn new(config: SessionManagerConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(ChannelCache::default()),
            next_channel_id: AtomicU64::new(1),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Creates a session, reusing the cached channel for equal parameters.
    #[instrument(skip(self, params), fields(address = %params.address))]
    pub fn open_session(&self, params: &ConnectionParams) -> SessionResult<SessionHandle> {
        let credentials = params
            .credentials
            .as_ref()
            .map(CredentialAttacher::new)
            .transpose()?;

        let mut cache = self.cache.lock();
        let channel = match cache.channels.get_mut(params) {
            Some(entry) => {
                entry.ref_count += 1;
                debug!(channel = entry.channel.id(), ref_count = entry.ref_count, "Reusing channel");
                entry.channel.clone()
            }
            None => {
                let id = self.next_channel_id.fetch_add(1, Ordering::Relaxed);
                let channel = Arc::new(ManagedChannel::open(id, params, self.config.connect_timeout)?);
                cache.channels.insert(
                    params.clone(),
                    ChannelEntry {
                        channel: channel.clone(),
                        ref_count: 1,
                    },
                );
                info!(channel = id, "Created channel");
                channel
            }
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        cache.sessions.insert(session_id, params.clone());
        drop(cache);

        let session = GrpcSession::new(channel, credentials);
        Ok(SessionHandle::new(session_id, params.clone(), Arc::new(session)))
    }

    /// Releases a session; the last release shuts the channel down.
    ///
    /// Fails if the channel does not drain within the configured grace
    /// period. The channel is out of the cache either way.
    #[instrument(skip(self, handle), fields(session = handle.id(), address = %handle.params().address))]
    pub async fn release_session(&self, handle: SessionHandle) -> SessionResult<()> {
        let retired = {
            let mut cache = self.cache.lock();
            let params = cache
                .sessions
                .remove(&handle.id())
                .ok_or(SessionError::UnknownSession(handle.id()))?;
            let remaining = match cache.channels.get_mut(&params) {
                Some(entry) => {
                    entry.ref_count = entry.ref_count.saturating_sub(1);
                    debug!(channel = entry.channel.id(), ref_count = entry.ref_count, "Released channel reference");
                    entry.ref_count
                }
                None => 0,
            };
            if remaining == 0 {
                cache.channels.remove(&params).map(|entry| entry.channel)
            } else {
                None
            }
        };

        drop(handle);
        match retired {
            Some(channel) => {
                info!(channel = channel.id(), "Last session closed, shutting channel down");
                channel.shutdown(self.config.shutdown_grace).await
            }
            None => Ok(()),
        }
    }

    /// Copies the cache contents.
    pub fn channel_snapshot(&self) -> HashMap<ConnectionParams, ChannelSnapshot> {
        let cache = self.cache.lock();
        cache
            .channels
            .iter()
            .map(|(params, entry)| {
                (
                    params.clone(),
                    ChannelSnapshot {
                        channel_id: entry.channel.id(),
                        address: entry.channel.address().to_string(),
                        ref_count: entry.ref_count,
                        in_flight: entry.channel.in_flight(),
                        open: entry.channel.is_open(),
                    },
                )
            })
            .collect()
    }

    /// Copies the reference counters.
    pub fn ref_counts(&self) -> HashMap<ConnectionParams, usize> {
        let cache = self.cache.lock();
        cache
            .channels
            .iter()
            .map(|(params, entry)| (params.clone(), entry.ref_count))
            .collect()
    }

    pub fn channel_count(&self) -> usize {
        self.cache.lock().channels.len()
    }

    pub fn session_count(&self) -> usize {
        self.cache.lock().sessions.len()
    }

    /// Returns the cached channel for `params`, if any.
    pub fn channel_for(&self, params: &ConnectionParams) -> Option<Arc<ManagedChannel>> {
        self.cache
            .lock()
            .channels
            .get(params)
            .map(|entry| entry.channel.clone())
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionManagerConfig::default())
    }
}

#[async_trait]
impl SessionProvider for SessionManager {
    async fn create_session(&self, params: &ConnectionParams) -> SessionResult<SessionHandle> {
        self.open_session(params)
    }

    async fn close_session(&self, handle: SessionHandle) -> SessionResult<()> {
        self.release_session(handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Credentials;
    use pretty_assertions::assert_eq;

    fn params() -> ConnectionParams {
        ConnectionParams::plaintext("10.0.0.1:9339")
    }

    #[tokio::test]
    async fn test_equal_params_share_channel() {
        let manager = SessionManager::default();
        let a = manager.open_session(&params()).unwrap();
        let b = manager.open_session(&params()).unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(manager.channel_count(), 1);
        assert_eq!(manager.ref_counts().get(&params()), Some(&2));

        manager.release_session(a).await.unwrap();
        let channel = manager.channel_for(&params()).unwrap();
        assert!(channel.is_open());
        assert_eq!(manager.ref_counts().get(&params()), Some(&1));

        manager.release_session(b).await.unwrap();
        assert_eq!(manager.channel_count(), 0);
        assert!(!channel.is_open());
    }

    #[tokio::test]
    async fn test_credentials_split_channels() {
        let manager = SessionManager::default();
        let with_creds = params().with_credentials(Credentials::new("admin", "admin"));
        let _a = manager.open_session(&params()).unwrap();
        let _b = manager.open_session(&with_creds).unwrap();
        assert_eq!(manager.channel_count(), 2);
    }

    #[tokio::test]
    async fn test_refcount_invariant_over_interleaving() {
        let manager = SessionManager::default();
        let other = ConnectionParams::plaintext("10.0.0.2:9339");
        let mut live = Vec::new();
        for round in 0..4 {
            live.push(manager.open_session(&params()).unwrap());
            live.push(manager.open_session(&other).unwrap());
            if round % 2 == 1 {
                manager.release_session(live.remove(0)).await.unwrap();
            }
        }

        let snapshot = manager.channel_snapshot();
        let total: usize = snapshot.values().map(|s| s.ref_count).sum();
        assert_eq!(total, live.len());
        assert_eq!(manager.session_count(), live.len());
        assert!(snapshot.values().all(|s| s.open && s.ref_count > 0));

        for handle in live.drain(..) {
            manager.release_session(handle).await.unwrap();
        }
        assert!(manager.channel_snapshot().is_empty());
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_foreign_handle_is_rejected() {
        let manager = SessionManager::default();
        let other = SessionManager::default();
        let handle = other.open_session(&params()).unwrap();
        let err = manager.release_session(handle).await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownSession(_)));
    }

    #[tokio::test]
    async fn test_invalid_tls_leaves_cache_untouched() {
        let manager = SessionManager::default();
        let tls = ConnectionParams::tls("10.0.0.1:57400", Default::default());
        assert!(manager.open_session(&tls).is_err());
        assert_eq!(manager.channel_count(), 0);
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let manager = SessionManager::default();
        let handle = manager.open_session(&params()).unwrap();
        let snapshot = manager.channel_snapshot();
        manager.release_session(handle).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&params()].ref_count, 1);
    }
}

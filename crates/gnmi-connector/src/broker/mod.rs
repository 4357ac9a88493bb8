//! Transactional data access over one gNMI session.
//!
//! [`GnmiDataBroker`] hands out three transaction kinds:
//!
//! - [`ReadOnlyTransaction`]: one Get RPC per read; "not found" reads as `None`
//! - [`WriteTransaction`]: buffers put/merge/delete and sends one Set RPC
//!   on commit; single-use
//! - [`ReadWriteTransaction`]: a pair of the above. Reads see what the
//!   device already has, never the transaction's own uncommitted writes.
//!
//! The broker never retries. A Set is one batched request: replace
//! entries, then updates, then deletes. Whether the device applies it
//! atomically is up to the device.

mod datastore;
mod read;
mod write;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gnmi_proto::gnmi::ModelData;
use gnmi_yang::{NodeIdentifier, NormalizedNode};

use crate::codec::UpdateCodec;
use crate::error::{BrokerError, BrokerResult};
use crate::session::GnmiSession;

pub use datastore::{parse_data_type, DatastoreMapping, LogicalDatastore};
pub use read::ReadOnlyTransaction;
pub use write::{CommitInfo, OperationResult, SetOperation, WriteBuffer, WriteTransaction};

/// Per-device options of the broker.
#[derive(Debug, Clone, Default)]
pub struct BrokerOptions {
    pub mapping: DatastoreMapping,
    /// Sent as `use_models` on every Get; empty means no restriction.
    pub use_models: Vec<ModelData>,
}

#[derive(Debug)]
pub(crate) struct BrokerContext {
    device: String,
    session: Arc<dyn GnmiSession>,
    codec: UpdateCodec,
    options: BrokerOptions,
    next_tx: AtomicU64,
}

/// Entry point for transactions against one device.
#[derive(Debug, Clone)]
pub struct GnmiDataBroker {
    ctx: Arc<BrokerContext>,
}

impl GnmiDataBroker {
    pub fn new(
        device: impl Into<String>,
        session: Arc<dyn GnmiSession>,
        codec: UpdateCodec,
        options: BrokerOptions,
    ) -> Self {
        Self {
            ctx: Arc::new(BrokerContext {
                device: device.into(),
                session,
                codec,
                options,
                next_tx: AtomicU64::new(1),
            }),
        }
    }

    pub fn device(&self) -> &str {
        &self.ctx.device
    }

    pub fn codec(&self) -> &UpdateCodec {
        &self.ctx.codec
    }

    pub fn options(&self) -> &BrokerOptions {
        &self.ctx.options
    }

    pub fn session(&self) -> &Arc<dyn GnmiSession> {
        &self.ctx.session
    }

    pub fn new_read_only_transaction(&self) -> ReadOnlyTransaction {
        ReadOnlyTransaction::new(self.ctx.next_id(), self.ctx.clone())
    }

    pub fn new_write_only_transaction(&self) -> WriteTransaction {
        WriteTransaction::new(self.ctx.next_id(), self.ctx.clone())
    }

    pub fn new_read_write_transaction(&self) -> ReadWriteTransaction {
        let id = self.ctx.next_id();
        ReadWriteTransaction {
            read: ReadOnlyTransaction::new(id, self.ctx.clone()),
            write: WriteTransaction::new(id, self.ctx.clone()),
        }
    }
}

impl BrokerContext {
    fn next_id(&self) -> u64 {
        self.next_tx.fetch_add(1, Ordering::Relaxed)
    }
}

/// Reads and writes in one object.
///
/// Reads go straight to the device: a value put in this transaction is not
/// visible to its own reads until after commit.
#[derive(Debug)]
pub struct ReadWriteTransaction {
    read: ReadOnlyTransaction,
    write: WriteTransaction,
}

impl ReadWriteTransaction {
    pub fn id(&self) -> u64 {
        self.write.id()
    }

    pub async fn read(
        &self,
        store: LogicalDatastore,
        id: &NodeIdentifier,
    ) -> BrokerResult<Option<NormalizedNode>> {
        self.ensure_open()?;
        self.read.read(store, id).await
    }

    pub async fn exists(&self, store: LogicalDatastore, id: &NodeIdentifier) -> BrokerResult<bool> {
        self.ensure_open()?;
        self.read.exists(store, id).await
    }

    pub fn put(&self, store: LogicalDatastore, id: NodeIdentifier, data: NormalizedNode) -> BrokerResult<()> {
        self.write.put(store, id, data)
    }

    pub fn merge(&self, store: LogicalDatastore, id: NodeIdentifier, data: NormalizedNode) -> BrokerResult<()> {
        self.write.merge(store, id, data)
    }

    pub fn delete(&self, store: LogicalDatastore, id: NodeIdentifier) -> BrokerResult<()> {
        self.write.delete(store, id)
    }

    pub async fn commit(&self) -> BrokerResult<CommitInfo> {
        self.write.commit().await
    }

    pub fn cancel(&self) -> BrokerResult<()> {
        self.write.cancel()
    }

    pub fn is_finished(&self) -> bool {
        self.write.is_finished()
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        match self.write.finished_state() {
            Some(state) => Err(BrokerError::TransactionFinished {
                id: self.id(),
                state,
            }),
            None => Ok(()),
        }
    }
}

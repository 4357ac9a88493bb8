//! Write transactions and their buffer.

use std::sync::Arc;

use gnmi_proto::gnmi::{update_result, Path, SetRequest, SetResponse, Update};
use gnmi_yang::{NodeIdentifier, NormalizedNode};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{BrokerContext, LogicalDatastore};
use crate::codec::format_path;
use crate::error::{BrokerError, BrokerResult};

/// Operations buffered by a write transaction, already in wire form.
///
/// Entries keep their call order within each list.
#[derive(Debug, Clone, Default)]
pub struct WriteBuffer {
    replace: Vec<(NodeIdentifier, Update)>,
    merge: Vec<(NodeIdentifier, Update)>,
    delete: Vec<(NodeIdentifier, Path)>,
}

impl WriteBuffer {
    pub fn replace_entries(&self) -> &[(NodeIdentifier, Update)] {
        &self.replace
    }

    pub fn merge_entries(&self) -> &[(NodeIdentifier, Update)] {
        &self.merge
    }

    pub fn delete_entries(&self) -> &[(NodeIdentifier, Path)] {
        &self.delete
    }

    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.merge.is_empty() && self.delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.replace.len() + self.merge.len() + self.delete.len()
    }

    fn into_request(self) -> SetRequest {
        SetRequest {
            prefix: None,
            replace: self.replace.into_iter().map(|(_, update)| update).collect(),
            update: self.merge.into_iter().map(|(_, update)| update).collect(),
            delete: self.delete.into_iter().map(|(_, path)| path).collect(),
        }
    }
}

/// Kind of one entry reported back by a Set response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperation {
    Replace,
    Update,
    Delete,
    Unknown,
}

impl From<i32> for SetOperation {
    fn from(op: i32) -> Self {
        match update_result::Operation::try_from(op) {
            Ok(update_result::Operation::Replace) => SetOperation::Replace,
            Ok(update_result::Operation::Update) => SetOperation::Update,
            Ok(update_result::Operation::Delete) => SetOperation::Delete,
            _ => SetOperation::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub operation: SetOperation,
    pub path: String,
}

/// What the device reported for a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitInfo {
    /// Device timestamp in nanoseconds since the epoch; 0 when nothing was sent.
    pub timestamp: i64,
    pub results: Vec<OperationResult>,
}

#[derive(Debug)]
enum TxState {
    Open(WriteBuffer),
    Committed,
    Cancelled,
}

impl TxState {
    fn finished(&self) -> Option<&'static str> {
        match self {
            TxState::Open(_) => None,
            TxState::Committed => Some("committed"),
            TxState::Cancelled => Some("cancelled"),
        }
    }
}

/// Buffers writes and sends them as one Set RPC on [`commit`](Self::commit).
///
/// A transaction is single-use: once committed or cancelled every further
/// call fails with [`BrokerError::TransactionFinished`].
#[derive(Debug)]
pub struct WriteTransaction {
    id: u64,
    ctx: Arc<BrokerContext>,
    state: Mutex<TxState>,
}

impl WriteTransaction {
    pub(crate) fn new(id: u64, ctx: Arc<BrokerContext>) -> Self {
        Self {
            id,
            ctx,
            state: Mutex::new(TxState::Open(WriteBuffer::default())),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Replaces the subtree at `id` with `data`.
    pub fn put(&self, store: LogicalDatastore, id: NodeIdentifier, data: NormalizedNode) -> BrokerResult<()> {
        self.buffer_update(store, "put", id, data, |buffer, entry| buffer.replace.push(entry))
    }

    /// Merges `data` into the subtree at `id`.
    pub fn merge(&self, store: LogicalDatastore, id: NodeIdentifier, data: NormalizedNode) -> BrokerResult<()> {
        self.buffer_update(store, "merge", id, data, |buffer, entry| buffer.merge.push(entry))
    }

    /// Removes the subtree at `id`.
    pub fn delete(&self, store: LogicalDatastore, id: NodeIdentifier) -> BrokerResult<()> {
        self.with_buffer(|buffer| {
            check_store(store, "delete")?;
            let path = self.ctx.codec.path_codec().encode(&id)?;
            buffer.delete.push((id, path));
            Ok(())
        })
    }

    /// Sends the buffered operations as one Set RPC.
    ///
    /// The transaction is finished even when the RPC fails; the broker does
    /// not retry.
    #[instrument(skip(self), fields(device = %self.ctx.device, tx = self.id))]
    pub async fn commit(&self) -> BrokerResult<CommitInfo> {
        let buffer = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, TxState::Committed) {
                TxState::Open(buffer) => buffer,
                finished => {
                    let err = self.finished_error(&finished);
                    *state = finished;
                    return Err(err);
                }
            }
        };

        if buffer.is_empty() {
            debug!("Nothing to commit");
            return Ok(CommitInfo::default());
        }

        let operations = buffer.len();
        let response = self.ctx.session.set(buffer.into_request()).await?;
        let info = self.ctx.check_set_response(response)?;
        info!(operations, "Committed write transaction");
        Ok(info)
    }

    /// Discards the buffer.
    pub fn cancel(&self) -> BrokerResult<()> {
        let mut state = self.state.lock();
        if !matches!(*state, TxState::Open(_)) {
            return Err(self.finished_error(&state));
        }
        *state = TxState::Cancelled;
        debug!(device = %self.ctx.device, tx = self.id, "Cancelled write transaction");
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.finished_state().is_some()
    }

    pub(crate) fn finished_state(&self) -> Option<&'static str> {
        self.state.lock().finished()
    }

    /// Copy of the buffered operations; `None` once finished.
    pub fn pending(&self) -> Option<WriteBuffer> {
        match &*self.state.lock() {
            TxState::Open(buffer) => Some(buffer.clone()),
            _ => None,
        }
    }

    fn buffer_update(
        &self,
        store: LogicalDatastore,
        operation: &'static str,
        id: NodeIdentifier,
        data: NormalizedNode,
        push: impl FnOnce(&mut WriteBuffer, (NodeIdentifier, Update)),
    ) -> BrokerResult<()> {
        self.with_buffer(|buffer| {
            check_store(store, operation)?;
            let data = match data.normalized() {
                Some(data) => data,
                // Below the top level an empty value still clears the subtree
                None if id.len() > 1 && !matches!(data, NormalizedNode::Augmentation { .. }) => data,
                None => {
                    debug!(path = %id, operation, "Dropping structurally empty data");
                    return Ok(());
                }
            };
            let update = self.ctx.codec.encode(&id, &data)?;
            push(buffer, (id, update));
            Ok(())
        })
    }

    fn with_buffer<T>(&self, f: impl FnOnce(&mut WriteBuffer) -> BrokerResult<T>) -> BrokerResult<T> {
        let mut state = self.state.lock();
        match &mut *state {
            TxState::Open(buffer) => f(buffer),
            finished => Err(self.finished_error(finished)),
        }
    }

    fn finished_error(&self, state: &TxState) -> BrokerError {
        BrokerError::TransactionFinished {
            id: self.id,
            state: state.finished().unwrap_or("open"),
        }
    }
}

fn check_store(store: LogicalDatastore, operation: &'static str) -> BrokerResult<()> {
    match store {
        LogicalDatastore::Configuration => Ok(()),
        other => Err(BrokerError::invalid_datastore(operation, other)),
    }
}

impl BrokerContext {
    /// Turns in-band errors of a Set response into one aggregate error.
    fn check_set_response(&self, response: SetResponse) -> BrokerResult<CommitInfo> {
        let prefix = response.prefix.map(|p| p.elem).unwrap_or_default();
        let mut failures = Vec::new();

        if let Some(error) = response.message.filter(|e| e.code != 0) {
            failures.push(format!("code {}: {}", error.code, error.message));
        }

        let mut results = Vec::with_capacity(response.response.len());
        for result in response.response {
            let mut elems = prefix.clone();
            elems.extend(result.path.map(|p| p.elem).unwrap_or_default());
            let path = format_path(&elems);
            if let Some(error) = result.message.filter(|e| e.code != 0) {
                failures.push(format!("{path}: code {}: {}", error.code, error.message));
            }
            results.push(OperationResult {
                operation: SetOperation::from(result.op),
                path,
            });
        }

        if !failures.is_empty() {
            warn!(device = %self.device, failures = failures.len(), "Set reported failures");
            return Err(BrokerError::SetRejected {
                device: self.device.clone(),
                message: failures.join("; "),
            });
        }

        Ok(CommitInfo {
            timestamp: response.timestamp,
            results,
        })
    }
}

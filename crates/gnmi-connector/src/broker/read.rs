//! Read-only transactions.

use std::sync::Arc;

use gnmi_proto::gnmi::{GetRequest, GetResponse};
use gnmi_yang::{NodeIdentifier, NormalizedNode, PathArgument};
use tracing::{debug, instrument, warn};

use super::{BrokerContext, LogicalDatastore};
use crate::error::{BrokerResult, CodecError};

/// Reads from the device, one Get RPC per call.
#[derive(Debug)]
pub struct ReadOnlyTransaction {
    id: u64,
    ctx: Arc<BrokerContext>,
}

impl ReadOnlyTransaction {
    pub(crate) fn new(id: u64, ctx: Arc<BrokerContext>) -> Self {
        Self { id, ctx }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Reads the subtree at `id`; `Ok(None)` when the device has no data there.
    #[instrument(skip(self, id), fields(device = %self.ctx.device, tx = self.id, path = %id))]
    pub async fn read(
        &self,
        store: LogicalDatastore,
        id: &NodeIdentifier,
    ) -> BrokerResult<Option<NormalizedNode>> {
        if id.is_root() {
            return Err(CodecError::unresolved(id).into());
        }
        let request = self.ctx.get_request(store, id)?;
        let response = match self.ctx.session.get(request).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                debug!("Path not present on device");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        self.ctx.decode_get_response(id, response)
    }

    /// Reports whether the device has data at `id`.
    pub async fn exists(&self, store: LogicalDatastore, id: &NodeIdentifier) -> BrokerResult<bool> {
        Ok(self.read(store, id).await?.is_some())
    }
}

impl BrokerContext {
    pub(crate) fn get_request(
        &self,
        store: LogicalDatastore,
        id: &NodeIdentifier,
    ) -> BrokerResult<GetRequest> {
        Ok(GetRequest {
            prefix: None,
            path: vec![self.codec.path_codec().encode(id)?],
            r#type: self.options.mapping.data_type(store) as i32,
            encoding: self.codec.encoding().to_proto() as i32,
            use_models: self.options.use_models.clone(),
        })
    }

    /// Decodes every update of a Get response and merges them into one tree
    /// rooted at `requested`.
    pub(crate) fn decode_get_response(
        &self,
        requested: &NodeIdentifier,
        response: GetResponse,
    ) -> BrokerResult<Option<NormalizedNode>> {
        let paths = self.codec.path_codec();
        let mut result: Option<NormalizedNode> = None;

        for notification in &response.notification {
            for update in &notification.update {
                let Some(value) = update.val.as_ref() else {
                    continue;
                };
                let path = update.path.clone().unwrap_or_default();
                let mut update_id = paths.decode_with_prefix(notification.prefix.as_ref(), &path)?;
                if update_id.is_root() {
                    update_id = requested.clone();
                }

                let node = self.codec.decode(&update_id, value)?;
                let Some(node) = self.rebase(requested, &update_id, node)? else {
                    warn!(path = %update_id, "Ignoring update outside the requested subtree");
                    continue;
                };
                result = Some(match result.take() {
                    Some(mut merged) => {
                        merged.merge(node);
                        merged
                    }
                    None => node,
                });
            }
        }

        Ok(result)
    }

    /// Re-roots `node`, found at `found`, at `requested`.
    fn rebase(
        &self,
        requested: &NodeIdentifier,
        found: &NodeIdentifier,
        node: NormalizedNode,
    ) -> BrokerResult<Option<NormalizedNode>> {
        if let Some(below) = found.relative_to(requested) {
            let mut current = node;
            for depth in (0..below.len()).rev() {
                let parent: NodeIdentifier = requested
                    .steps()
                    .iter()
                    .chain(&below[..depth])
                    .cloned()
                    .collect();
                current = self.wrap(&parent, current)?;
            }
            return Ok(Some(current));
        }

        if let Some(above) = requested.relative_to(found) {
            let mut current = &node;
            for step in above {
                match current.child(step) {
                    Some(child) => current = child,
                    None => return Ok(None),
                }
            }
            return Ok(Some(current.clone()));
        }

        Ok(None)
    }

    /// Wraps `child` in the node addressed by `parent`.
    fn wrap(&self, parent: &NodeIdentifier, child: NormalizedNode) -> BrokerResult<NormalizedNode> {
        let schema = self.codec.path_codec().schema();
        let snode = schema
            .resolve(parent)
            .ok_or_else(|| CodecError::unresolved(parent))?;
        let step = parent.last().ok_or_else(|| CodecError::unresolved(parent))?;

        Ok(match step {
            PathArgument::Entry { name, keys } => {
                let mut children: Vec<NormalizedNode> = keys
                    .iter()
                    .filter(|(key, _)| child.name() != Some(key))
                    .map(|(key, value)| NormalizedNode::leaf(key.clone(), value.clone()))
                    .collect();
                children.push(child);
                NormalizedNode::list_entry(name.clone(), keys.clone(), children)
            }
            PathArgument::Node(name) if snode.is_list() => NormalizedNode::List {
                name: name.clone(),
                entries: vec![child],
            },
            PathArgument::Node(name) => NormalizedNode::container(name.clone(), vec![child]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerOptions, GnmiDataBroker};
    use crate::codec::testing::*;
    use crate::codec::{parse_path, JsonEncoding, PathCodec, UpdateCodec};
    use crate::error::{BrokerError, SessionError};
    use crate::session::mock::MockSession;
    use gnmi_proto::gnmi::{typed_value, DataType, Notification, Path, TypedValue, Update};
    use gnmi_yang::LeafValue;
    use pretty_assertions::assert_eq;

    fn broker(session: Arc<MockSession>) -> GnmiDataBroker {
        let codec = UpdateCodec::new(PathCodec::new(schema(), false), JsonEncoding::JsonIetf);
        GnmiDataBroker::new("leaf1", session, codec, BrokerOptions::default())
    }

    fn update(path: &str, value: typed_value::Value) -> Update {
        Update {
            path: Some(Path {
                elem: parse_path(path).unwrap(),
                ..Default::default()
            }),
            val: Some(TypedValue { value: Some(value) }),
            duplicates: 0,
        }
    }

    fn response(prefix: Option<&str>, updates: Vec<Update>) -> GetResponse {
        GetResponse {
            notification: vec![Notification {
                prefix: prefix.map(|p| Path {
                    elem: parse_path(p).unwrap(),
                    ..Default::default()
                }),
                update: updates,
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn test_read_scalar() {
        let session = Arc::new(MockSession::new());
        session.push_get(Ok(response(
            None,
            vec![update(
                "/interfaces/interface[name=eth0]/config/mtu",
                typed_value::Value::UintVal(1500),
            )],
        )));
        let tx = broker(session.clone()).new_read_only_transaction();
        let mtu = interface("eth0").node(ifq("config")).node(ifq("mtu"));

        let value = tx.read(LogicalDatastore::Configuration, &mtu).await.unwrap();
        assert_eq!(value, Some(NormalizedNode::leaf(ifq("mtu"), LeafValue::Uint(1500))));

        let requests = session.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].r#type(), DataType::Config);
        assert_eq!(requests[0].path.len(), 1);
    }

    #[tokio::test]
    async fn test_operational_read_uses_state_hint() {
        let session = Arc::new(MockSession::new());
        let tx = broker(session.clone()).new_read_only_transaction();
        let state = interface("eth0").node(ifq("state"));
        assert_eq!(tx.read(LogicalDatastore::Operational, &state).await.unwrap(), None);
        assert_eq!(session.get_requests()[0].r#type(), DataType::State);
    }

    #[tokio::test]
    async fn test_not_found_is_empty() {
        let session = Arc::new(MockSession::new());
        session.push_get(Err(SessionError::Rpc(tonic::Status::not_found("no data"))));
        let tx = broker(session).new_read_only_transaction();
        let value = tx
            .read(LogicalDatastore::Configuration, &interface("eth9"))
            .await
            .unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_other_errors_fail_the_read() {
        let session = Arc::new(MockSession::new());
        session.push_get(Err(SessionError::Rpc(tonic::Status::permission_denied("nope"))));
        let tx = broker(session).new_read_only_transaction();
        let err = tx
            .read(LogicalDatastore::Configuration, &interface("eth0"))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Session(SessionError::Rpc(_))));
    }

    #[tokio::test]
    async fn test_split_updates_are_merged_under_prefix() {
        let session = Arc::new(MockSession::new());
        session.push_get(Ok(response(
            Some("/interfaces/interface[name=eth0]"),
            vec![
                update("config/mtu", typed_value::Value::UintVal(9100)),
                update("config/enabled", typed_value::Value::BoolVal(true)),
                update(
                    "state",
                    typed_value::Value::JsonIetfVal(br#"{"oper-status":"UP"}"#.to_vec()),
                ),
            ],
        )));
        let tx = broker(session).new_read_only_transaction();
        let entry = tx
            .read(LogicalDatastore::Configuration, &interface("eth0"))
            .await
            .unwrap()
            .unwrap();

        let config = entry.child(&PathArgument::Node(ifq("config"))).unwrap();
        assert_eq!(config.children().len(), 2);
        let state = entry.child(&PathArgument::Node(ifq("state"))).unwrap();
        assert_eq!(
            state.children(),
            &[NormalizedNode::leaf(ifq("oper-status"), LeafValue::Enum("UP".into()))]
        );
        assert_eq!(entry.path_argument(), interface("eth0").last().cloned());
    }

    #[tokio::test]
    async fn test_ancestor_update_is_narrowed() {
        let session = Arc::new(MockSession::new());
        session.push_get(Ok(response(
            None,
            vec![update(
                "/interfaces/interface[name=eth0]/config",
                typed_value::Value::JsonIetfVal(br#"{"mtu":1500,"enabled":false}"#.to_vec()),
            )],
        )));
        let tx = broker(session).new_read_only_transaction();
        let enabled = interface("eth0").node(ifq("config")).node(ifq("enabled"));
        let value = tx.read(LogicalDatastore::Configuration, &enabled).await.unwrap();
        assert_eq!(value, Some(NormalizedNode::leaf(ifq("enabled"), false)));
    }

    #[tokio::test]
    async fn test_exists() {
        let session = Arc::new(MockSession::new());
        session.push_get(Ok(response(
            None,
            vec![update(
                "/system/hostname",
                typed_value::Value::StringVal("leaf1".into()),
            )],
        )));
        let tx = broker(session).new_read_only_transaction();
        let hostname = NodeIdentifier::root().node(rtq("system")).node(rtq("hostname"));
        assert!(tx.exists(LogicalDatastore::Operational, &hostname).await.unwrap());
        assert!(!tx.exists(LogicalDatastore::Operational, &hostname).await.unwrap());
    }

    #[tokio::test]
    async fn test_codec_error_is_not_empty_data() {
        let session = Arc::new(MockSession::new());
        session.push_get(Ok(response(
            None,
            vec![update(
                "/interfaces/interface[name=eth0]/config/mtu",
                typed_value::Value::StringVal("not-a-number".into()),
            )],
        )));
        let tx = broker(session).new_read_only_transaction();
        let mtu = interface("eth0").node(ifq("config")).node(ifq("mtu"));
        let err = tx.read(LogicalDatastore::Configuration, &mtu).await.unwrap_err();
        assert!(matches!(err, BrokerError::Codec(CodecError::TypeMismatch { .. })));
    }
}

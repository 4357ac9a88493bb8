//! RFC 7951 JSON encoding of data trees.
//!
//! Member names are qualified as `module:name` whenever the namespace
//! changes from the parent, which is how augmented nodes show up. 64-bit
//! integers are JSON strings, enumerations their symbolic names.
//!
//! Decoding produces flat children: augmented nodes appear next to the
//! nodes of the augmented module, without an augmentation wrapper.

use gnmi_yang::{
    DataSchemaNode, LeafType, LeafValue, NodeKind, NormalizedNode, PathArgument, QName,
    SchemaContext,
};
use serde_json::{Map, Number, Value};

use crate::error::{CodecError, CodecResult};

/// Encodes the content of `node` (not a wrapper object) as RFC 7951 JSON.
pub fn encode_json(
    schema: &SchemaContext,
    schema_node: &DataSchemaNode,
    node: &NormalizedNode,
) -> CodecResult<Value> {
    Writer { schema }.value(schema_node, node)
}

/// Decodes RFC 7951 JSON found at `step` into a node.
///
/// A single-member object named after the node itself (`{"mtu": 1500}`,
/// `{"openconfig-interfaces:config": {...}}`) is unwrapped first.
pub fn decode_json(
    schema: &SchemaContext,
    schema_node: &DataSchemaNode,
    step: &PathArgument,
    value: &Value,
) -> CodecResult<NormalizedNode> {
    let reader = Reader { schema };
    let value = reader.unwrap_envelope(schema_node, value);
    match step {
        PathArgument::Entry { keys, .. } if schema_node.is_list() => {
            let object = match value {
                Value::Object(object) => object,
                Value::Array(items) if items.len() == 1 => items[0]
                    .as_object()
                    .ok_or_else(|| mismatch(schema_node, "list entry must be an object"))?,
                _ => return Err(mismatch(schema_node, "list entry must be an object")),
            };
            reader.entry(schema_node, object, Some(keys.as_slice()))
        }
        _ => reader.node(schema_node, value),
    }
}

fn mismatch(node: &DataSchemaNode, message: impl Into<String>) -> CodecError {
    CodecError::type_mismatch(node.qname().local_name(), message)
}

fn flatten(children: &[NormalizedNode]) -> Vec<&NormalizedNode> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        match child {
            NormalizedNode::Augmentation { children } => out.extend(flatten(children)),
            other => out.push(other),
        }
    }
    out
}

struct Writer<'a> {
    schema: &'a SchemaContext,
}

impl Writer<'_> {
    fn value(&self, snode: &DataSchemaNode, node: &NormalizedNode) -> CodecResult<Value> {
        match (node, snode.kind()) {
            (NormalizedNode::Leaf { value, .. }, NodeKind::Leaf(ty)) => scalar_to_json(snode, ty, value),
            (NormalizedNode::LeafList { values, .. }, NodeKind::LeafList(ty)) => values
                .iter()
                .map(|v| scalar_to_json(snode, ty, v))
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Array),
            (NormalizedNode::Container { children, .. }, NodeKind::Container)
            | (NormalizedNode::Augmentation { children }, NodeKind::Container | NodeKind::List { .. }) => {
                self.object(snode, children, &[]).map(Value::Object)
            }
            (NormalizedNode::ListEntry { keys, children, .. }, NodeKind::List { .. }) => {
                self.object(snode, children, keys).map(Value::Object)
            }
            (NormalizedNode::List { entries, .. }, NodeKind::List { .. }) => entries
                .iter()
                .map(|entry| match entry {
                    NormalizedNode::ListEntry { keys, children, .. } => {
                        self.object(snode, children, keys).map(Value::Object)
                    }
                    _ => Err(mismatch(snode, "list holds a non-entry node")),
                })
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Array),
            (node, kind) => Err(mismatch(
                snode,
                format!("{} node does not fit schema kind {:?}", node_kind_name(node), kind),
            )),
        }
    }

    fn object(
        &self,
        parent: &DataSchemaNode,
        children: &[NormalizedNode],
        keys: &[(QName, LeafValue)],
    ) -> CodecResult<Map<String, Value>> {
        let mut object = Map::new();
        for child in flatten(children) {
            let name = child
                .name()
                .ok_or_else(|| mismatch(parent, "unnamed child"))?;
            let child_schema = parent.child_by_qname(name).ok_or_else(|| CodecError::UnknownElement {
                element: name.local_name().to_string(),
                parent: parent.qname().local_name().to_string(),
            })?;
            let member = self.member_name(parent.qname(), name)?;
            object.insert(member, self.value(child_schema, child)?);
        }
        for (key, value) in keys {
            let member = self.member_name(parent.qname(), key)?;
            if object.contains_key(&member) {
                continue;
            }
            let key_schema = parent
                .child_by_qname(key)
                .ok_or_else(|| CodecError::invalid_key(parent.qname().local_name(), key.local_name(), "not a key leaf"))?;
            let ty = key_schema
                .leaf_type()
                .ok_or_else(|| mismatch(key_schema, "key is not a leaf"))?;
            object.insert(member, scalar_to_json(key_schema, ty, value)?);
        }
        Ok(object)
    }

    fn member_name(&self, parent: &QName, child: &QName) -> CodecResult<String> {
        if parent.namespace == child.namespace {
            return Ok(child.local_name().to_string());
        }
        let module = self
            .schema
            .module_by_namespace(&child.namespace)
            .ok_or_else(|| CodecError::UnknownNamespace(child.namespace.clone()))?;
        Ok(format!("{}:{}", module.name, child.local_name()))
    }
}

fn node_kind_name(node: &NormalizedNode) -> &'static str {
    match node {
        NormalizedNode::Leaf { .. } => "leaf",
        NormalizedNode::LeafList { .. } => "leaf-list",
        NormalizedNode::Container { .. } => "container",
        NormalizedNode::List { .. } => "list",
        NormalizedNode::ListEntry { .. } => "list entry",
        NormalizedNode::Augmentation { .. } => "augmentation",
    }
}

fn scalar_to_json(snode: &DataSchemaNode, ty: &LeafType, value: &LeafValue) -> CodecResult<Value> {
    let value = ty
        .coerce(value.clone())
        .map_err(|e| mismatch(snode, e.to_string()))?;
    Ok(match value {
        LeafValue::Bool(b) => Value::Bool(b),
        LeafValue::Int(i) if ty.is_wide_integer() => Value::String(i.to_string()),
        LeafValue::Int(i) => Value::Number(Number::from(i)),
        LeafValue::Uint(u) if ty.is_wide_integer() => Value::String(u.to_string()),
        LeafValue::Uint(u) => Value::Number(Number::from(u)),
        LeafValue::String(s) | LeafValue::Enum(s) => Value::String(s),
    })
}

fn scalar_from_json(snode: &DataSchemaNode, ty: &LeafType, value: &Value) -> CodecResult<LeafValue> {
    let raw = match value {
        Value::Bool(b) => LeafValue::Bool(*b),
        Value::Number(n) => match (n.as_u64(), n.as_i64()) {
            (Some(u), _) => LeafValue::Uint(u),
            (None, Some(i)) => LeafValue::Int(i),
            _ => {
                return Err(CodecError::unsupported(
                    snode.qname().local_name(),
                    format!("floating point number {n}"),
                ))
            }
        },
        Value::String(s) => LeafValue::String(s.clone()),
        other => return Err(mismatch(snode, format!("expected a scalar, found {other}"))),
    };
    ty.coerce(raw).map_err(|e| mismatch(snode, e.to_string()))
}

struct Reader<'a> {
    schema: &'a SchemaContext,
}

impl Reader<'_> {
    fn unwrap_envelope<'v>(&self, snode: &DataSchemaNode, value: &'v Value) -> &'v Value {
        let Value::Object(object) = value else {
            return value;
        };
        if object.len() != 1 {
            return value;
        }
        let Some((member, inner)) = object.iter().next() else {
            return value;
        };
        let local = member.split_once(':').map_or(member.as_str(), |(_, l)| l);
        let own_name = local == snode.qname().local_name();
        let shadows_child = snode.child(local, None).is_some();
        if own_name && !shadows_child {
            inner
        } else {
            value
        }
    }

    fn node(&self, snode: &DataSchemaNode, value: &Value) -> CodecResult<NormalizedNode> {
        let name = snode.qname().clone();
        match snode.kind() {
            NodeKind::Leaf(ty) => Ok(NormalizedNode::Leaf {
                name,
                value: scalar_from_json(snode, ty, value)?,
            }),
            NodeKind::LeafList(ty) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| mismatch(snode, "leaf-list must be an array"))?;
                let values = items
                    .iter()
                    .map(|v| scalar_from_json(snode, ty, v))
                    .collect::<CodecResult<Vec<_>>>()?;
                Ok(NormalizedNode::LeafList { name, values })
            }
            NodeKind::Container => {
                let object = value
                    .as_object()
                    .ok_or_else(|| mismatch(snode, "container must be an object"))?;
                Ok(NormalizedNode::Container {
                    name,
                    children: self.members(snode, object)?,
                })
            }
            NodeKind::List { .. } => {
                let items = value
                    .as_array()
                    .ok_or_else(|| mismatch(snode, "list must be an array"))?;
                let entries = items
                    .iter()
                    .map(|item| {
                        let object = item
                            .as_object()
                            .ok_or_else(|| mismatch(snode, "list entry must be an object"))?;
                        self.entry(snode, object, None)
                    })
                    .collect::<CodecResult<Vec<_>>>()?;
                Ok(NormalizedNode::List { name, entries })
            }
        }
    }

    fn entry(
        &self,
        snode: &DataSchemaNode,
        object: &Map<String, Value>,
        known_keys: Option<&[(QName, LeafValue)]>,
    ) -> CodecResult<NormalizedNode> {
        let mut children = self.members(snode, object)?;
        let keys = match known_keys {
            Some(keys) => keys.to_vec(),
            None => snode
                .list_keys()
                .iter()
                .map(|key| {
                    children
                        .iter()
                        .find_map(|child| match child {
                            NormalizedNode::Leaf { name, value } if name == key => {
                                Some((key.clone(), value.clone()))
                            }
                            _ => None,
                        })
                        .ok_or_else(|| {
                            CodecError::invalid_key(
                                snode.qname().local_name(),
                                key.local_name(),
                                "list entry lacks its key leaf",
                            )
                        })
                })
                .collect::<CodecResult<Vec<_>>>()?,
        };
        for (key, value) in &keys {
            let present = children.iter().any(|c| c.name() == Some(key));
            if !present {
                children.push(NormalizedNode::Leaf {
                    name: key.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(NormalizedNode::ListEntry {
            name: snode.qname().clone(),
            keys,
            children,
        })
    }

    fn members(&self, parent: &DataSchemaNode, object: &Map<String, Value>) -> CodecResult<Vec<NormalizedNode>> {
        let mut children = Vec::with_capacity(object.len());
        for (member, value) in object {
            let child = self.resolve_member(parent, member)?;
            children.push(self.node(child, value)?);
        }
        Ok(children)
    }

    fn resolve_member<'s>(&self, parent: &'s DataSchemaNode, member: &str) -> CodecResult<&'s DataSchemaNode> {
        let unknown = || CodecError::UnknownElement {
            element: member.to_string(),
            parent: parent.qname().local_name().to_string(),
        };
        match member.split_once(':') {
            Some((module, local)) => {
                let namespace = self
                    .schema
                    .module_by_name(module)
                    .map(|m| m.namespace.as_str())
                    .ok_or_else(unknown)?;
                parent.child(local, Some(namespace)).ok_or_else(unknown)
            }
            None => parent
                .child(member, Some(&parent.qname().namespace))
                .or_else(|| parent.child(member, None))
                .ok_or_else(unknown),
        }
    }
}

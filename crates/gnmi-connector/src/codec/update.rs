//! Identifier + node ⇄ gNMI update mapping.

use gnmi_proto::gnmi::{typed_value, ScalarArray, TypedValue, Update};
use gnmi_yang::{DataSchemaNode, LeafValue, NodeIdentifier, NormalizedNode};

use super::json::{decode_json, encode_json};
use super::{JsonEncoding, PathCodec};
use crate::error::{CodecError, CodecResult};

/// Encodes writes into `Update`s and decodes `TypedValue`s read back.
///
/// Leaves travel as typed scalars (bool, int, uint, string); anything
/// structured travels as JSON in the configured flavour. Scalars keep their
/// signedness class, not their declared width: the schema restores the width
/// on decode.
#[derive(Debug, Clone)]
pub struct UpdateCodec {
    paths: PathCodec,
    encoding: JsonEncoding,
}

impl UpdateCodec {
    pub fn new(paths: PathCodec, encoding: JsonEncoding) -> Self {
        Self { paths, encoding }
    }

    pub fn path_codec(&self) -> &PathCodec {
        &self.paths
    }

    pub fn encoding(&self) -> JsonEncoding {
        self.encoding
    }

    /// Builds the update for writing `node` at `id`.
    pub fn encode(&self, id: &NodeIdentifier, node: &NormalizedNode) -> CodecResult<Update> {
        Ok(Update {
            path: Some(self.paths.encode(id)?),
            val: Some(self.encode_value(id, node)?),
            duplicates: 0,
        })
    }

    /// Encodes only the value part of an update.
    pub fn encode_value(&self, id: &NodeIdentifier, node: &NormalizedNode) -> CodecResult<TypedValue> {
        let schema = self.paths.schema();
        let snode = self.resolve(id)?;
        if let Some(name) = node.name() {
            if name != snode.qname() {
                return Err(CodecError::type_mismatch(
                    id,
                    format!("node {} does not match the identifier", name),
                ));
            }
        }

        let value = match node {
            NormalizedNode::Leaf { value, .. } => {
                let ty = leaf_type(snode, id)?;
                let value = ty
                    .coerce(value.clone())
                    .map_err(|e| CodecError::type_mismatch(id, e.to_string()))?;
                scalar_value(value)
            }
            structured => {
                let json = encode_json(schema, snode, structured)?;
                let bytes = serde_json::to_vec(&json)?;
                match self.encoding {
                    JsonEncoding::Json => typed_value::Value::JsonVal(bytes),
                    JsonEncoding::JsonIetf => typed_value::Value::JsonIetfVal(bytes),
                }
            }
        };
        Ok(TypedValue { value: Some(value) })
    }

    /// Decodes a value received for `id`.
    pub fn decode(&self, id: &NodeIdentifier, value: &TypedValue) -> CodecResult<NormalizedNode> {
        use typed_value::Value;

        let snode = self.resolve(id)?;
        let raw = match value.value.as_ref() {
            Some(Value::StringVal(s)) | Some(Value::AsciiVal(s)) => LeafValue::String(s.clone()),
            Some(Value::IntVal(i)) => LeafValue::Int(*i),
            Some(Value::UintVal(u)) => LeafValue::Uint(*u),
            Some(Value::BoolVal(b)) => LeafValue::Bool(*b),
            Some(Value::LeaflistVal(array)) => return self.decode_leaf_list(snode, id, array),
            Some(Value::JsonVal(bytes)) | Some(Value::JsonIetfVal(bytes)) => {
                let json: serde_json::Value = serde_json::from_slice(bytes)?;
                let step = id.last().ok_or_else(|| CodecError::unresolved(id))?;
                return decode_json(self.paths.schema(), snode, step, &json);
            }
            Some(Value::BytesVal(_)) => return Err(CodecError::unsupported(id, "bytes")),
            Some(Value::DoubleVal(_)) => return Err(CodecError::unsupported(id, "double")),
            None => return Err(CodecError::unsupported(id, "empty typed value")),
        };

        let ty = leaf_type(snode, id)?;
        let value = ty
            .coerce(raw)
            .map_err(|e| CodecError::type_mismatch(id, e.to_string()))?;
        Ok(NormalizedNode::Leaf {
            name: snode.qname().clone(),
            value,
        })
    }

    fn decode_leaf_list(
        &self,
        snode: &DataSchemaNode,
        id: &NodeIdentifier,
        array: &ScalarArray,
    ) -> CodecResult<NormalizedNode> {
        let ty = snode
            .is_leaf_list()
            .then(|| snode.leaf_type())
            .flatten()
            .ok_or_else(|| CodecError::type_mismatch(id, "scalar array for a non leaf-list node"))?;
        let values = array
            .element
            .iter()
            .map(|element| {
                let decoded = self.decode_scalar_element(id, element)?;
                ty.coerce(decoded)
                    .map_err(|e| CodecError::type_mismatch(id, e.to_string()))
            })
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(NormalizedNode::LeafList {
            name: snode.qname().clone(),
            values,
        })
    }

    fn decode_scalar_element(&self, id: &NodeIdentifier, element: &TypedValue) -> CodecResult<LeafValue> {
        use typed_value::Value;
        match element.value.as_ref() {
            Some(Value::StringVal(s)) | Some(Value::AsciiVal(s)) => Ok(LeafValue::String(s.clone())),
            Some(Value::IntVal(i)) => Ok(LeafValue::Int(*i)),
            Some(Value::UintVal(u)) => Ok(LeafValue::Uint(*u)),
            Some(Value::BoolVal(b)) => Ok(LeafValue::Bool(*b)),
            _ => Err(CodecError::unsupported(id, "non-scalar leaf-list element")),
        }
    }

    fn resolve(&self, id: &NodeIdentifier) -> CodecResult<&DataSchemaNode> {
        self.paths
            .schema()
            .resolve(id)
            .ok_or_else(|| CodecError::unresolved(id))
    }
}

fn leaf_type<'s>(snode: &'s DataSchemaNode, id: &NodeIdentifier) -> CodecResult<&'s gnmi_yang::LeafType> {
    snode
        .is_leaf()
        .then(|| snode.leaf_type())
        .flatten()
        .ok_or_else(|| CodecError::type_mismatch(id, "identifier does not address a leaf"))
}

fn scalar_value(value: LeafValue) -> typed_value::Value {
    match value {
        LeafValue::Bool(b) => typed_value::Value::BoolVal(b),
        LeafValue::Int(i) => typed_value::Value::IntVal(i),
        LeafValue::Uint(u) => typed_value::Value::UintVal(u),
        LeafValue::String(s) | LeafValue::Enum(s) => typed_value::Value::StringVal(s),
    }
}

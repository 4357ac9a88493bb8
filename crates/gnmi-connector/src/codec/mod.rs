//! Mapping between the data tree and gNMI wire messages.
//!
//! - [`PathCodec`]: [`NodeIdentifier`](gnmi_yang::NodeIdentifier) ⇄ gNMI `Path`
//! - [`UpdateCodec`]: identifier + [`NormalizedNode`](gnmi_yang::NormalizedNode) ⇄ gNMI `Update`
//! - [`parse_path`] / [`format_path`]: textual paths such as
//!   `/interfaces/interface[name=eth0]/config`

mod json;
mod path;
mod update;

use std::fmt;
use std::str::FromStr;

use gnmi_proto::gnmi::Encoding;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

pub use json::{decode_json, encode_json};
pub use path::{format_path, parse_path, PathCodec};
pub use update::UpdateCodec;

/// The JSON flavour used for structured values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonEncoding {
    Json,
    #[default]
    JsonIetf,
}

impl JsonEncoding {
    /// Returns the gNMI encoding enum value.
    pub fn to_proto(self) -> Encoding {
        match self {
            JsonEncoding::Json => Encoding::Json,
            JsonEncoding::JsonIetf => Encoding::JsonIetf,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonEncoding::Json => "json",
            JsonEncoding::JsonIetf => "json_ietf",
        }
    }
}

impl fmt::Display for JsonEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JsonEncoding {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(JsonEncoding::Json),
            "json_ietf" | "json-ietf" => Ok(JsonEncoding::JsonIetf),
            other => Err(CodecError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl TryFrom<Encoding> for JsonEncoding {
    type Error = CodecError;

    fn try_from(value: Encoding) -> Result<Self, Self::Error> {
        match value {
            Encoding::Json => Ok(JsonEncoding::Json),
            Encoding::JsonIetf => Ok(JsonEncoding::JsonIetf),
            other => Err(CodecError::UnsupportedEncoding(
                format!("{other:?}").to_ascii_lowercase(),
            )),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Schema shared by codec and broker tests.

    use std::sync::Arc;

    use gnmi_yang::{LeafValue, NodeIdentifier, QName, SchemaContext};

    pub const IF_NS: &str = "http://openconfig.net/yang/interfaces";
    pub const ETH_NS: &str = "http://openconfig.net/yang/interfaces/ethernet";
    pub const RT_NS: &str = "urn:example:routing";

    pub const SCHEMA: &str = r#"{
      "modules": [
        {
          "name": "openconfig-interfaces",
          "namespace": "http://openconfig.net/yang/interfaces",
          "prefix": "oc-if",
          "organization": "OpenConfig working group",
          "version": "3.0.0",
          "nodes": [
            { "kind": "container", "name": "interfaces", "children": [
              { "kind": "list", "name": "interface", "keys": ["name"], "children": [
                { "kind": "leaf", "name": "name", "type": "string" },
                { "kind": "leaf", "name": "enabled", "type": "boolean" },
                { "kind": "leaf", "name": "description", "type": "string" },
                { "kind": "container", "name": "config", "children": [
                  { "kind": "leaf", "name": "name", "type": "string" },
                  { "kind": "leaf", "name": "mtu", "type": "uint16" },
                  { "kind": "leaf", "name": "enabled", "type": "boolean" },
                  { "kind": "leaf", "name": "description", "type": "string" }
                ]},
                { "kind": "container", "name": "state", "children": [
                  { "kind": "leaf", "name": "in-octets", "type": "uint64" },
                  { "kind": "leaf", "name": "ifindex", "type": "uint32" },
                  { "kind": "leaf", "name": "oper-status", "type": { "enumeration": ["UP", "DOWN"] } }
                ]}
              ]}
            ]}
          ]
        },
        {
          "name": "openconfig-if-ethernet",
          "namespace": "http://openconfig.net/yang/interfaces/ethernet",
          "prefix": "oc-eth",
          "augments": [
            { "target": "/oc-if:interfaces/interface", "nodes": [
              { "kind": "container", "name": "ethernet", "children": [
                { "kind": "leaf", "name": "port-speed", "type": { "enumeration": ["SPEED_10GB", "SPEED_100GB"] } },
                { "kind": "leaf-list", "name": "lanes", "type": "uint8" }
              ]}
            ]}
          ]
        },
        {
          "name": "example-routing",
          "namespace": "urn:example:routing",
          "nodes": [
            { "kind": "container", "name": "routes", "children": [
              { "kind": "list", "name": "route", "keys": ["prefix", "vrf"], "children": [
                { "kind": "leaf", "name": "prefix", "type": "string" },
                { "kind": "leaf", "name": "vrf", "type": "string" },
                { "kind": "leaf", "name": "metric", "type": "int32" },
                { "kind": "leaf", "name": "protocol", "type": { "enumeration": ["STATIC", "BGP"] } }
              ]}
            ]},
            { "kind": "container", "name": "system", "children": [
              { "kind": "leaf", "name": "hostname", "type": "string" },
              { "kind": "leaf", "name": "offset", "type": "int64" }
            ]}
          ]
        }
      ]
    }"#;

    pub fn schema() -> Arc<SchemaContext> {
        Arc::new(SchemaContext::from_json_str(SCHEMA).unwrap())
    }

    pub fn ifq(name: &str) -> QName {
        QName::new(IF_NS, name)
    }

    pub fn ethq(name: &str) -> QName {
        QName::new(ETH_NS, name)
    }

    pub fn rtq(name: &str) -> QName {
        QName::new(RT_NS, name)
    }

    /// `/interfaces/interface[name=<name>]`
    pub fn interface(name: &str) -> NodeIdentifier {
        NodeIdentifier::root()
            .node(ifq("interfaces"))
            .entry(ifq("interface"), vec![(ifq("name"), LeafValue::from(name))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_parse() {
        assert_eq!("json".parse::<JsonEncoding>().unwrap(), JsonEncoding::Json);
        assert_eq!("JSON_IETF".parse::<JsonEncoding>().unwrap(), JsonEncoding::JsonIetf);
        assert!(matches!(
            "proto".parse::<JsonEncoding>(),
            Err(CodecError::UnsupportedEncoding(_))
        ));
        assert!(JsonEncoding::try_from(Encoding::Bytes).is_err());
        assert_eq!(JsonEncoding::JsonIetf.to_proto(), Encoding::JsonIetf);
    }
}

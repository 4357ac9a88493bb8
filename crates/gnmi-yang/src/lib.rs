//! YANG data model primitives for the gNMI southbound bridge.
//!
//! This crate provides the tree-structured side of the bridge, the model the
//! rest of the controller reads and writes through:
//!
//! - [`QName`]: namespace-qualified node names
//! - [`NodeIdentifier`]: hierarchical instance identifiers built from
//!   [`PathArgument`] steps (plain nodes and keyed list entries)
//! - [`LeafValue`]: the closed set of scalar values a leaf can carry
//! - [`NormalizedNode`]: typed data trees (leaves, containers, lists, ...)
//! - [`SchemaContext`]: the compiled module set used to resolve identifiers,
//!   type leaves and map namespaces back to module names
//!
//! # Example
//!
//! ```
//! use gnmi_yang::{LeafValue, NodeIdentifier, QName};
//!
//! let ns = "http://openconfig.net/yang/interfaces";
//! let id = NodeIdentifier::root()
//!     .node(QName::new(ns, "interfaces"))
//!     .entry(
//!         QName::new(ns, "interface"),
//!         vec![(QName::new(ns, "name"), LeafValue::String("eth0".into()))],
//!     );
//! assert_eq!(id.len(), 2);
//! assert_eq!(id.to_string(), "/interfaces/interface[name=eth0]");
//! ```

mod identifier;
mod node;
mod qname;
mod schema;
mod value;

pub use identifier::{NodeIdentifier, PathArgument};
pub use node::NormalizedNode;
pub use qname::QName;
pub use schema::{
    Augment, DataSchemaNode, Module, ModuleInfo, NodeKind, SchemaContext, SchemaNode,
};
pub use value::{LeafType, LeafValue};

/// Error raised when a textual or typed value does not fit a YANG type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid {ty} value: {value}")]
    InvalidValue { ty: String, value: String },

    #[error("value {value} out of range for {ty}")]
    OutOfRange { ty: String, value: String },

    #[error("unknown enum member '{value}' (allowed: {allowed})")]
    UnknownEnum { value: String, allowed: String },
}

/// Error raised while compiling or querying a [`SchemaContext`].
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("module '{0}' is defined more than once")]
    DuplicateModule(String),

    #[error("namespace '{0}' is claimed by more than one module")]
    DuplicateNamespace(String),

    #[error("augment target '{0}' does not resolve to a container or list")]
    UnknownAugmentTarget(String),

    #[error("list '{list}' declares key '{key}' which is not one of its leaves")]
    UnknownKey { list: String, key: String },

    #[error("failed to parse schema document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read schema document: {0}")]
    Io(#[from] std::io::Error),
}

//! Namespace-qualified node names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A YANG node name qualified by the namespace of its defining module.
///
/// Two nodes with the same local name but different namespaces (a node
/// and an augmentation from another module, say) are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    /// Namespace URI of the defining module.
    pub namespace: String,
    /// Local node name.
    pub name: String,
}

impl QName {
    /// Creates a new qualified name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns the local name.
    pub fn local_name(&self) -> &str {
        &self.name
    }

    /// Returns a qualified name in the same namespace with a different local name.
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self::new(self.namespace.clone(), name)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.namespace, self.name)
    }
}

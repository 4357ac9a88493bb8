//! Schema context: compiled module set used for identifier resolution.
//!
//! YANG compilation is done elsewhere; this module consumes an already
//! resolved description of each module (namespace, data nodes, augments)
//! as a JSON document and builds a navigable tree of [`DataSchemaNode`]s.
//!
//! # Document format
//!
//! ```json
//! {
//!   "modules": [
//!     {
//!       "name": "openconfig-interfaces",
//!       "namespace": "http://openconfig.net/yang/interfaces",
//!       "prefix": "oc-if",
//!       "nodes": [
//!         { "kind": "container", "name": "interfaces", "children": [
//!           { "kind": "list", "name": "interface", "keys": ["name"], "children": [
//!             { "kind": "leaf", "name": "name", "type": "string" }
//!           ]}
//!         ]}
//!       ]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::{LeafType, NodeIdentifier, QName, SchemaError};

/// A module as described in the schema document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub nodes: Vec<SchemaNode>,
    #[serde(default)]
    pub augments: Vec<Augment>,
}

/// Nodes a module adds under a node owned by another module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Augment {
    /// Absolute schema path, e.g. `/oc-if:interfaces/interface/config`.
    /// Unprefixed segments inherit the module of the previous segment.
    pub target: String,
    #[serde(default)]
    pub nodes: Vec<SchemaNode>,
}

/// A data node as described in the schema document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SchemaNode {
    Container {
        name: String,
        #[serde(default)]
        children: Vec<SchemaNode>,
    },
    List {
        name: String,
        keys: Vec<String>,
        #[serde(default)]
        children: Vec<SchemaNode>,
    },
    Leaf {
        name: String,
        #[serde(rename = "type")]
        ty: LeafType,
    },
    LeafList {
        name: String,
        #[serde(rename = "type")]
        ty: LeafType,
    },
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    modules: Vec<Module>,
}

/// Identity of a module in the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub namespace: String,
    pub prefix: Option<String>,
    pub revision: Option<String>,
    pub organization: Option<String>,
    pub version: Option<String>,
}

/// Kind of a compiled data node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Container,
    List { keys: Vec<QName> },
    Leaf(LeafType),
    LeafList(LeafType),
}

/// A compiled data node with fully qualified names.
#[derive(Debug, Clone)]
pub struct DataSchemaNode {
    qname: QName,
    kind: NodeKind,
    children: Vec<DataSchemaNode>,
}

impl DataSchemaNode {
    /// Returns the qualified name.
    pub fn qname(&self) -> &QName {
        &self.qname
    }

    /// Returns the node kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns the child data nodes, augmentations included.
    pub fn children(&self) -> &[DataSchemaNode] {
        &self.children
    }

    /// Returns the leaf type for leaves and leaf-lists.
    pub fn leaf_type(&self) -> Option<&LeafType> {
        match &self.kind {
            NodeKind::Leaf(ty) | NodeKind::LeafList(ty) => Some(ty),
            _ => None,
        }
    }

    /// Returns the key names of a list, empty for other kinds.
    pub fn list_keys(&self) -> &[QName] {
        match &self.kind {
            NodeKind::List { keys } => keys,
            _ => &[],
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, NodeKind::List { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub fn is_leaf_list(&self) -> bool {
        matches!(self.kind, NodeKind::LeafList(_))
    }

    /// Finds a child by local name, optionally restricted to one namespace.
    ///
    /// Without a namespace the first child with that local name wins.
    pub fn child(&self, name: &str, namespace: Option<&str>) -> Option<&DataSchemaNode> {
        find_node(&self.children, name, namespace)
    }

    /// Finds a child by qualified name.
    pub fn child_by_qname(&self, qname: &QName) -> Option<&DataSchemaNode> {
        self.children.iter().find(|c| &c.qname == qname)
    }
}

fn find_node<'a>(
    nodes: &'a [DataSchemaNode],
    name: &str,
    namespace: Option<&str>,
) -> Option<&'a DataSchemaNode> {
    nodes.iter().find(|n| {
        n.qname.name == name && namespace.map_or(true, |ns| n.qname.namespace == ns)
    })
}

/// The compiled module set.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    modules: Vec<ModuleInfo>,
    roots: Vec<DataSchemaNode>,
}

impl SchemaContext {
    /// Returns a context without modules.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compiles a set of modules, applying their augments.
    pub fn from_modules(modules: Vec<Module>) -> Result<Self, SchemaError> {
        let mut names = HashSet::new();
        let mut namespaces = HashSet::new();
        for module in &modules {
            if !names.insert(module.name.clone()) {
                return Err(SchemaError::DuplicateModule(module.name.clone()));
            }
            if !namespaces.insert(module.namespace.clone()) {
                return Err(SchemaError::DuplicateNamespace(module.namespace.clone()));
            }
        }

        let infos: Vec<ModuleInfo> = modules
            .iter()
            .map(|m| ModuleInfo {
                name: m.name.clone(),
                namespace: m.namespace.clone(),
                prefix: m.prefix.clone(),
                revision: m.revision.clone(),
                organization: m.organization.clone(),
                version: m.version.clone(),
            })
            .collect();

        let mut roots = Vec::new();
        for module in &modules {
            for node in &module.nodes {
                roots.push(compile(node, &module.namespace)?);
            }
        }

        for module in &modules {
            for augment in &module.augments {
                let target = resolve_augment_target(&infos, &mut roots, &augment.target)?;
                for node in &augment.nodes {
                    target.children.push(compile(node, &module.namespace)?);
                }
            }
        }

        Ok(Self {
            modules: infos,
            roots,
        })
    }

    /// Parses and compiles a JSON schema document.
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let doc: SchemaDocument = serde_json::from_str(json)?;
        Self::from_modules(doc.modules)
    }

    /// Reads, parses and compiles a JSON schema document from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Returns all modules.
    pub fn modules(&self) -> &[ModuleInfo] {
        &self.modules
    }

    /// Looks a module up by namespace URI.
    pub fn module_by_namespace(&self, namespace: &str) -> Option<&ModuleInfo> {
        self.modules.iter().find(|m| m.namespace == namespace)
    }

    /// Looks a module up by name.
    pub fn module_by_name(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Returns the top-level data nodes of all modules.
    pub fn root_nodes(&self) -> &[DataSchemaNode] {
        &self.roots
    }

    /// Finds a top-level node by local name, optionally restricted to a namespace.
    pub fn find_root(&self, name: &str, namespace: Option<&str>) -> Option<&DataSchemaNode> {
        find_node(&self.roots, name, namespace)
    }

    /// Resolves an identifier to its schema node. The root has no node.
    pub fn resolve(&self, id: &NodeIdentifier) -> Option<&DataSchemaNode> {
        let mut steps = id.steps().iter();
        let first = steps.next()?;
        let mut node = self.roots.iter().find(|n| &n.qname == first.name())?;
        for step in steps {
            node = node.child_by_qname(step.name())?;
        }
        Some(node)
    }

    /// Returns the child nodes available under `id` (top-level nodes for the root).
    pub fn children_of(&self, id: &NodeIdentifier) -> Option<&[DataSchemaNode]> {
        if id.is_root() {
            return Some(&self.roots);
        }
        self.resolve(id).map(|n| n.children())
    }
}

fn compile(node: &SchemaNode, namespace: &str) -> Result<DataSchemaNode, SchemaError> {
    let compile_all = |children: &[SchemaNode]| -> Result<Vec<DataSchemaNode>, SchemaError> {
        children.iter().map(|c| compile(c, namespace)).collect()
    };
    let compiled = match node {
        SchemaNode::Container { name, children } => DataSchemaNode {
            qname: QName::new(namespace, name),
            kind: NodeKind::Container,
            children: compile_all(children)?,
        },
        SchemaNode::List {
            name,
            keys,
            children,
        } => {
            let children = compile_all(children)?;
            for key in keys {
                if !children.iter().any(|c| c.is_leaf() && &c.qname.name == key) {
                    return Err(SchemaError::UnknownKey {
                        list: name.clone(),
                        key: key.clone(),
                    });
                }
            }
            DataSchemaNode {
                qname: QName::new(namespace, name),
                kind: NodeKind::List {
                    keys: keys.iter().map(|k| QName::new(namespace, k)).collect(),
                },
                children,
            }
        }
        SchemaNode::Leaf { name, ty } => DataSchemaNode {
            qname: QName::new(namespace, name),
            kind: NodeKind::Leaf(ty.clone()),
            children: Vec::new(),
        },
        SchemaNode::LeafList { name, ty } => DataSchemaNode {
            qname: QName::new(namespace, name),
            kind: NodeKind::LeafList(ty.clone()),
            children: Vec::new(),
        },
    };
    Ok(compiled)
}

fn resolve_augment_target<'a>(
    modules: &[ModuleInfo],
    roots: &'a mut [DataSchemaNode],
    target: &str,
) -> Result<&'a mut DataSchemaNode, SchemaError> {
    let unknown = || SchemaError::UnknownAugmentTarget(target.to_string());

    let mut namespace: Option<String> = None;
    let mut qnames = Vec::new();
    for segment in target.trim_start_matches('/').split('/') {
        let name = match segment.split_once(':') {
            Some((prefix, name)) => {
                let module = modules
                    .iter()
                    .find(|m| m.name == prefix || m.prefix.as_deref() == Some(prefix))
                    .ok_or_else(unknown)?;
                namespace = Some(module.namespace.clone());
                name
            }
            None => segment,
        };
        let ns = namespace.clone().ok_or_else(unknown)?;
        qnames.push(QName::new(ns, name));
    }

    let (first, rest) = qnames.split_first().ok_or_else(unknown)?;
    let mut node = roots
        .iter_mut()
        .find(|n| &n.qname == first)
        .ok_or_else(unknown)?;
    for qname in rest {
        node = node
            .children
            .iter_mut()
            .find(|c| &c.qname == qname)
            .ok_or_else(unknown)?;
    }
    match node.kind {
        NodeKind::Container | NodeKind::List { .. } => Ok(node),
        _ => Err(unknown()),
    }
}

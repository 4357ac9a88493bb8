//! Normalized data tree nodes.

use crate::{LeafValue, PathArgument, QName};

/// A typed data tree attached to a [`NodeIdentifier`](crate::NodeIdentifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedNode {
    /// A single scalar leaf.
    Leaf { name: QName, value: LeafValue },
    /// An ordered set of scalar values.
    LeafList { name: QName, values: Vec<LeafValue> },
    /// A container and its children.
    Container {
        name: QName,
        children: Vec<NormalizedNode>,
    },
    /// A list root; every entry is a [`NormalizedNode::ListEntry`].
    List {
        name: QName,
        entries: Vec<NormalizedNode>,
    },
    /// One list entry with its key values and children (keys included).
    ListEntry {
        name: QName,
        keys: Vec<(QName, LeafValue)>,
        children: Vec<NormalizedNode>,
    },
    /// Synthetic wrapper grouping nodes contributed by an augmenting module.
    ///
    /// It has no name of its own and is transparent in paths and JSON.
    Augmentation { children: Vec<NormalizedNode> },
}

impl NormalizedNode {
    /// Creates a leaf.
    pub fn leaf(name: QName, value: impl Into<LeafValue>) -> Self {
        NormalizedNode::Leaf {
            name,
            value: value.into(),
        }
    }

    /// Creates a container.
    pub fn container(name: QName, children: Vec<NormalizedNode>) -> Self {
        NormalizedNode::Container { name, children }
    }

    /// Creates a list entry.
    pub fn list_entry(
        name: QName,
        keys: Vec<(QName, LeafValue)>,
        children: Vec<NormalizedNode>,
    ) -> Self {
        NormalizedNode::ListEntry {
            name,
            keys,
            children,
        }
    }

    /// Returns the node name; `None` for augmentation wrappers.
    pub fn name(&self) -> Option<&QName> {
        match self {
            NormalizedNode::Leaf { name, .. }
            | NormalizedNode::LeafList { name, .. }
            | NormalizedNode::Container { name, .. }
            | NormalizedNode::List { name, .. }
            | NormalizedNode::ListEntry { name, .. } => Some(name),
            NormalizedNode::Augmentation { .. } => None,
        }
    }

    /// Returns the path step that addresses this node inside its parent.
    pub fn path_argument(&self) -> Option<PathArgument> {
        match self {
            NormalizedNode::ListEntry { name, keys, .. } => Some(PathArgument::Entry {
                name: name.clone(),
                keys: keys.clone(),
            }),
            NormalizedNode::Augmentation { .. } => None,
            other => other.name().cloned().map(PathArgument::Node),
        }
    }

    /// Returns true for leaves and leaf-lists.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            NormalizedNode::Leaf { .. } | NormalizedNode::LeafList { .. }
        )
    }

    /// Returns the direct children (list entries for lists).
    pub fn children(&self) -> &[NormalizedNode] {
        match self {
            NormalizedNode::Container { children, .. }
            | NormalizedNode::ListEntry { children, .. }
            | NormalizedNode::Augmentation { children } => children,
            NormalizedNode::List { entries, .. } => entries,
            NormalizedNode::Leaf { .. } | NormalizedNode::LeafList { .. } => &[],
        }
    }

    /// Finds a child by path step, looking through augmentation wrappers.
    pub fn child(&self, step: &PathArgument) -> Option<&NormalizedNode> {
        for child in self.children() {
            if let NormalizedNode::Augmentation { .. } = child {
                if let Some(found) = child.child(step) {
                    return Some(found);
                }
            } else if child.path_argument().as_ref() == Some(step) {
                return Some(child);
            }
        }
        None
    }

    /// Returns the node with empty structural nodes pruned away.
    ///
    /// Containers, lists and augmentation wrappers without (non-empty)
    /// children vanish. List entries keep their keys, so they are pruned only
    /// when they carry no key and no other child. `None` means the whole
    /// tree normalizes to nothing.
    pub fn normalized(&self) -> Option<NormalizedNode> {
        let prune = |children: &[NormalizedNode]| -> Vec<NormalizedNode> {
            children.iter().filter_map(NormalizedNode::normalized).collect()
        };
        match self {
            NormalizedNode::Leaf { .. } | NormalizedNode::LeafList { .. } => Some(self.clone()),
            NormalizedNode::Container { name, children } => {
                let children = prune(children);
                (!children.is_empty()).then(|| NormalizedNode::Container {
                    name: name.clone(),
                    children,
                })
            }
            NormalizedNode::List { name, entries } => {
                let entries = prune(entries);
                (!entries.is_empty()).then(|| NormalizedNode::List {
                    name: name.clone(),
                    entries,
                })
            }
            NormalizedNode::ListEntry {
                name,
                keys,
                children,
            } => {
                let children = prune(children);
                (!children.is_empty() || !keys.is_empty()).then(|| NormalizedNode::ListEntry {
                    name: name.clone(),
                    keys: keys.clone(),
                    children,
                })
            }
            NormalizedNode::Augmentation { children } => {
                let children = prune(children);
                (!children.is_empty()).then_some(NormalizedNode::Augmentation { children })
            }
        }
    }

    /// Returns true if this tree normalizes to nothing.
    pub fn is_structurally_empty(&self) -> bool {
        self.normalized().is_none()
    }

    /// Merges `other` into this node.
    ///
    /// Children with the same path step are merged recursively; scalar
    /// children from `other` replace existing ones.
    pub fn merge(&mut self, other: NormalizedNode) {
        let incoming = match other {
            NormalizedNode::Container { children, .. }
            | NormalizedNode::ListEntry { children, .. }
            | NormalizedNode::Augmentation { children } => children,
            NormalizedNode::List { entries, .. } => entries,
            scalar => {
                *self = scalar;
                return;
            }
        };
        let target = match self {
            NormalizedNode::Container { children, .. }
            | NormalizedNode::ListEntry { children, .. }
            | NormalizedNode::Augmentation { children } => children,
            NormalizedNode::List { entries, .. } => entries,
            NormalizedNode::Leaf { .. } | NormalizedNode::LeafList { .. } => return,
        };
        for child in flatten_augmentations(incoming) {
            let step = child.path_argument();
            match target
                .iter_mut()
                .find(|existing| step.is_some() && existing.path_argument() == step)
            {
                Some(existing) => existing.merge(child),
                None => target.push(child),
            }
        }
    }
}

fn flatten_augmentations(children: Vec<NormalizedNode>) -> Vec<NormalizedNode> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        match child {
            NormalizedNode::Augmentation { children } => {
                out.extend(flatten_augmentations(children))
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NS: &str = "urn:test";

    fn q(name: &str) -> QName {
        QName::new(NS, name)
    }

    #[test]
    fn test_empty_container_is_structurally_empty() {
        let node = NormalizedNode::container(q("interfaces"), vec![]);
        assert!(node.is_structurally_empty());

        let nested = NormalizedNode::container(
            q("interfaces"),
            vec![NormalizedNode::Augmentation { children: vec![] }],
        );
        assert!(nested.is_structurally_empty());
    }

    #[test]
    fn test_leaf_is_never_empty() {
        let node = NormalizedNode::leaf(q("enabled"), true);
        assert!(!node.is_structurally_empty());
        assert!(node.is_scalar());
    }

    #[test]
    fn test_normalized_prunes_empty_children() {
        let node = NormalizedNode::container(
            q("system"),
            vec![
                NormalizedNode::container(q("config"), vec![]),
                NormalizedNode::leaf(q("hostname"), "leaf1"),
            ],
        );
        assert_eq!(
            node.normalized(),
            Some(NormalizedNode::container(
                q("system"),
                vec![NormalizedNode::leaf(q("hostname"), "leaf1")]
            ))
        );
    }

    #[test]
    fn test_child_looks_through_augmentation() {
        let node = NormalizedNode::container(
            q("interface"),
            vec![NormalizedNode::Augmentation {
                children: vec![NormalizedNode::leaf(QName::new("urn:aug", "mtu"), 9100u64)],
            }],
        );
        let step = PathArgument::Node(QName::new("urn:aug", "mtu"));
        assert_eq!(
            node.child(&step),
            Some(&NormalizedNode::leaf(QName::new("urn:aug", "mtu"), 9100u64))
        );
    }

    #[test]
    fn test_merge_combines_children() {
        let mut a = NormalizedNode::container(
            q("config"),
            vec![NormalizedNode::leaf(q("name"), "eth0")],
        );
        a.merge(NormalizedNode::container(
            q("config"),
            vec![
                NormalizedNode::leaf(q("name"), "eth0"),
                NormalizedNode::leaf(q("mtu"), 1500u64),
            ],
        ));
        assert_eq!(a.children().len(), 2);
    }
}

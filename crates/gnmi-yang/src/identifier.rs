//! Hierarchical instance identifiers.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{LeafValue, QName};

/// One step of a [`NodeIdentifier`].
///
/// Entry steps compare and hash without regard to key predicate order.
#[derive(Debug, Clone)]
pub enum PathArgument {
    /// A container, leaf, or list root.
    Node(QName),
    /// A single list entry, selected by its key predicates.
    Entry {
        name: QName,
        keys: Vec<(QName, LeafValue)>,
    },
}

impl PathArgument {
    /// Returns the node name of this step.
    pub fn name(&self) -> &QName {
        match self {
            PathArgument::Node(name) | PathArgument::Entry { name, .. } => name,
        }
    }

    /// Returns the key predicates, empty for plain nodes.
    pub fn keys(&self) -> &[(QName, LeafValue)] {
        match self {
            PathArgument::Node(_) => &[],
            PathArgument::Entry { keys, .. } => keys,
        }
    }

    /// Returns true if this step selects a list entry.
    pub fn is_entry(&self) -> bool {
        matches!(self, PathArgument::Entry { .. })
    }

    fn sorted_keys(&self) -> Vec<&(QName, LeafValue)> {
        let mut keys: Vec<_> = self.keys().iter().collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0));
        keys
    }
}

impl PartialEq for PathArgument {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PathArgument::Node(a), PathArgument::Node(b)) => a == b,
            (PathArgument::Entry { name: a, keys: ka }, PathArgument::Entry { name: b, keys: kb }) => {
                a == b && ka.len() == kb.len() && self.sorted_keys() == other.sorted_keys()
            }
            _ => false,
        }
    }
}

impl Eq for PathArgument {}

impl Hash for PathArgument {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.is_entry().hash(state);
        self.name().hash(state);
        self.sorted_keys().hash(state);
    }
}

impl fmt::Display for PathArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().local_name())?;
        if !self.keys().is_empty() {
            let preds: Vec<String> = self
                .keys()
                .iter()
                .map(|(k, v)| format!("{}={}", k.local_name(), v))
                .collect();
            write!(f, "[{}]", preds.join(";"))?;
        }
        Ok(())
    }
}

/// Ordered path of steps locating a node in the data tree.
///
/// The root is the empty sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodeIdentifier {
    steps: Vec<PathArgument>,
}

impl NodeIdentifier {
    /// Returns the root identifier.
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates an identifier from its steps.
    pub fn from_steps(steps: Vec<PathArgument>) -> Self {
        Self { steps }
    }

    /// Appends a plain node step.
    pub fn node(mut self, name: QName) -> Self {
        self.steps.push(PathArgument::Node(name));
        self
    }

    /// Appends a list entry step.
    pub fn entry(mut self, name: QName, keys: Vec<(QName, LeafValue)>) -> Self {
        self.steps.push(PathArgument::Entry { name, keys });
        self
    }

    /// Returns a new identifier extended by one step.
    pub fn child(&self, step: PathArgument) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    /// Returns the steps.
    pub fn steps(&self) -> &[PathArgument] {
        &self.steps
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true for the root identifier.
    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Alias of [`is_root`](Self::is_root).
    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    /// Returns the first step, if any.
    pub fn first(&self) -> Option<&PathArgument> {
        self.steps.first()
    }

    /// Returns the last step, if any.
    pub fn last(&self) -> Option<&PathArgument> {
        self.steps.last()
    }

    /// Returns the parent identifier, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.steps.is_empty() {
            return None;
        }
        Some(Self {
            steps: self.steps[..self.steps.len() - 1].to_vec(),
        })
    }

    /// Returns true if `ancestor` is a prefix of (or equal to) this identifier.
    pub fn starts_with(&self, ancestor: &NodeIdentifier) -> bool {
        self.steps.starts_with(&ancestor.steps)
    }

    /// Returns the steps below `ancestor`, `None` if it is not an ancestor.
    pub fn relative_to(&self, ancestor: &NodeIdentifier) -> Option<&[PathArgument]> {
        if self.starts_with(ancestor) {
            Some(&self.steps[ancestor.steps.len()..])
        } else {
            None
        }
    }
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

impl FromIterator<PathArgument> for NodeIdentifier {
    fn from_iter<I: IntoIterator<Item = PathArgument>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

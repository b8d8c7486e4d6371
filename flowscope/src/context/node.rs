//! Context nodes and the stack they form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of workflow node a tracked function represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A single unit of work.
    Job,
    /// A top-level composition of jobs.
    Flow,
    /// A flow nested inside another flow.
    Subflow,
}

impl NodeKind {
    /// Returns the lowercase name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Flow => "flow",
            Self::Subflow => "subflow",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame of nested execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextNode {
    /// The tracked function's name.
    pub name: String,
    /// What kind of node this is.
    pub kind: NodeKind,
}

impl ContextNode {
    /// Creates a new node.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Creates a job node.
    #[must_use]
    pub fn job(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Job)
    }

    /// Creates a flow node.
    #[must_use]
    pub fn flow(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Flow)
    }

    /// Creates a subflow node.
    #[must_use]
    pub fn subflow(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Subflow)
    }
}

/// The current nesting path, outermost node first.
///
/// Serializes as a plain JSON array of nodes so it can travel inside a
/// [`ContextEnvelope`](crate::envelope::ContextEnvelope).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextStack {
    nodes: Vec<ContextNode>,
}

impl ContextStack {
    /// Creates an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Returns a new stack with `node` appended.
    #[must_use]
    pub fn pushed(&self, node: ContextNode) -> Self {
        let mut nodes = Vec::with_capacity(self.nodes.len() + 1);
        nodes.extend(self.nodes.iter().cloned());
        nodes.push(node);
        Self { nodes }
    }

    /// Returns true if no node is on the stack.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the depth of the stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the nodes, outermost first.
    #[must_use]
    pub fn nodes(&self) -> &[ContextNode] {
        &self.nodes
    }

    /// Returns the innermost node.
    #[must_use]
    pub fn last(&self) -> Option<&ContextNode> {
        self.nodes.last()
    }

    /// Iterates over the nodes, outermost first.
    pub fn iter(&self) -> std::slice::Iter<'_, ContextNode> {
        self.nodes.iter()
    }

    /// Returns the slash-joined node names, e.g. `flow1/subflow2/job3`.
    #[must_use]
    pub fn path(&self) -> String {
        self.nodes
            .iter()
            .map(|n| n.name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl From<Vec<ContextNode>> for ContextStack {
    fn from(nodes: Vec<ContextNode>) -> Self {
        Self { nodes }
    }
}

impl FromIterator<ContextNode> for ContextStack {
    fn from_iter<I: IntoIterator<Item = ContextNode>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ContextStack {
    type Item = &'a ContextNode;
    type IntoIter = std::slice::Iter<'a, ContextNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl fmt::Display for ContextStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

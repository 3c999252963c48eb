//! # Syntax tree
//!
//! An arena of typed nodes addressed by [`NodeId`]. Every node has at most
//! one parent: attaching a node anywhere first detaches it from its previous
//! parent.

use smartstring::alias::String;
use std::fmt::{self, Write};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Literal value attached to a leaf node.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f64),
    Double(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::UInt(v) => write!(f, "{v}"),
            Scalar::Float(v) | Scalar::Double(v) => write!(f, "{v}"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Str(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: String,
    pub value: Option<Scalar>,
    /// Operator of `BinOp`/`UnaryOp`-like nodes.
    pub op: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("cannot attach {child:?} below itself ({parent:?})")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("index {index} out of range for a node with {len} children")]
    Index { index: usize, len: usize },
}

#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn new_node(&mut self, kind: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind: kind.into(),
            value: None,
            op: None,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn leaf(&mut self, kind: &str, value: Scalar) -> NodeId {
        let id = self.new_node(kind);
        self.nodes[id.0].value = Some(value);
        id
    }

    pub fn op_node(&mut self, kind: &str, op: &str) -> NodeId {
        let id = self.new_node(kind);
        self.nodes[id.0].op = Some(op.into());
        id
    }

    /// Creates a node and attaches `children` in order.
    pub fn branch(&mut self, kind: &str, children: &[NodeId]) -> Result<NodeId, TreeError> {
        let id = self.new_node(kind);
        for &child in children {
            self.push(id, child)?;
        }
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(id.0).ok_or(TreeError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes.get_mut(id.0).ok_or(TreeError::UnknownNode(id))
    }

    pub fn kind(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(|n| n.kind.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub fn set_value(&mut self, id: NodeId, value: Scalar) -> Result<(), TreeError> {
        self.node_mut(id)?.value = Some(value);
        Ok(())
    }

    /// Appends `child` to `parent`.
    pub fn push(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check_attach(parent, child)?;
        self.detach(child)?;
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    /// Inserts `child` at `index` among `parent`'s children. The index is
    /// taken after `child` has been detached.
    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), TreeError> {
        self.check_attach(parent, child)?;
        let siblings = self.node(parent)?.children.len();
        let len = siblings - usize::from(self.node(child)?.parent == Some(parent));
        if index > len {
            return Err(TreeError::Index { index, len });
        }
        self.detach(child)?;
        self.nodes[parent.0].children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    /// Removes `child` from `parent`, leaving it parentless.
    pub fn remove(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let children = &mut self.node_mut(parent)?.children;
        let Some(i) = children.iter().position(|&c| c == child) else {
            return Err(TreeError::NotAChild { parent, child });
        };
        children.remove(i);
        self.node_mut(child)?.parent = None;
        Ok(())
    }

    /// Puts `new` in `old`'s place under `parent`; `old` becomes parentless.
    pub fn replace(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> Result<(), TreeError> {
        if old == new {
            return Ok(());
        }
        if !self.node(parent)?.children.contains(&old) {
            return Err(TreeError::NotAChild { parent, child: old });
        }
        self.check_attach(parent, new)?;
        self.detach(new)?;
        let children = &mut self.nodes[parent.0].children;
        if let Some(slot) = children.iter_mut().find(|c| **c == old) {
            *slot = new;
        }
        self.nodes[old.0].parent = None;
        self.nodes[new.0].parent = Some(parent);
        Ok(())
    }

    /// Detaches `id` from its parent, if it has one.
    pub fn detach(&mut self, id: NodeId) -> Result<(), TreeError> {
        match self.node(id)?.parent {
            Some(parent) => self.remove(parent, id),
            None => Ok(()),
        }
    }

    fn check_attach(&self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.node(child)?;
        let mut cur = Some(parent);
        while let Some(id) = cur {
            if id == child {
                return Err(TreeError::Cycle { parent, child });
            }
            cur = self.node(id)?.parent;
        }
        Ok(())
    }

    /// Indented dump of the subtree at `root`, one `-` per depth level.
    pub fn render(&self, root: NodeId) -> std::string::String {
        let mut out = std::string::String::new();
        self.render_into(&mut out, root, 0);
        out
    }

    fn render_into(&self, out: &mut std::string::String, id: NodeId, depth: usize) {
        let Some(node) = self.get(id) else {
            return;
        };
        let tab = "-".repeat(depth);
        let _ = write!(out, "{tab}{}", node.kind);
        if let Some(value) = &node.value {
            let _ = write!(out, " : {value}");
        } else if let Some(op) = &node.op {
            let _ = write!(out, " ({op})");
        }
        out.push_str(" {\n");
        for &child in &node.children {
            self.render_into(out, child, depth + 1);
        }
        let _ = writeln!(out, "{tab}}}");
    }
}

use std::collections::BTreeMap;

use serde_json::Value;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ids::NodeId;

pub type Attributes = BTreeMap<String, Value>;

/// Half-open character range inside a node's text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

/// Inline formatting span attached to a text-bearing node.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mark {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub mark_type: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub range: Option<TextRange>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub attrs: Attributes,
}

impl Mark {
    pub fn new(mark_type: impl Into<String>) -> Self {
        Self {
            mark_type: mark_type.into(),
            range: None,
            attrs: Attributes::new(),
        }
    }

    pub fn with_range(mut self, start: usize, end: usize) -> Self {
        self.range = Some(TextRange { start, end });
        self
    }
}

/// Shape classification derived from field presence.
///
/// The schema is the authoritative classifier; this is the fallback used when
/// no schema is attached or a type is unknown to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Carries a text payload.
    Text,
    /// Has a `children` list (possibly empty) and no text.
    Container,
    /// Neither text nor children, e.g. an image or a horizontal rule.
    Leaf,
}

/// A stored node. The store's table is the only owner; `parent` and
/// `children` hold identifiers, never references.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    pub id: NodeId,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub node_type: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<NodeId>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub children: Option<Vec<NodeId>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub text: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub attributes: Attributes,
    #[cfg_attr(feature = "serde", serde(default))]
    pub marks: Vec<Mark>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: Attributes,
}

impl Node {
    pub fn new(id: NodeId, node_type: impl Into<String>) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            parent: None,
            children: None,
            text: None,
            attributes: Attributes::new(),
            marks: Vec::new(),
            metadata: Attributes::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        if self.text.is_some() {
            NodeKind::Text
        } else if self.children.is_some() {
            NodeKind::Container
        } else {
            NodeKind::Leaf
        }
    }

    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn is_container(&self) -> bool {
        self.children.is_some()
    }

    /// Child ids in document order; empty for leaves.
    pub fn child_ids(&self) -> &[NodeId] {
        self.children.as_deref().unwrap_or_default()
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Id-less node shape exchanged with format converters and the range
/// serializer. `content: Some(..)` marks a container, even when empty.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeFragment {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub node_type: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Attributes::is_empty")
    )]
    pub attributes: Attributes,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub content: Option<Vec<NodeFragment>>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub text: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub marks: Vec<Mark>,
}

impl NodeFragment {
    pub fn container(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            content: Some(Vec::new()),
            ..Self::default()
        }
    }

    pub fn text(node_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn leaf(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            ..Self::default()
        }
    }

    pub fn with_child(mut self, child: NodeFragment) -> Self {
        self.content.get_or_insert_with(Vec::new).push(child);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_mark(mut self, mark: Mark) -> Self {
        self.marks.push(mark);
        self
    }

    /// Fragment carrying a node's own fields, without its children.
    pub fn from_node(node: &Node) -> Self {
        Self {
            node_type: node.node_type.clone(),
            attributes: node.attributes.clone(),
            content: node.children.as_ref().map(|_| Vec::new()),
            text: node.text.clone(),
            marks: node.marks.clone(),
        }
    }
}

/// Denormalized read-only view: a node with its children expanded.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeTree {
    pub node: Node,
    pub children: Vec<NodeTree>,
}

impl NodeTree {
    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// Convert back into the id-less converter shape.
    pub fn to_fragment(&self) -> NodeFragment {
        let mut fragment = NodeFragment::from_node(&self.node);
        if !self.children.is_empty() {
            fragment.content = Some(self.children.iter().map(NodeTree::to_fragment).collect());
        }
        fragment
    }
}

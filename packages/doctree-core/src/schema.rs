use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::drop_behavior::DropBehavior;

/// Wildcard key accepted in `drop_behavior_rules` and rule registrations.
pub const WILDCARD: &str = "*";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NodeGroup {
    Document,
    Block,
    Inline,
}

/// Per-type metadata looked up from the active schema.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct NodeTypeSpec {
    pub group: NodeGroup,
    /// Content grammar such as `"block+"`. Carried for consumers; not evaluated here.
    #[cfg_attr(feature = "serde", serde(default))]
    pub content: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub editable: Option<bool>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub selectable: Option<bool>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub draggable: Option<bool>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub droppable: Option<bool>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub indentable: Option<bool>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub indent_group: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub indent_parent_types: Option<Vec<String>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_indent_level: Option<usize>,
    /// Source type (or `*`) to default drop action when dropped onto this type.
    #[cfg_attr(feature = "serde", serde(default))]
    pub drop_behavior_rules: BTreeMap<String, DropBehavior>,
}

impl NodeTypeSpec {
    pub fn new(group: NodeGroup) -> Self {
        Self {
            group,
            content: None,
            editable: None,
            selectable: None,
            draggable: None,
            droppable: None,
            indentable: None,
            indent_group: None,
            indent_parent_types: None,
            max_indent_level: None,
            drop_behavior_rules: BTreeMap::new(),
        }
    }

    pub fn document() -> Self {
        Self::new(NodeGroup::Document)
    }

    pub fn block() -> Self {
        Self::new(NodeGroup::Block)
    }

    pub fn inline() -> Self {
        Self::new(NodeGroup::Inline)
    }

    pub fn content(mut self, expr: impl Into<String>) -> Self {
        self.content = Some(expr.into());
        self
    }

    pub fn editable(mut self, value: bool) -> Self {
        self.editable = Some(value);
        self
    }

    pub fn selectable(mut self, value: bool) -> Self {
        self.selectable = Some(value);
        self
    }

    pub fn draggable(mut self, value: bool) -> Self {
        self.draggable = Some(value);
        self
    }

    pub fn droppable(mut self, value: bool) -> Self {
        self.droppable = Some(value);
        self
    }

    pub fn indentable(mut self, value: bool) -> Self {
        self.indentable = Some(value);
        self
    }

    pub fn indent_group(mut self, group: impl Into<String>) -> Self {
        self.indent_group = Some(group.into());
        self
    }

    pub fn indent_parent_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indent_parent_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn max_indent_level(mut self, level: usize) -> Self {
        self.max_indent_level = Some(level);
        self
    }

    pub fn drop_rule(mut self, source: impl Into<String>, behavior: DropBehavior) -> Self {
        self.drop_behavior_rules.insert(source.into(), behavior);
        self
    }
}

/// Externally owned schema. The store only ever reads from it.
pub trait SchemaProvider {
    fn node_type(&self, name: &str) -> Option<&NodeTypeSpec>;
}

/// Map-backed schema for embedding and tests.
#[derive(Clone, Debug, Default)]
pub struct MemorySchema {
    types: HashMap<String, NodeTypeSpec>,
}

impl MemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, name: impl Into<String>, spec: NodeTypeSpec) -> Self {
        self.types.insert(name.into(), spec);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: NodeTypeSpec) {
        self.types.insert(name.into(), spec);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl SchemaProvider for MemorySchema {
    fn node_type(&self, name: &str) -> Option<&NodeTypeSpec> {
        self.types.get(name)
    }
}

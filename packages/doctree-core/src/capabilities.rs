//! Editing capability classification.
//!
//! The schema's type metadata decides first: the group, then an explicit
//! boolean flag. Without a schema entry the node's shape decides, and the
//! root stands in for the `document` group.

use crate::ids::NodeId;
use crate::node::{Node, NodeKind};
use crate::schema::{NodeGroup, NodeTypeSpec};
use crate::store::DocumentStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Editable,
    Selectable,
    Draggable,
    Droppable,
    Indentable,
}

impl Capability {
    fn flag(self, spec: &NodeTypeSpec) -> Option<bool> {
        match self {
            Capability::Editable => spec.editable,
            Capability::Selectable => spec.selectable,
            Capability::Draggable => spec.draggable,
            Capability::Droppable => spec.droppable,
            Capability::Indentable => spec.indentable,
        }
    }

    /// Answer when neither the group nor an explicit flag decides.
    fn fallback(self, node: &Node) -> bool {
        match self {
            Capability::Editable => node.kind() == NodeKind::Text,
            Capability::Selectable | Capability::Draggable => true,
            Capability::Droppable => node.is_container(),
            Capability::Indentable => false,
        }
    }
}

impl DocumentStore {
    /// Group from the schema, else inferred: root is `document`, text-bearing
    /// nodes are `inline`, everything else is `block`.
    pub fn node_group(&self, node: &Node) -> NodeGroup {
        if let Some(spec) = self.type_spec(&node.node_type) {
            return spec.group;
        }
        if self.root_node_id() == Some(node.id) {
            NodeGroup::Document
        } else if node.has_text() {
            NodeGroup::Inline
        } else {
            NodeGroup::Block
        }
    }

    pub fn has_capability(&self, id: NodeId, capability: Capability) -> bool {
        let Some(node) = self.get_node(id) else {
            return false;
        };
        let is_document = self.node_group(node) == NodeGroup::Document;
        if is_document && capability != Capability::Droppable {
            return false;
        }
        self.type_spec(&node.node_type)
            .and_then(|spec| capability.flag(spec))
            .unwrap_or_else(|| capability.fallback(node))
    }

    pub fn is_editable(&self, id: NodeId) -> bool {
        self.has_capability(id, Capability::Editable)
    }

    pub fn is_selectable(&self, id: NodeId) -> bool {
        self.has_capability(id, Capability::Selectable)
    }

    pub fn is_draggable(&self, id: NodeId) -> bool {
        self.has_capability(id, Capability::Draggable)
    }

    pub fn is_droppable(&self, id: NodeId) -> bool {
        self.has_capability(id, Capability::Droppable)
    }

    pub fn is_indentable(&self, id: NodeId) -> bool {
        self.has_capability(id, Capability::Indentable)
    }
}

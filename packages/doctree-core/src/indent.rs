use tracing::debug;

use crate::ids::NodeId;
use crate::node::Node;
use crate::store::DocumentStore;

impl DocumentStore {
    /// Make `id` the last child of its previous sibling.
    ///
    /// Returns `false`, leaving the document untouched, when the node is not
    /// indentable, has no previous sibling, the sibling's type is not an
    /// allowed indent parent, or the node already sits at the maximum level.
    pub fn indent_node(&mut self, id: NodeId) -> bool {
        if !self.is_indentable(id) {
            return false;
        }
        let Some(node) = self.get_node(id) else {
            return false;
        };
        let Some(prev) = self.previous_sibling(id) else {
            debug!(node = %id, "indent refused: no previous sibling");
            return false;
        };
        let spec = self.type_spec(&node.node_type);
        if let Some(allowed) = spec.and_then(|s| s.indent_parent_types.as_ref()) {
            if !allowed.iter().any(|t| *t == prev.node_type) {
                debug!(
                    node = %id,
                    parent_type = %prev.node_type,
                    "indent refused: parent type not allowed"
                );
                return false;
            }
        }
        if let Some(max) = spec.and_then(|s| s.max_indent_level) {
            let level = self.indent_level(node);
            if level >= max {
                debug!(node = %id, level, max, "indent refused: maximum level reached");
                return false;
            }
        }

        let new_parent = prev.id;
        let index = prev.child_ids().len();
        match self.move_node(id, new_parent, index) {
            Ok(()) => {
                debug!(node = %id, parent = %new_parent, "indented");
                true
            }
            Err(err) => {
                debug!(node = %id, error = %err, "indent refused");
                false
            }
        }
    }

    /// Move `id` out of its parent to sit right after it in the grandparent.
    ///
    /// Returns `false` when the node is not indentable or has no grandparent.
    pub fn outdent_node(&mut self, id: NodeId) -> bool {
        if !self.is_indentable(id) {
            return false;
        }
        let Some(parent) = self.parent(id) else {
            return false;
        };
        let parent_id = parent.id;
        let Some(grandparent) = self.parent(parent_id) else {
            debug!(node = %id, "outdent refused: already at top level");
            return false;
        };
        let grandparent_id = grandparent.id;
        let Some(index) = self.sibling_index(parent_id) else {
            return false;
        };
        match self.move_node(id, grandparent_id, index + 1) {
            Ok(()) => {
                debug!(node = %id, parent = %grandparent_id, "outdented");
                true
            }
            Err(err) => {
                debug!(node = %id, error = %err, "outdent refused");
                false
            }
        }
    }

    /// Number of ancestors that count towards the node's nesting level:
    /// indentable ancestors and those sharing its indent group.
    fn indent_level(&self, node: &Node) -> usize {
        let group = self
            .type_spec(&node.node_type)
            .and_then(|s| s.indent_group.as_deref());
        self.ancestors(node.id)
            .into_iter()
            .filter_map(|a| self.get_node(a))
            .filter(|ancestor| match self.type_spec(&ancestor.node_type) {
                Some(spec) => {
                    spec.indentable == Some(true)
                        || (group.is_some() && spec.indent_group.as_deref() == group)
                }
                None => false,
            })
            .count()
    }
}

//! Search and materialization helpers.
//!
//! Full scans (`find_nodes*` taking predicates, attribute and text search)
//! cover every visible node, orphans included, and return results in id
//! order. Type and depth lookups go through the document iterator and only
//! see nodes reachable from the root.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::warn;

use crate::ids::NodeId;
use crate::iter::TraversalOptions;
use crate::node::{Node, NodeTree};
use crate::store::DocumentStore;

impl DocumentStore {
    pub fn find_nodes(&self, predicate: impl Fn(&Node) -> bool) -> Vec<&Node> {
        let mut found: Vec<&Node> = self.nodes().filter(|n| predicate(n)).collect();
        found.sort_by_key(|n| n.id);
        found
    }

    pub fn find_nodes_by_type(&self, node_type: &str) -> Vec<NodeId> {
        self.document_iter(TraversalOptions::new().node_type(node_type))
            .collect()
    }

    pub fn find_nodes_by_depth(&self, max_depth: usize) -> Vec<NodeId> {
        self.document_iter(TraversalOptions::new().max_depth(max_depth))
            .collect()
    }

    pub fn find_nodes_by_depth_matching(
        &self,
        max_depth: usize,
        predicate: impl Fn(&Node) -> bool,
    ) -> Vec<NodeId> {
        self.document_iter(
            TraversalOptions::new()
                .max_depth(max_depth)
                .filter(predicate),
        )
        .collect()
    }

    pub fn find_nodes_by_attribute(&self, key: &str, value: &Value) -> Vec<&Node> {
        self.find_nodes(|n| n.attributes.get(key) == Some(value))
    }

    /// Case-sensitive substring match. Blank queries match nothing.
    pub fn find_nodes_by_text(&self, needle: &str) -> Vec<&Node> {
        if needle.trim().is_empty() {
            return Vec::new();
        }
        self.find_nodes(|n| n.text.as_deref().is_some_and(|t| t.contains(needle)))
    }

    /// Substring search over node text. Blank queries match nothing.
    pub fn search_text(&self, query: &str, case_insensitive: bool) -> Vec<&Node> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        if !case_insensitive {
            return self.find_nodes_by_text(query);
        }
        let needle = query.to_lowercase();
        self.find_nodes(|n| {
            n.text
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(&needle))
        })
    }

    pub fn find_children_by_parent_id(&self, id: NodeId) -> Vec<&Node> {
        self.children(id)
    }

    /// Every visible node without a parent. More than one means orphans exist.
    pub fn find_root_nodes(&self) -> Vec<&Node> {
        self.find_nodes(|n| n.parent.is_none())
    }

    /// Node with its subtree expanded into owned copies.
    pub fn get_node_with_children(&self, id: NodeId) -> Option<NodeTree> {
        self.get_node(id)?;
        let mut preorder = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                warn!(node = %current, "node listed twice while expanding subtree");
                continue;
            }
            let Some(node) = self.get_node(current) else {
                continue;
            };
            preorder.push(node);
            stack.extend(node.child_ids().iter().rev().copied());
        }

        // children always follow their parent in pre-order, so building in
        // reverse finishes every child before its parent
        let mut built: HashMap<NodeId, NodeTree> = HashMap::new();
        for node in preorder.into_iter().rev() {
            let children = node
                .child_ids()
                .iter()
                .filter_map(|c| built.remove(c))
                .collect();
            built.insert(
                node.id,
                NodeTree {
                    node: node.clone(),
                    children,
                },
            );
        }
        built.remove(&id)
    }

    /// Expanded view of every root-reachable node, in document order.
    pub fn get_all_nodes_with_children(&self) -> Vec<NodeTree> {
        self.document_iter(TraversalOptions::new())
            .filter_map(|id| self.get_node_with_children(id))
            .collect()
    }
}

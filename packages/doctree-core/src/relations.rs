//! Derived relationships over the store: family lookups, paths, document
//! order and single-step document walks. Everything here reads through the
//! overlay and guards parent walks against cycles.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::warn;

use crate::error::{Error, Result};
use crate::ids::NodeId;
use crate::node::Node;
use crate::store::DocumentStore;

impl DocumentStore {
    pub fn parent(&self, id: NodeId) -> Option<&Node> {
        self.get_node(id)
            .and_then(|n| n.parent)
            .and_then(|p| self.get_node(p))
    }

    /// Children in document order; dangling child ids are skipped.
    pub fn children(&self, id: NodeId) -> Vec<&Node> {
        self.get_node(id)
            .map(|n| n.child_ids().iter().filter_map(|c| self.get_node(*c)).collect())
            .unwrap_or_default()
    }

    /// The other children of this node's parent, in document order.
    pub fn siblings(&self, id: NodeId) -> Vec<&Node> {
        match self.parent(id) {
            Some(parent) => self
                .children(parent.id)
                .into_iter()
                .filter(|n| n.id != id)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn sibling_index(&self, id: NodeId) -> Option<usize> {
        self.parent(id)?.child_ids().iter().position(|c| *c == id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<&Node> {
        let parent = self.parent(id)?;
        let idx = parent.child_ids().iter().position(|c| *c == id)?;
        let prev = parent.child_ids().get(idx.checked_sub(1)?)?;
        self.get_node(*prev)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<&Node> {
        let parent = self.parent(id)?;
        let idx = parent.child_ids().iter().position(|c| *c == id)?;
        let next = parent.child_ids().get(idx + 1)?;
        self.get_node(*next)
    }

    pub fn first_child(&self, id: NodeId) -> Option<&Node> {
        let first = self.get_node(id)?.child_ids().first()?;
        self.get_node(*first)
    }

    pub fn last_child(&self, id: NodeId) -> Option<&Node> {
        let last = self.get_node(id)?.child_ids().last()?;
        self.get_node(*last)
    }

    /// First child of this node's parent (possibly the node itself).
    pub fn first_sibling(&self, id: NodeId) -> Option<&Node> {
        self.first_child(self.parent(id)?.id)
    }

    /// Last child of this node's parent (possibly the node itself).
    pub fn last_sibling(&self, id: NodeId) -> Option<&Node> {
        self.last_child(self.parent(id)?.id)
    }

    /// Ancestor chain from `id` upwards, `id` first. `None` when a parent
    /// link is dangling or the chain loops.
    fn chain_to_top(&self, id: NodeId) -> Option<Vec<NodeId>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = id;
        loop {
            if !seen.insert(current) {
                warn!(node = %id, at = %current, "parent cycle detected");
                return None;
            }
            let node = self.get_node(current)?;
            chain.push(current);
            match node.parent {
                Some(parent) => current = parent,
                None => return Some(chain),
            }
        }
    }

    /// Ids from the top of the node's tree down to `id`. Empty when the node
    /// is missing, a parent link is broken, or the chain loops.
    pub fn node_path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = self.chain_to_top(id).unwrap_or_default();
        path.reverse();
        path
    }

    /// Number of edges from the top of the tree; `None` if unresolvable.
    pub fn node_depth(&self, id: NodeId) -> Option<usize> {
        self.node_path(id).len().checked_sub(1)
    }

    /// Whether `id` sits in the subtree rooted at `ancestor`. Reflexive.
    pub fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.chain_to_top(id)
            .map(|chain| chain.contains(&ancestor))
            .unwrap_or(false)
    }

    /// All ancestors, nearest first, excluding `id`.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        self.chain_to_top(id)
            .map(|chain| chain.into_iter().skip(1).collect())
            .unwrap_or_default()
    }

    /// All descendants in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<NodeId> = self
            .get_node(id)
            .map(|n| n.child_ids().iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                warn!(node = %current, "node reached twice while collecting descendants");
                continue;
            }
            let Some(node) = self.get_node(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.child_ids().iter().rev().copied());
        }
        out
    }

    /// Lowest node that is an ancestor-or-self of both `a` and `b`.
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let from_a: HashSet<NodeId> = self.chain_to_top(a)?.into_iter().collect();
        self.chain_to_top(b)?
            .into_iter()
            .find(|n| from_a.contains(n))
    }

    /// Edges between `a` and `b` through their common ancestor.
    pub fn distance(&self, a: NodeId, b: NodeId) -> Option<usize> {
        let common = self.common_ancestor(a, b)?;
        let up_a = self.chain_to_top(a)?.iter().position(|n| *n == common)?;
        let up_b = self.chain_to_top(b)?.iter().position(|n| *n == common)?;
        Some(up_a + up_b)
    }

    /// Relative document (pre-order) position of two nodes.
    ///
    /// Fails when either node is missing or the two share no common ancestor.
    pub fn compare_document_order(&self, a: NodeId, b: NodeId) -> Result<Ordering> {
        let path_a = self.resolved_path(a)?;
        let path_b = self.resolved_path(b)?;
        if path_a.first() != path_b.first() {
            return Err(Error::Disconnected(a, b));
        }
        let shared = path_a
            .iter()
            .zip(&path_b)
            .take_while(|(x, y)| x == y)
            .count();
        if shared == path_a.len() && shared == path_b.len() {
            return Ok(Ordering::Equal);
        }
        if shared == path_a.len() {
            return Ok(Ordering::Less);
        }
        if shared == path_b.len() {
            return Ok(Ordering::Greater);
        }
        let parent = path_a[shared - 1];
        let siblings = self
            .get_node(parent)
            .ok_or(Error::NodeNotFound(parent))?
            .child_ids();
        let pos_a = siblings.iter().position(|c| *c == path_a[shared]);
        let pos_b = siblings.iter().position(|c| *c == path_b[shared]);
        match (pos_a, pos_b) {
            (Some(x), Some(y)) => Ok(x.cmp(&y)),
            _ => Err(Error::InconsistentState(format!(
                "children of {parent} do not list {a} or {b}"
            ))),
        }
    }

    fn resolved_path(&self, id: NodeId) -> Result<Vec<NodeId>> {
        if !self.contains(id) {
            return Err(Error::NodeNotFound(id));
        }
        let path = self.node_path(id);
        if path.is_empty() {
            return Err(Error::CycleDetected(id));
        }
        Ok(path)
    }

    /// Next node in document order, `None` at the end of the document.
    pub fn next_node(&self, id: NodeId) -> Result<Option<NodeId>> {
        if !self.contains(id) {
            return Err(Error::NodeNotFound(id));
        }
        Ok(self.step_next(id))
    }

    /// Previous node in document order, `None` before the top of the tree.
    pub fn previous_node(&self, id: NodeId) -> Result<Option<NodeId>> {
        if !self.contains(id) {
            return Err(Error::NodeNotFound(id));
        }
        Ok(self.step_previous(id))
    }

    /// First child, else the next node outside this subtree.
    pub(crate) fn step_next(&self, id: NodeId) -> Option<NodeId> {
        if let Some(first) = self.first_child(id) {
            return Some(first.id);
        }
        self.step_past_subtree(id)
    }

    /// Next sibling, else the nearest ancestor's next sibling.
    pub(crate) fn step_past_subtree(&self, id: NodeId) -> Option<NodeId> {
        let mut seen = HashSet::new();
        let mut current = id;
        loop {
            if !seen.insert(current) {
                warn!(node = %id, at = %current, "parent cycle detected");
                return None;
            }
            if let Some(next) = self.next_sibling(current) {
                return Some(next.id);
            }
            current = self.parent(current)?.id;
        }
    }

    /// Previous sibling's deepest last descendant, else the parent.
    pub(crate) fn step_previous(&self, id: NodeId) -> Option<NodeId> {
        let Some(prev) = self.previous_sibling(id) else {
            return self.parent(id).map(|p| p.id);
        };
        let mut seen = HashSet::new();
        let mut current = prev.id;
        while let Some(last) = self.last_child(current) {
            if !seen.insert(current) {
                warn!(node = %id, at = %current, "child cycle detected");
                return None;
            }
            current = last.id;
        }
        Some(current)
    }

    /// Next editable node in document order.
    pub fn next_editable_node(&self, id: NodeId) -> Option<NodeId> {
        self.find_editable(id, Self::step_next)
    }

    /// Previous editable node in document order.
    pub fn previous_editable_node(&self, id: NodeId) -> Option<NodeId> {
        self.find_editable(id, Self::step_previous)
    }

    fn find_editable(
        &self,
        from: NodeId,
        step: fn(&Self, NodeId) -> Option<NodeId>,
    ) -> Option<NodeId> {
        let mut seen = HashSet::from([from]);
        let mut current = step(self, from);
        while let Some(id) = current {
            if !seen.insert(id) {
                warn!(from = %from, at = %id, "editable walk revisited a node, aborting");
                return None;
            }
            if self.is_editable(id) {
                return Some(id);
            }
            current = step(self, id);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeFragment;
    use crate::store::Layer;

    /// doc -> [p1 -> [t1 "Hello"], p2 -> [t2 "World"]]
    struct Fixture {
        store: DocumentStore,
        doc: NodeId,
        p1: NodeId,
        t1: NodeId,
        p2: NodeId,
        t2: NodeId,
    }

    fn fixture() -> Fixture {
        let mut store = DocumentStore::new();
        let doc = store.create_root(&NodeFragment::container("doc")).unwrap();
        let p1 = store.insert(doc, None, &NodeFragment::container("paragraph")).unwrap();
        let t1 = store.insert(p1, None, &NodeFragment::text("text", "Hello")).unwrap();
        let p2 = store.insert(doc, None, &NodeFragment::container("paragraph")).unwrap();
        let t2 = store.insert(p2, None, &NodeFragment::text("text", "World")).unwrap();
        Fixture { store, doc, p1, t1, p2, t2 }
    }

    #[test]
    fn family_lookups() {
        let f = fixture();
        assert_eq!(f.store.parent(f.t1).map(|n| n.id), Some(f.p1));
        assert_eq!(f.store.sibling_index(f.p2), Some(1));
        assert_eq!(f.store.previous_sibling(f.p2).map(|n| n.id), Some(f.p1));
        assert!(f.store.previous_sibling(f.p1).is_none());
        assert_eq!(f.store.next_sibling(f.p1).map(|n| n.id), Some(f.p2));
        assert_eq!(f.store.first_sibling(f.p2).map(|n| n.id), Some(f.p1));
        assert_eq!(f.store.last_sibling(f.p1).map(|n| n.id), Some(f.p2));
        let siblings: Vec<_> = f.store.siblings(f.p1).iter().map(|n| n.id).collect();
        assert_eq!(siblings, vec![f.p2]);
        assert!(f.store.siblings(f.doc).is_empty());
    }

    #[test]
    fn paths_and_depths() {
        let f = fixture();
        assert_eq!(f.store.node_path(f.t2), vec![f.doc, f.p2, f.t2]);
        assert_eq!(f.store.node_depth(f.t2), Some(2));
        assert_eq!(f.store.node_depth(f.doc), Some(0));
        assert_eq!(f.store.node_depth(NodeId(404)), None);
        assert!(f.store.is_descendant(f.t1, f.doc));
        assert!(f.store.is_descendant(f.t1, f.t1));
        assert!(!f.store.is_descendant(f.t1, f.p2));
        assert_eq!(f.store.ancestors(f.t1), vec![f.p1, f.doc]);
        assert_eq!(f.store.descendants(f.doc), vec![f.p1, f.t1, f.p2, f.t2]);
    }

    #[test]
    fn common_ancestor_and_distance() {
        let f = fixture();
        assert_eq!(f.store.common_ancestor(f.t1, f.t2), Some(f.doc));
        assert_eq!(f.store.common_ancestor(f.t1, f.p1), Some(f.p1));
        assert_eq!(f.store.distance(f.t1, f.t2), Some(4));
        assert_eq!(f.store.distance(f.t1, f.t1), Some(0));
        assert_eq!(f.store.common_ancestor(f.t1, NodeId(404)), None);
        assert_eq!(f.store.distance(f.t1, NodeId(404)), None);
    }

    #[test]
    fn document_order() {
        let f = fixture();
        let s = &f.store;
        assert_eq!(s.compare_document_order(f.t1, f.t2), Ok(Ordering::Less));
        assert_eq!(s.compare_document_order(f.p2, f.t1), Ok(Ordering::Greater));
        assert_eq!(s.compare_document_order(f.doc, f.t1), Ok(Ordering::Less));
        assert_eq!(s.compare_document_order(f.t1, f.t1), Ok(Ordering::Equal));
        assert_eq!(
            s.compare_document_order(f.t1, NodeId(404)),
            Err(Error::NodeNotFound(NodeId(404)))
        );
    }

    #[test]
    fn disconnected_nodes_fail_to_compare() {
        let mut f = fixture();
        let mut stray = Node::new(NodeId(900), "paragraph");
        stray.children = Some(Vec::new());
        f.store.set_node(stray, Layer::Base).unwrap();
        assert_eq!(
            f.store.compare_document_order(f.t1, NodeId(900)),
            Err(Error::Disconnected(f.t1, NodeId(900)))
        );
        assert_eq!(f.store.distance(f.t1, NodeId(900)), None);
    }

    #[test]
    fn next_and_previous_walk_document_order() {
        let f = fixture();
        let s = &f.store;
        assert_eq!(s.next_node(f.t1), Ok(Some(f.p2)));
        assert_eq!(s.next_node(f.p2), Ok(Some(f.t2)));
        assert_eq!(s.next_node(f.t2), Ok(None));
        assert_eq!(s.previous_node(f.p2), Ok(Some(f.t1)));
        assert_eq!(s.previous_node(f.t1), Ok(Some(f.p1)));
        assert_eq!(s.previous_node(f.doc), Ok(None));
        assert!(s.next_node(NodeId(404)).is_err());
    }

    #[test]
    fn editable_walk_skips_containers() {
        let f = fixture();
        assert_eq!(f.store.next_editable_node(f.t1), Some(f.t2));
        assert_eq!(f.store.previous_editable_node(f.t2), Some(f.t1));
        assert_eq!(f.store.next_editable_node(f.t2), None);
    }

    #[test]
    fn cyclic_parents_yield_sentinels() {
        let mut f = fixture();
        let mut p1 = f.store.get_node(f.p1).unwrap().clone();
        p1.parent = Some(f.t1);
        f.store.set_node(p1, Layer::Base).unwrap();
        assert!(f.store.node_path(f.t1).is_empty());
        assert_eq!(f.store.node_depth(f.t1), None);
        assert!(f.store.ancestors(f.t1).is_empty());
        assert_eq!(f.store.common_ancestor(f.t1, f.t2), None);
        assert_eq!(
            f.store.compare_document_order(f.t1, f.t2),
            Err(Error::CycleDetected(f.t1))
        );
    }

    #[test]
    fn editable_walk_aborts_on_child_list_cycle() {
        let mut f = fixture();
        let mut t1 = f.store.get_node(f.t1).unwrap().clone();
        t1.children = Some(vec![f.p1]);
        f.store.set_node(t1, Layer::Base).unwrap();

        // t1 -> p1 -> t1 loops before reaching t2
        assert_eq!(f.store.next_editable_node(f.t1), None);
        // descending into p1 for its last descendant loops as well
        assert_eq!(f.store.previous_editable_node(f.t2), None);
    }
}

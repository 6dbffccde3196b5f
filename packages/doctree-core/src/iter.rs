//! Lazy document-order traversal.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::warn;

use crate::ids::NodeId;
use crate::node::Node;
use crate::store::DocumentStore;

type NodePredicate<'f> = Box<dyn Fn(&Node) -> bool + 'f>;

/// Document-order window, compared by position rather than tree shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeBound {
    pub start: NodeId,
    pub end: NodeId,
    /// Whether `start` and `end` themselves are part of the window.
    pub inclusive: bool,
}

impl RangeBound {
    pub fn inclusive(start: NodeId, end: NodeId) -> Self {
        Self {
            start,
            end,
            inclusive: true,
        }
    }

    pub fn exclusive(start: NodeId, end: NodeId) -> Self {
        Self {
            start,
            end,
            inclusive: false,
        }
    }
}

/// Filters and bounds shared by [`DocumentIterator`] and visitor traversal.
///
/// Checks run in this order: range, max depth, type filters, `filter`,
/// `stop_when`. A node rejected by a filter is not yielded but its subtree is
/// still walked; `stop_when` ends the whole traversal.
#[derive(Default)]
pub struct TraversalOptions<'f> {
    pub start: Option<NodeId>,
    pub reverse: bool,
    pub range: Option<RangeBound>,
    pub max_depth: Option<usize>,
    pub node_type: Option<String>,
    pub node_types: Option<Vec<String>>,
    pub exclude_types: Vec<String>,
    pub filter: Option<NodePredicate<'f>>,
    pub stop_when: Option<NodePredicate<'f>>,
}

impl<'f> TraversalOptions<'f> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, id: NodeId) -> Self {
        self.start = Some(id);
        self
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn range(mut self, range: RangeBound) -> Self {
        self.range = Some(range);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn node_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn node_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, predicate: impl Fn(&Node) -> bool + 'f) -> Self {
        self.filter = Some(Box::new(predicate));
        self
    }

    pub fn stop_when(mut self, predicate: impl Fn(&Node) -> bool + 'f) -> Self {
        self.stop_when = Some(Box::new(predicate));
        self
    }

    pub(crate) fn admit(&self, store: &DocumentStore, node: &Node) -> Admission {
        if let Some(range) = &self.range {
            match self.range_position(store, node.id, range) {
                Some(RangeCheck::Inside) => {}
                Some(RangeCheck::Outside) | None => return Admission::Skip,
                Some(RangeCheck::Past) => return Admission::Exhausted,
            }
        }
        if let Some(max) = self.max_depth {
            match store.node_depth(node.id) {
                Some(depth) if depth <= max => {}
                _ => return Admission::Skip,
            }
        }
        if self.node_type.as_ref().is_some_and(|t| *t != node.node_type) {
            return Admission::Skip;
        }
        if self
            .node_types
            .as_ref()
            .is_some_and(|types| !types.contains(&node.node_type))
        {
            return Admission::Skip;
        }
        if self.exclude_types.contains(&node.node_type) {
            return Admission::Skip;
        }
        if self.filter.as_ref().is_some_and(|f| !f(node)) {
            return Admission::Skip;
        }
        if self.stop_when.as_ref().is_some_and(|f| f(node)) {
            return Admission::Stop;
        }
        Admission::Yield
    }

    fn range_position(
        &self,
        store: &DocumentStore,
        id: NodeId,
        range: &RangeBound,
    ) -> Option<RangeCheck> {
        let from_start = store.compare_document_order(id, range.start).ok()?;
        let from_end = store.compare_document_order(id, range.end).ok()?;
        let before_start = match from_start {
            Ordering::Less => true,
            Ordering::Equal => !range.inclusive,
            Ordering::Greater => false,
        };
        let after_end = match from_end {
            Ordering::Greater => true,
            Ordering::Equal => !range.inclusive,
            Ordering::Less => false,
        };
        // walking forward nothing after the end can qualify, and vice versa
        let past = if self.reverse {
            from_start == Ordering::Less || (before_start && from_start == Ordering::Equal)
        } else {
            from_end == Ordering::Greater || (after_end && from_end == Ordering::Equal)
        };
        Some(if past {
            RangeCheck::Past
        } else if before_start || after_end {
            RangeCheck::Outside
        } else {
            RangeCheck::Inside
        })
    }
}

enum RangeCheck {
    Inside,
    Outside,
    Past,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Admission {
    Yield,
    Skip,
    /// Bounded range fully walked; nothing further can qualify.
    Exhausted,
    /// The stop predicate fired.
    Stop,
}

/// Restartable iterator over node ids in document order (or reverse).
pub struct DocumentIterator<'s, 'f> {
    store: &'s DocumentStore,
    options: TraversalOptions<'f>,
    cursor: Option<NodeId>,
    visited: HashSet<NodeId>,
    done: bool,
}

impl<'s, 'f> DocumentIterator<'s, 'f> {
    pub fn new(store: &'s DocumentStore, options: TraversalOptions<'f>) -> Self {
        let cursor = options.start.or_else(|| store.root_node_id());
        Self {
            store,
            options,
            cursor,
            visited: HashSet::new(),
            done: false,
        }
    }

    /// Rewind to the configured start node.
    pub fn reset(&mut self) {
        self.cursor = self.options.start.or_else(|| self.store.root_node_id());
        self.visited.clear();
        self.done = false;
    }

    /// Collect the full sequence from the start, regardless of prior progress.
    pub fn to_vec(&mut self) -> Vec<NodeId> {
        self.reset();
        self.by_ref().collect()
    }
}

impl Iterator for DocumentIterator<'_, '_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while !self.done {
            let Some(id) = self.cursor else {
                self.done = true;
                break;
            };
            self.cursor = if self.options.reverse {
                self.store.step_previous(id)
            } else {
                self.store.step_next(id)
            };
            if !self.visited.insert(id) {
                warn!(node = %id, "traversal revisited a node, stopping");
                self.done = true;
                break;
            }
            let Some(node) = self.store.get_node(id) else {
                continue;
            };
            match self.options.admit(self.store, node) {
                Admission::Yield => return Some(id),
                Admission::Skip => {}
                Admission::Exhausted | Admission::Stop => self.done = true,
            }
        }
        None
    }
}

impl DocumentStore {
    pub fn document_iter<'f>(&self, options: TraversalOptions<'f>) -> DocumentIterator<'_, 'f> {
        DocumentIterator::new(self, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeFragment;
    use crate::store::Layer;

    fn store() -> (DocumentStore, Vec<NodeId>) {
        // doc -> [h, p -> [t1, t2], q -> [t3]]
        let mut store = DocumentStore::new();
        let doc = store.create_root(&NodeFragment::container("doc")).unwrap();
        let h = store.insert(doc, None, &NodeFragment::text("heading", "Title")).unwrap();
        let p = store.insert(doc, None, &NodeFragment::container("paragraph")).unwrap();
        let t1 = store.insert(p, None, &NodeFragment::text("text", "a")).unwrap();
        let t2 = store.insert(p, None, &NodeFragment::text("text", "b")).unwrap();
        let q = store.insert(doc, None, &NodeFragment::container("paragraph")).unwrap();
        let t3 = store.insert(q, None, &NodeFragment::text("text", "c")).unwrap();
        (store, vec![doc, h, p, t1, t2, q, t3])
    }

    #[test]
    fn forward_is_preorder() {
        let (store, ids) = store();
        let seen: Vec<_> = store.document_iter(TraversalOptions::new()).collect();
        assert_eq!(seen, ids);
    }

    #[test]
    fn reverse_mirrors_forward() {
        let (store, ids) = store();
        let last = *ids.last().unwrap();
        let seen: Vec<_> = store
            .document_iter(TraversalOptions::new().start(last).reverse())
            .collect();
        let mut expected = ids.clone();
        expected.reverse();
        assert_eq!(seen, expected);
    }

    #[test]
    fn type_filters_keep_walking_subtrees() {
        let (store, ids) = store();
        let texts: Vec<_> = store
            .document_iter(TraversalOptions::new().node_type("text"))
            .collect();
        assert_eq!(texts, vec![ids[3], ids[4], ids[6]]);
        let without: Vec<_> = store
            .document_iter(TraversalOptions::new().exclude_types(["text", "doc"]))
            .collect();
        assert_eq!(without, vec![ids[1], ids[2], ids[5]]);
        let either: Vec<_> = store
            .document_iter(TraversalOptions::new().node_types(["heading", "paragraph"]))
            .collect();
        assert_eq!(either, vec![ids[1], ids[2], ids[5]]);
    }

    #[test]
    fn max_depth_limits_results() {
        let (store, ids) = store();
        let shallow: Vec<_> = store
            .document_iter(TraversalOptions::new().max_depth(1))
            .collect();
        assert_eq!(shallow, vec![ids[0], ids[1], ids[2], ids[5]]);
    }

    #[test]
    fn range_bounds_by_document_order() {
        let (store, ids) = store();
        let inclusive: Vec<_> = store
            .document_iter(TraversalOptions::new().range(RangeBound::inclusive(ids[3], ids[5])))
            .collect();
        assert_eq!(inclusive, vec![ids[3], ids[4], ids[5]]);
        let exclusive: Vec<_> = store
            .document_iter(TraversalOptions::new().range(RangeBound::exclusive(ids[3], ids[5])))
            .collect();
        assert_eq!(exclusive, vec![ids[4]]);
        let backwards: Vec<_> = store
            .document_iter(
                TraversalOptions::new()
                    .start(ids[6])
                    .reverse()
                    .range(RangeBound::inclusive(ids[2], ids[4])),
            )
            .collect();
        assert_eq!(backwards, vec![ids[4], ids[3], ids[2]]);
    }

    #[test]
    fn stop_predicate_ends_iteration() {
        let (store, ids) = store();
        let seen: Vec<_> = store
            .document_iter(TraversalOptions::new().stop_when(|n| n.text.as_deref() == Some("b")))
            .collect();
        assert_eq!(seen, ids[..4].to_vec());
    }

    #[test]
    fn filter_predicate_and_restart() {
        let (store, ids) = store();
        let mut iter = store.document_iter(TraversalOptions::new().filter(|n| n.has_text()));
        assert_eq!(iter.next(), Some(ids[1]));
        assert_eq!(iter.to_vec(), vec![ids[1], ids[3], ids[4], ids[6]]);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn child_list_cycle_ends_iteration() {
        let (mut store, ids) = store();
        // t1 lists its own ancestor p as a child
        let mut t1 = store.get_node(ids[3]).unwrap().clone();
        t1.children = Some(vec![ids[2]]);
        store.set_node(t1, Layer::Base).unwrap();

        let mut iter = store.document_iter(TraversalOptions::new());
        let seen: Vec<_> = iter.by_ref().collect();
        assert_eq!(seen, ids[..4].to_vec());
        assert_eq!(iter.next(), None);
    }
}

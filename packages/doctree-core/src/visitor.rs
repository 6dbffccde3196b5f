//! Callback-driven traversal layered over the document-order walk.

use std::collections::HashSet;

use tracing::warn;

use crate::error::{Error, Result};
use crate::ids::NodeId;
use crate::iter::{Admission, TraversalOptions};
use crate::node::Node;
use crate::store::DocumentStore;

/// Hooks invoked during [`DocumentStore::traverse`].
///
/// `visit` returning `false` or `should_visit_children` returning `false`
/// skips the node's subtree; `should_stop` ends the traversal.
pub trait Visitor {
    fn enter(&mut self, _node: &Node) {}

    fn visit(&mut self, _node: &Node) -> bool {
        true
    }

    fn exit(&mut self, _node: &Node) {}

    fn should_visit_children(&mut self, _node: &Node) -> bool {
        true
    }

    fn should_stop(&mut self, _node: &Node) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalResult {
    pub visited_count: usize,
    pub skipped_count: usize,
    pub stopped: bool,
}

enum Frame {
    Enter(NodeId),
    Exit(NodeId),
}

impl DocumentStore {
    /// Run each visitor as an independent forward pass, one result per visitor.
    pub fn traverse(
        &self,
        visitors: &mut [&mut dyn Visitor],
        options: &TraversalOptions<'_>,
    ) -> Result<Vec<TraversalResult>> {
        if visitors.is_empty() {
            return Err(Error::NoVisitor);
        }
        if options.reverse {
            return Err(Error::InvalidOperation(
                "visitor traversal only runs forward".into(),
            ));
        }
        Ok(visitors
            .iter_mut()
            .map(|visitor| self.run_visitor(&mut **visitor, options))
            .collect())
    }

    /// Single-visitor form of [`traverse`](Self::traverse).
    pub fn traverse_with(
        &self,
        visitor: &mut dyn Visitor,
        options: &TraversalOptions<'_>,
    ) -> Result<TraversalResult> {
        let mut results = self.traverse(&mut [visitor], options)?;
        results.pop().ok_or(Error::NoVisitor)
    }

    fn run_visitor(
        &self,
        visitor: &mut dyn Visitor,
        options: &TraversalOptions<'_>,
    ) -> TraversalResult {
        let mut result = TraversalResult::default();
        let mut visited = HashSet::new();
        let mut anchor = options.start.or_else(|| self.root_node_id());

        'walk: while let Some(top) = anchor {
            let mut stack = vec![Frame::Enter(top)];
            while let Some(frame) = stack.pop() {
                let id = match frame {
                    Frame::Exit(id) => {
                        if let Some(node) = self.get_node(id) {
                            visitor.exit(node);
                        }
                        continue;
                    }
                    Frame::Enter(id) => id,
                };
                if !visited.insert(id) {
                    warn!(node = %id, "visitor reached a node twice, skipping");
                    continue;
                }
                let Some(node) = self.get_node(id) else {
                    continue;
                };
                match options.admit(self, node) {
                    Admission::Exhausted => break 'walk,
                    Admission::Stop => {
                        result.stopped = true;
                        break 'walk;
                    }
                    Admission::Skip => {
                        push_children(&mut stack, node);
                    }
                    Admission::Yield => {
                        if visitor.should_stop(node) {
                            result.stopped = true;
                            break 'walk;
                        }
                        visitor.enter(node);
                        let descend = visitor.visit(node) && visitor.should_visit_children(node);
                        result.visited_count += 1;
                        stack.push(Frame::Exit(id));
                        if descend {
                            push_children(&mut stack, node);
                        } else {
                            result.skipped_count += 1;
                        }
                    }
                }
            }
            anchor = self.step_past_subtree(top);
        }
        result
    }
}

fn push_children(stack: &mut Vec<Frame>, node: &Node) {
    stack.extend(node.child_ids().iter().rev().map(|c| Frame::Enter(*c)));
}

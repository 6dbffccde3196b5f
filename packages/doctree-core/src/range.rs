use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::NodeId;
use crate::node::NodeFragment;
use crate::store::DocumentStore;

/// A caret position: node plus character offset into its text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Selection {
    pub start: Position,
    pub end: Position,
}

impl Selection {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Selection of `[start, end)` characters inside one node.
    pub fn within(node: NodeId, start: usize, end: usize) -> Self {
        Self {
            start: Position {
                node,
                offset: start,
            },
            end: Position { node, offset: end },
        }
    }
}

impl DocumentStore {
    /// Copy the selected content out as id-less fragments.
    ///
    /// Inside one text node only the selected substring is kept (with the
    /// node's marks); a node without text is copied whole. Across nodes
    /// every text-bearing node between the endpoints is copied; containers
    /// are not rebuilt.
    pub fn serialize_range(&self, selection: &Selection) -> Result<Vec<NodeFragment>> {
        let start = selection.start.node;
        let end = selection.end.node;
        let start_node = self.get_node(start).ok_or(Error::NodeNotFound(start))?;

        if start == end {
            let Some(text) = start_node.text.as_deref() else {
                let tree = self
                    .get_node_with_children(start)
                    .ok_or(Error::NodeNotFound(start))?;
                return Ok(vec![tree.to_fragment()]);
            };
            let (from, to) = (selection.start.offset, selection.end.offset);
            let len = text.chars().count();
            if from > to || to > len {
                return Err(Error::InvalidSelection(format!(
                    "offsets {from}..{to} out of bounds for text of length {len}"
                )));
            }
            let selected: String = text.chars().skip(from).take(to - from).collect();
            let mut fragment = NodeFragment::from_node(start_node);
            fragment.text = Some(selected);
            fragment.content = None;
            return Ok(vec![fragment]);
        }

        if self.compare_document_order(start, end)? == Ordering::Greater {
            return Err(Error::InvalidSelection(format!(
                "selection end {end} precedes start {start}"
            )));
        }
        let mut fragments = Vec::new();
        let mut current = Some(start);
        while let Some(id) = current {
            let node = self.get_node(id).ok_or(Error::NodeNotFound(id))?;
            if node.has_text() {
                fragments.push(NodeFragment::from_node(node));
            }
            if id == end {
                return Ok(fragments);
            }
            current = self.step_next(id);
        }
        Err(Error::InconsistentState(format!(
            "walk from {start} never reached {end}"
        )))
    }

    /// Insert each fragment as a fresh subtree under `parent`, starting at
    /// `position` (clamped; `None` appends). Returns the new top-level ids.
    pub fn deserialize_nodes(
        &mut self,
        nodes: &[NodeFragment],
        parent: NodeId,
        position: Option<usize>,
    ) -> Result<Vec<NodeId>> {
        let target = self.get_node(parent).ok_or(Error::NodeNotFound(parent))?;
        let existing = target.child_ids().len();
        if target.children.is_none() {
            self.update_node(parent, |n| n.children = Some(Vec::new()))?;
        }
        let mut index = position.unwrap_or(existing).min(existing);
        let mut created = Vec::with_capacity(nodes.len());
        for fragment in nodes {
            created.push(self.insert(parent, Some(index), fragment)?);
            index += 1;
        }
        Ok(created)
    }
}

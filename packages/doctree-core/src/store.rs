use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ids::{IdAllocator, NodeId};
use crate::node::{Node, NodeFragment};
use crate::schema::{NodeTypeSpec, SchemaProvider};

/// Pending entry in the overlay: either a new/updated node or a tombstone
/// hiding a committed one.
#[derive(Clone, Debug)]
enum Pending {
    Upsert(Node),
    Tombstone,
}

#[derive(Clone, Debug, Default)]
struct Overlay {
    entries: HashMap<NodeId, Pending>,
    /// Root pointer written while the overlay is active.
    root: Option<Option<NodeId>>,
}

/// Target layer for raw writes through [`DocumentStore::set_node`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    Base,
    Overlay,
}

/// Committed state as exchanged with checkpoints.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Snapshot {
    pub nodes: BTreeMap<NodeId, Node>,
    pub root_node_id: Option<NodeId>,
    pub version: u64,
}

/// In-memory document tree with an optional single pending overlay.
///
/// Every read merges the overlay over the committed table and hides
/// tombstoned ids. While an overlay is active all structural writes land in
/// it; [`commit_overlay`](Self::commit_overlay) folds it into the committed
/// table atomically and [`discard_overlay`](Self::discard_overlay) drops it.
#[derive(Clone, Default)]
pub struct DocumentStore {
    schema: Option<Arc<dyn SchemaProvider>>,
    session_id: Option<String>,
    nodes: HashMap<NodeId, Node>,
    overlay: Option<Overlay>,
    root: Option<NodeId>,
    version: u64,
    ids: IdAllocator,
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("session_id", &self.session_id)
            .field("has_schema", &self.schema.is_some())
            .field("nodes", &self.nodes.len())
            .field("overlay", &self.overlay.as_ref().map(|o| o.entries.len()))
            .field("root", &self.root_node_id())
            .field("version", &self.version)
            .finish()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: Arc<dyn SchemaProvider>) -> Self {
        Self {
            schema: Some(schema),
            ..Self::default()
        }
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn session(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn schema(&self) -> Option<&dyn SchemaProvider> {
        self.schema.as_deref()
    }

    /// Schema metadata for a node type, if a schema is attached and knows it.
    pub fn type_spec(&self, node_type: &str) -> Option<&NodeTypeSpec> {
        self.schema.as_deref().and_then(|s| s.node_type(node_type))
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    // ---- reads -------------------------------------------------------------

    /// Overlay-aware lookup.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        if let Some(overlay) = &self.overlay {
            match overlay.entries.get(&id) {
                Some(Pending::Upsert(node)) => return Some(node),
                Some(Pending::Tombstone) => return None,
                None => {}
            }
        }
        self.nodes.get(&id)
    }

    /// Committed-only lookup; ignores any pending overlay.
    pub fn read_base_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get_node(id).is_some()
    }

    /// All visible nodes, overlay merged over base. Iteration order is unspecified.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        let pending = self.overlay.as_ref().map(|o| &o.entries);
        let base = self
            .nodes
            .values()
            .filter(move |n| pending.map_or(true, |p| !p.contains_key(&n.id)));
        let upserts = pending
            .into_iter()
            .flat_map(|p| p.values())
            .filter_map(|entry| match entry {
                Pending::Upsert(node) => Some(node),
                Pending::Tombstone => None,
            });
        base.chain(upserts)
    }

    /// Visible node ids in ascending id order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes().map(|n| n.id).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes().next().is_none()
    }

    /// Overlay-aware root pointer.
    pub fn root_node_id(&self) -> Option<NodeId> {
        match self.overlay.as_ref().and_then(|o| o.root) {
            Some(pending) => pending,
            None => self.root,
        }
    }

    pub fn set_root_node_id(&mut self, id: NodeId) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::NodeNotFound(id));
        }
        self.write_root(Some(id));
        self.bump_version();
        Ok(())
    }

    // ---- overlay -----------------------------------------------------------

    pub fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }

    /// Start collecting writes in a pending layer. No-op if one is active.
    pub fn begin_overlay(&mut self) {
        if self.overlay.is_none() {
            debug!(session = ?self.session_id, "overlay started");
            self.overlay = Some(Overlay::default());
        }
    }

    /// Fold the pending layer into the committed table.
    ///
    /// The merged view is validated first; on failure the overlay is left in
    /// place and nothing is committed.
    pub fn commit_overlay(&mut self) -> Result<()> {
        if self.overlay.is_none() {
            return Ok(());
        }
        if let Err(err) = self.validate_invariants() {
            warn!(error = %err, "overlay commit refused");
            return Err(Error::InconsistentState(format!(
                "overlay would break document invariants: {err}"
            )));
        }
        let Some(overlay) = self.overlay.take() else {
            return Ok(());
        };
        let pending = overlay.entries.len();
        if let Some(root) = overlay.root {
            self.root = root;
        }
        for (id, entry) in overlay.entries {
            match entry {
                Pending::Upsert(node) => {
                    self.nodes.insert(id, node);
                }
                Pending::Tombstone => {
                    self.nodes.remove(&id);
                }
            }
        }
        self.version += 1;
        debug!(pending, version = self.version, "overlay committed");
        Ok(())
    }

    /// Drop every pending write.
    pub fn discard_overlay(&mut self) {
        if let Some(overlay) = self.overlay.take() {
            debug!(pending = overlay.entries.len(), "overlay discarded");
        }
    }

    // ---- raw writes --------------------------------------------------------

    /// Store `node` as-is in the chosen layer. No linking or validation is
    /// performed; writing to [`Layer::Overlay`] starts an overlay if needed.
    /// Fails for `NodeId(u64::MAX)`, which would exhaust the id space.
    pub fn set_node(&mut self, node: Node, layer: Layer) -> Result<()> {
        self.ids.observe(node.id)?;
        match layer {
            Layer::Overlay => {
                self.begin_overlay();
                if let Some(overlay) = self.overlay.as_mut() {
                    overlay.entries.insert(node.id, Pending::Upsert(node));
                }
            }
            Layer::Base => {
                self.nodes.insert(node.id, node);
                self.version += 1;
            }
        }
        Ok(())
    }

    fn write_root(&mut self, root: Option<NodeId>) {
        match self.overlay.as_mut() {
            Some(overlay) => overlay.root = Some(root),
            None => self.root = root,
        }
    }

    fn write(&mut self, node: Node) {
        match self.overlay.as_mut() {
            Some(overlay) => {
                overlay.entries.insert(node.id, Pending::Upsert(node));
            }
            None => {
                self.nodes.insert(node.id, node);
            }
        }
    }

    fn remove(&mut self, id: NodeId) {
        match self.overlay.as_mut() {
            Some(overlay) => {
                if self.nodes.contains_key(&id) {
                    overlay.entries.insert(id, Pending::Tombstone);
                } else {
                    overlay.entries.remove(&id);
                }
            }
            None => {
                self.nodes.remove(&id);
            }
        }
    }

    fn bump_version(&mut self) {
        if self.overlay.is_none() {
            self.version += 1;
        }
    }

    fn node_mut_copy(&self, id: NodeId) -> Result<Node> {
        self.get_node(id).cloned().ok_or(Error::NodeNotFound(id))
    }

    // ---- structural writes -------------------------------------------------

    /// Create the document root from a fragment (its content is inserted too).
    pub fn create_root(&mut self, fragment: &NodeFragment) -> Result<NodeId> {
        if let Some(root) = self.root_node_id().filter(|r| self.contains(*r)) {
            return Err(Error::InvalidOperation(format!(
                "document already has root {root}"
            )));
        }
        let id = self.materialize(fragment, None)?;
        self.write_root(Some(id));
        self.bump_version();
        Ok(id)
    }

    /// Insert `fragment` (and its content) under `parent` at `index`,
    /// clamped to the child count; `None` appends.
    pub fn insert(
        &mut self,
        parent: NodeId,
        index: Option<usize>,
        fragment: &NodeFragment,
    ) -> Result<NodeId> {
        if !self.contains(parent) {
            return Err(Error::NodeNotFound(parent));
        }
        let id = self.materialize(fragment, Some(parent))?;
        self.attach(id, parent, index.unwrap_or(usize::MAX))?;
        self.bump_version();
        Ok(id)
    }

    /// Assign ids to a fragment subtree and write its nodes. The subtree root
    /// gets `parent` as back-reference but is not yet in the parent's child list.
    /// Nothing is written unless ids for the whole subtree are available.
    fn materialize(
        &mut self,
        fragment: &NodeFragment,
        parent: Option<NodeId>,
    ) -> Result<NodeId> {
        if fragment_size(fragment) > self.ids.remaining() {
            return Err(Error::IdSpaceExhausted);
        }
        let root_id = self.ids.allocate()?;
        let mut stack: Vec<(&NodeFragment, NodeId, Option<NodeId>)> =
            vec![(fragment, root_id, parent)];
        while let Some((frag, id, parent)) = stack.pop() {
            let mut node = Node::new(id, frag.node_type.clone());
            node.parent = parent;
            node.text = frag.text.clone();
            node.attributes = frag.attributes.clone();
            node.marks = frag.marks.clone();
            if let Some(content) = &frag.content {
                let child_ids = content
                    .iter()
                    .map(|_| self.ids.allocate())
                    .collect::<Result<Vec<NodeId>>>()?;
                for (child, child_id) in content.iter().zip(&child_ids).rev() {
                    stack.push((child, *child_id, Some(id)));
                }
                node.children = Some(child_ids);
            }
            self.write(node);
        }
        Ok(root_id)
    }

    /// Field-level update. Identity and structural links are preserved even
    /// if `f` touches them; use [`move_node`](Self::move_node) to relink.
    pub fn update_node(&mut self, id: NodeId, f: impl FnOnce(&mut Node)) -> Result<()> {
        let mut node = self.node_mut_copy(id)?;
        let (parent, children) = (node.parent, node.children.clone());
        f(&mut node);
        node.id = id;
        node.parent = parent;
        node.children = match (children, node.children.take()) {
            (Some(existing), _) => Some(existing),
            // a leaf may be promoted to an (empty) container
            (None, Some(_)) => Some(Vec::new()),
            (None, None) => None,
        };
        self.write(node);
        self.bump_version();
        Ok(())
    }

    /// Remove `id` and its whole subtree. The root cannot be deleted.
    pub fn delete_node(&mut self, id: NodeId) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::NodeNotFound(id));
        }
        if self.root_node_id() == Some(id) {
            return Err(Error::InvalidOperation("cannot delete the root node".into()));
        }
        self.detach(id)?;
        let mut doomed = vec![id];
        doomed.extend(self.descendants(id));
        for node in doomed {
            self.remove(node);
        }
        self.bump_version();
        Ok(())
    }

    /// Relink `id` under `new_parent` at `index` (clamped, counted after the
    /// node is detached from its previous parent).
    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::NodeNotFound(id));
        }
        if !self.contains(new_parent) {
            return Err(Error::NodeNotFound(new_parent));
        }
        if self.root_node_id() == Some(id) {
            return Err(Error::InvalidOperation("cannot move the root node".into()));
        }
        if self.introduces_cycle(id, new_parent) {
            return Err(Error::CycleDetected(id));
        }
        self.detach(id)?;
        self.attach(id, new_parent, index)?;
        self.bump_version();
        Ok(())
    }

    fn detach(&mut self, id: NodeId) -> Result<()> {
        let mut node = self.node_mut_copy(id)?;
        if let Some(parent) = node.parent.take() {
            if let Some(mut p) = self.get_node(parent).cloned() {
                if let Some(children) = p.children.as_mut() {
                    children.retain(|c| c != &id);
                }
                self.write(p);
            }
        }
        self.write(node);
        Ok(())
    }

    fn attach(&mut self, id: NodeId, parent: NodeId, position: usize) -> Result<()> {
        let mut parent_node = self.node_mut_copy(parent)?;
        let children = parent_node.children.get_or_insert_with(Vec::new);
        children.retain(|c| c != &id);
        let idx = position.min(children.len());
        children.insert(idx, id);
        self.write(parent_node);

        let mut node = self.node_mut_copy(id)?;
        node.parent = Some(parent);
        self.write(node);
        Ok(())
    }

    fn introduces_cycle(&self, node: NodeId, potential_parent: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut current = Some(potential_parent);
        while let Some(n) = current {
            if n == node || !visited.insert(n) {
                return true;
            }
            current = self.get_node(n).and_then(|state| state.parent);
        }
        false
    }

    // ---- snapshots ---------------------------------------------------------

    /// Committed state only; pending overlay writes are not included.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            nodes: self.nodes.iter().map(|(id, n)| (*id, n.clone())).collect(),
            root_node_id: self.root,
            version: self.version,
        }
    }

    /// Replace all state with `snapshot`, discarding any overlay.
    ///
    /// A snapshot holding `NodeId(u64::MAX)` is rejected and the store is
    /// left untouched.
    pub fn restore_from_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        let mut ids = self.ids.clone();
        if let Some(highest) = snapshot.nodes.keys().next_back() {
            ids.observe(*highest)?;
        }
        let Snapshot {
            nodes,
            root_node_id,
            version,
        } = snapshot;
        if let Some(root) = root_node_id {
            if !nodes.contains_key(&root) {
                warn!(%root, "restored snapshot does not contain its root node");
            }
        }
        self.ids = ids;
        self.nodes = nodes.into_iter().collect();
        self.root = root_node_id;
        self.version = version;
        self.overlay = None;
        debug!(nodes = self.nodes.len(), version, "restored from snapshot");
        Ok(())
    }

    // ---- integrity ---------------------------------------------------------

    /// Validate invariants on the visible (overlay-merged) view: single root,
    /// consistent parent/child links, no duplicate or dangling children, no
    /// cycles and no orphans.
    pub fn validate_invariants(&self) -> Result<()> {
        let Some(root) = self.root_node_id() else {
            return if self.is_empty() {
                Ok(())
            } else {
                Err(Error::InconsistentState("nodes present without a root".into()))
            };
        };
        match self.get_node(root) {
            None => return Err(Error::InconsistentState(format!("root {root} missing"))),
            Some(node) if node.parent.is_some() => {
                return Err(Error::InconsistentState(format!("root {root} has a parent")))
            }
            Some(_) => {}
        }

        for node in self.nodes() {
            let mut seen = HashSet::new();
            for child in node.child_ids() {
                if !seen.insert(child) {
                    return Err(Error::InconsistentState(format!(
                        "duplicate child {child} under {}",
                        node.id
                    )));
                }
                match self.get_node(*child) {
                    Some(child_node) if child_node.parent == Some(node.id) => {}
                    Some(_) => {
                        return Err(Error::InconsistentState(format!(
                            "child {child} does not point back to {}",
                            node.id
                        )))
                    }
                    None => {
                        return Err(Error::InconsistentState(format!(
                            "child {child} of {} does not exist",
                            node.id
                        )))
                    }
                }
            }
            if let Some(parent) = node.parent {
                let listed = self
                    .get_node(parent)
                    .is_some_and(|p| p.child_ids().contains(&node.id));
                if !listed {
                    return Err(Error::InconsistentState(format!(
                        "{} is not listed by its parent {parent}",
                        node.id
                    )));
                }
            }
        }

        for node in self.nodes() {
            if self.has_cycle_from(node.id) {
                return Err(Error::CycleDetected(node.id));
            }
        }

        if let Some(orphan) = self.find_orphans().first() {
            return Err(Error::InconsistentState(format!(
                "{orphan} is unreachable from the root"
            )));
        }
        Ok(())
    }

    fn has_cycle_from(&self, start: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut current = Some(start);
        while let Some(n) = current {
            if !visited.insert(n) {
                return true;
            }
            current = self.get_node(n).and_then(|s| s.parent);
        }
        false
    }

    /// Visible nodes not reachable from the root, in ascending id order.
    pub fn find_orphans(&self) -> Vec<NodeId> {
        let mut reachable = HashSet::new();
        if let Some(root) = self.root_node_id().filter(|r| self.contains(*r)) {
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                if !reachable.insert(id) {
                    continue;
                }
                if let Some(node) = self.get_node(id) {
                    stack.extend(node.child_ids().iter().copied().filter(|c| self.contains(*c)));
                }
            }
        }
        let mut orphans: Vec<NodeId> = self
            .nodes()
            .map(|n| n.id)
            .filter(|id| !reachable.contains(id))
            .collect();
        orphans.sort();
        orphans
    }
}

/// Number of nodes `fragment` expands to.
fn fragment_size(fragment: &NodeFragment) -> u64 {
    let mut count = 0;
    let mut stack = vec![fragment];
    while let Some(frag) = stack.pop() {
        count += 1;
        stack.extend(frag.content.iter().flatten());
    }
    count
}

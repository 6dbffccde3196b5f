//! Drop-behavior resolution: turn a (target, source, UI context) triple into
//! one editing action.
//!
//! Unknown target or source ids resolve to `move` before anything else.
//! Otherwise the first decisive answer wins:
//! 1. Ctrl/Cmd held: `copy`.
//! 2. Drag from outside the document: `insert`.
//! 3. Registered rules, highest priority first, specific target types
//!    before the `*` catch-all.
//! 4. The schema's `drop_behavior_rules` for the target type (exact source
//!    type, then `*`).
//! 5. Built-in type combinations, defaulting to `move`.

use std::fmt;
use std::rc::Rc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ids::NodeId;
use crate::node::Node;
use crate::schema::{NodeGroup, WILDCARD};
use crate::store::DocumentStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DropBehavior {
    Move,
    Copy,
    Merge,
    Insert,
}

impl fmt::Display for DropBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DropBehavior::Move => "move",
            DropBehavior::Copy => "copy",
            DropBehavior::Merge => "merge",
            DropBehavior::Insert => "insert",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Modifiers {
    pub ctrl_key: bool,
    pub meta_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DragOrigin {
    Internal,
    External,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DropZone {
    Before,
    After,
    Inside,
}

/// UI state accompanying a drop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DropContext {
    pub modifiers: Modifiers,
    pub drag_origin: Option<DragOrigin>,
    pub drop_zone: Option<DropZone>,
}

impl DropContext {
    pub fn with_ctrl() -> Self {
        Self {
            modifiers: Modifiers {
                ctrl_key: true,
                ..Modifiers::default()
            },
            ..Self::default()
        }
    }

    pub fn external() -> Self {
        Self {
            drag_origin: Some(DragOrigin::External),
            ..Self::default()
        }
    }
}

/// What a decision function sees.
pub struct DropRequest<'a> {
    pub store: &'a DocumentStore,
    pub target: &'a Node,
    pub source: &'a Node,
    pub context: &'a DropContext,
}

type DecisionFn = Box<dyn Fn(&DropRequest<'_>) -> Option<DropBehavior>>;

/// A fixed action, or a function that may defer by returning `None`.
pub enum DropAction {
    Fixed(DropBehavior),
    Decide(DecisionFn),
}

impl DropAction {
    pub fn decide(f: impl Fn(&DropRequest<'_>) -> Option<DropBehavior> + 'static) -> Self {
        DropAction::Decide(Box::new(f))
    }

    fn evaluate(&self, request: &DropRequest<'_>) -> Option<DropBehavior> {
        match self {
            DropAction::Fixed(behavior) => Some(*behavior),
            DropAction::Decide(f) => f(request),
        }
    }
}

impl From<DropBehavior> for DropAction {
    fn from(behavior: DropBehavior) -> Self {
        DropAction::Fixed(behavior)
    }
}

impl fmt::Debug for DropAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropAction::Fixed(behavior) => write!(f, "Fixed({behavior})"),
            DropAction::Decide(_) => f.write_str("Decide(..)"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleOptions {
    pub source_type: Option<String>,
    pub priority: i32,
}

impl RuleOptions {
    pub fn source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug)]
pub struct DropRule {
    pub target_type: String,
    pub source_type: Option<String>,
    pub priority: i32,
    pub action: Rc<DropAction>,
    seq: usize,
}

impl DropRule {
    fn applies_to_source(&self, source_type: &str) -> bool {
        self.source_type
            .as_deref()
            .map_or(true, |s| s == WILDCARD || s == source_type)
    }
}

/// Rule table owned by one editor instance and handed to the resolver.
#[derive(Debug, Default)]
pub struct DropRuleRegistry {
    rules: Vec<DropRule>,
    next_seq: usize,
}

impl DropRuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` for every target type in `targets` (`*` matches any).
    /// Targets registered together share the same action.
    pub fn register<I, S>(
        &mut self,
        targets: I,
        action: impl Into<DropAction>,
        options: RuleOptions,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let action = Rc::new(action.into());
        for target in targets {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.rules.push(DropRule {
                target_type: target.into(),
                source_type: options.source_type.clone(),
                priority: options.priority,
                action: Rc::clone(&action),
                seq,
            });
        }
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules consulted for `target_type`, in the order they are tried.
    pub fn rules_for(&self, target_type: &str) -> Vec<&DropRule> {
        let mut specific: Vec<&DropRule> = self
            .rules
            .iter()
            .filter(|r| r.target_type == target_type && r.target_type != WILDCARD)
            .collect();
        let mut wildcard: Vec<&DropRule> = self
            .rules
            .iter()
            .filter(|r| r.target_type == WILDCARD)
            .collect();
        for list in [&mut specific, &mut wildcard] {
            list.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        }
        specific.extend(wildcard);
        specific
    }
}

/// Resolves drops against one store, using rules from a registry handle.
pub struct DropBehaviorResolver<'r> {
    registry: &'r DropRuleRegistry,
}

impl<'r> DropBehaviorResolver<'r> {
    pub fn new(registry: &'r DropRuleRegistry) -> Self {
        Self { registry }
    }

    /// Decide what dropping `source` onto `target` does. Unknown ids
    /// resolve to [`DropBehavior::Move`] whatever the context says.
    pub fn resolve(
        &self,
        store: &DocumentStore,
        target: NodeId,
        source: NodeId,
        context: Option<&DropContext>,
    ) -> DropBehavior {
        let default_context = DropContext::default();
        let context = context.unwrap_or(&default_context);

        let (Some(target_node), Some(source_node)) =
            (store.get_node(target), store.get_node(source))
        else {
            debug!(%target, %source, "drop involves an unknown node, defaulting to move");
            return DropBehavior::Move;
        };

        if context.modifiers.ctrl_key || context.modifiers.meta_key {
            debug!(%target, %source, "drop resolved by modifier key");
            return DropBehavior::Copy;
        }
        if context.drag_origin == Some(DragOrigin::External) {
            debug!(%target, %source, "drop resolved by external origin");
            return DropBehavior::Insert;
        }

        let request = DropRequest {
            store,
            target: target_node,
            source: source_node,
            context,
        };
        for rule in self.registry.rules_for(&target_node.node_type) {
            if !rule.applies_to_source(&source_node.node_type) {
                continue;
            }
            if let Some(behavior) = rule.action.evaluate(&request) {
                debug!(
                    %target,
                    %source,
                    %behavior,
                    priority = rule.priority,
                    "drop resolved by registered rule"
                );
                return behavior;
            }
        }

        if let Some(spec) = store.type_spec(&target_node.node_type) {
            let rules = &spec.drop_behavior_rules;
            if let Some(behavior) = rules
                .get(&source_node.node_type)
                .or_else(|| rules.get(WILDCARD))
            {
                debug!(%target, %source, %behavior, "drop resolved by schema rule");
                return *behavior;
            }
        }

        let behavior = Self::builtin(store, target_node, source_node);
        debug!(%target, %source, %behavior, "drop resolved by built-in default");
        behavior
    }

    fn builtin(store: &DocumentStore, target: &Node, source: &Node) -> DropBehavior {
        if target.has_text() && source.has_text() {
            return DropBehavior::Merge;
        }
        let target_group = store.node_group(target);
        let source_group = store.node_group(source);
        if source_group == NodeGroup::Inline
            && source.has_text()
            && target_group == NodeGroup::Block
        {
            return DropBehavior::Merge;
        }
        // same-type blocks and everything else move
        DropBehavior::Move
    }

    /// Whether `source` may be dropped onto `target` at all.
    pub fn can_drop(&self, store: &DocumentStore, target: NodeId, source: NodeId) -> bool {
        if !store.contains(target) || !store.contains(source) {
            return false;
        }
        if !store.is_droppable(target) || !store.is_draggable(source) {
            return false;
        }
        !store.is_descendant(target, source)
    }
}

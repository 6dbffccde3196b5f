use std::cmp::Ordering;
use std::sync::Arc;

use doctree_core::{
    DocumentStore, DropBehavior, DropBehaviorResolver, DropRuleRegistry, MemorySchema, Node,
    NodeFragment, NodeId, NodeTypeSpec, RuleOptions, TraversalOptions, Visitor,
};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Insert { parent: usize, index: usize, text: bool },
    Move { node: usize, parent: usize, index: usize },
    Delete { node: usize },
    Indent { node: usize },
    Outdent { node: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..32, 0usize..6, any::<bool>())
            .prop_map(|(parent, index, text)| Op::Insert { parent, index, text }),
        (0usize..32, 0usize..32, 0usize..6)
            .prop_map(|(node, parent, index)| Op::Move { node, parent, index }),
        (0usize..32).prop_map(|node| Op::Delete { node }),
        (0usize..32).prop_map(|node| Op::Indent { node }),
        (0usize..32).prop_map(|node| Op::Outdent { node }),
    ]
}

fn schema() -> MemorySchema {
    MemorySchema::new()
        .with_type("doc", NodeTypeSpec::document())
        .with_type("item", NodeTypeSpec::block().indentable(true))
        .with_type("text", NodeTypeSpec::inline())
}

fn pick(store: &DocumentStore, i: usize) -> NodeId {
    let ids = store.node_ids();
    ids[i % ids.len()]
}

/// Apply ops, ignoring the ones the store refuses.
fn apply(store: &mut DocumentStore, ops: &[Op]) {
    for op in ops {
        match *op {
            Op::Insert { parent, index, text } => {
                let parent = pick(store, parent);
                let fragment = if text {
                    NodeFragment::text("text", "x")
                } else {
                    NodeFragment::container("item")
                };
                let _ = store.insert(parent, Some(index), &fragment);
            }
            Op::Move { node, parent, index } => {
                let node = pick(store, node);
                let parent = pick(store, parent);
                let _ = store.move_node(node, parent, index);
            }
            Op::Delete { node } => {
                let node = pick(store, node);
                let _ = store.delete_node(node);
            }
            Op::Indent { node } => {
                let node = pick(store, node);
                store.indent_node(node);
            }
            Op::Outdent { node } => {
                let node = pick(store, node);
                store.outdent_node(node);
            }
        }
    }
}

fn random_store(ops: &[Op]) -> DocumentStore {
    let mut store = DocumentStore::with_schema(Arc::new(schema()));
    store.create_root(&NodeFragment::container("doc")).unwrap();
    apply(&mut store, ops);
    store
}

#[derive(Default)]
struct Collect(Vec<NodeId>);

impl Visitor for Collect {
    fn enter(&mut self, node: &Node) {
        self.0.push(node.id);
    }
}

proptest! {
    #[test]
    fn tree_stays_valid_under_random_edits(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let store = random_store(&ops);
        prop_assert!(store.validate_invariants().is_ok());
        prop_assert!(store.find_orphans().is_empty());
    }

    #[test]
    fn overlay_edits_match_direct_edits(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let direct = random_store(&ops);

        let mut staged = DocumentStore::with_schema(Arc::new(schema()));
        staged.create_root(&NodeFragment::container("doc")).unwrap();
        staged.begin_overlay();
        apply(&mut staged, &ops);
        staged.commit_overlay().unwrap();

        let direct_order: Vec<_> = direct.document_iter(TraversalOptions::new()).collect();
        let staged_order: Vec<_> = staged.document_iter(TraversalOptions::new()).collect();
        prop_assert_eq!(direct_order, staged_order);
    }

    #[test]
    fn document_order_agrees_with_iteration(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let store = random_store(&ops);
        let order: Vec<_> = store.document_iter(TraversalOptions::new()).collect();
        prop_assert_eq!(order.len(), store.len());
        for (i, a) in order.iter().enumerate() {
            prop_assert_eq!(store.next_node(*a).unwrap(), order.get(i + 1).copied());
            for (j, b) in order.iter().enumerate() {
                prop_assert_eq!(store.compare_document_order(*a, *b).unwrap(), i.cmp(&j));
            }
        }
        let mut backwards: Vec<_> = match order.last() {
            Some(last) => store
                .document_iter(TraversalOptions::new().start(*last).reverse())
                .collect(),
            None => Vec::new(),
        };
        backwards.reverse();
        prop_assert_eq!(backwards, order);
    }

    #[test]
    fn visitor_sees_what_the_iterator_yields(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let store = random_store(&ops);
        let mut visitor = Collect::default();
        let result = store.traverse_with(&mut visitor, &TraversalOptions::new()).unwrap();
        let order: Vec<_> = store.document_iter(TraversalOptions::new()).collect();
        prop_assert_eq!(result.visited_count, order.len());
        prop_assert_eq!(visitor.0, order);
    }

    #[test]
    fn outdent_undoes_indent(
        ops in prop::collection::vec(op_strategy(), 0..40),
        pick_node in 0usize..32,
    ) {
        let mut store = random_store(&ops);
        let node = pick(&store, pick_node);
        let parent = store.parent(node).map(|p| p.id);
        let index = store.sibling_index(node);
        if store.indent_node(node) {
            prop_assert!(store.outdent_node(node));
            prop_assert_eq!(store.parent(node).map(|p| p.id), parent);
            prop_assert_eq!(store.sibling_index(node), index);
        }
        prop_assert!(store.validate_invariants().is_ok());
    }

    #[test]
    fn drop_priority_ignores_registration_order(
        priorities in prop::collection::vec(-50i32..50, 1..6),
    ) {
        let mut store = DocumentStore::new();
        let doc = store.create_root(&NodeFragment::container("doc")).unwrap();
        let a = store.insert(doc, None, &NodeFragment::container("paragraph")).unwrap();
        let b = store.insert(doc, None, &NodeFragment::container("paragraph")).unwrap();

        let behaviors = [DropBehavior::Copy, DropBehavior::Insert, DropBehavior::Merge];
        let rules: Vec<_> = priorities
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, behaviors[i % behaviors.len()]))
            .collect();
        let max = rules.iter().map(|(p, _)| *p).max().unwrap();
        // first registered among the highest priority
        let expected = rules.iter().find(|(p, _)| *p == max).map(|(_, b)| *b).unwrap();

        let mut forward = DropRuleRegistry::new();
        for (priority, behavior) in &rules {
            forward.register(["paragraph"], *behavior, RuleOptions::default().priority(*priority));
        }
        prop_assert_eq!(DropBehaviorResolver::new(&forward).resolve(&store, a, b, None), expected);

        let mut reversed = DropRuleRegistry::new();
        for (priority, behavior) in rules.iter().rev() {
            reversed.register(["paragraph"], *behavior, RuleOptions::default().priority(*priority));
        }
        let winner = DropBehaviorResolver::new(&reversed).resolve(&store, a, b, None);
        let winners: Vec<_> = rules.iter().filter(|(p, _)| *p == max).map(|(_, b)| *b).collect();
        prop_assert!(winners.contains(&winner));
        if winners.iter().all(|w| *w == expected) {
            prop_assert_eq!(winner, expected);
        }
    }
}

#[test]
fn compare_is_antisymmetric_on_a_fixed_tree() {
    let store = random_store(&[
        Op::Insert { parent: 0, index: 0, text: false },
        Op::Insert { parent: 1, index: 0, text: true },
        Op::Insert { parent: 0, index: 9, text: false },
    ]);
    let ids = store.node_ids();
    for a in &ids {
        for b in &ids {
            let ab = store.compare_document_order(*a, *b).unwrap();
            let ba = store.compare_document_order(*b, *a).unwrap();
            assert_eq!(ab, ba.reverse());
            assert_eq!(ab == Ordering::Equal, a == b);
        }
    }
}

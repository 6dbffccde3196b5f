#[cfg(feature = "serde")]
#[test]
fn snapshot_json_roundtrips_into_a_fresh_store() {
    use doctree_core::{DocumentStore, Mark, NodeFragment, Snapshot};

    let mut store = DocumentStore::new();
    let doc = store.create_root(&NodeFragment::container("doc")).unwrap();
    let para = store
        .insert(
            doc,
            None,
            &NodeFragment::container("paragraph")
                .with_attribute("align", "left")
                .with_child(
                    NodeFragment::text("text", "Hello")
                        .with_mark(Mark::new("bold").with_range(0, 2)),
                ),
        )
        .unwrap();

    let bytes = serde_json::to_vec(&store.snapshot()).expect("serialize Snapshot");
    let json = std::str::from_utf8(&bytes).expect("Snapshot JSON must be UTF-8");
    assert!(
        json.contains("\"rootNodeId\"") && json.contains("\"type\":\"bold\""),
        "unexpected snapshot layout: {json}"
    );

    let decoded: Snapshot = serde_json::from_slice(&bytes).expect("deserialize Snapshot");
    assert_eq!(decoded, store.snapshot());

    let mut restored = DocumentStore::new();
    restored.restore_from_snapshot(decoded).unwrap();
    restored.validate_invariants().unwrap();
    assert_eq!(restored.root_node_id(), Some(doc));
    assert_eq!(
        restored.get_node(para).unwrap().attribute("align"),
        Some(&serde_json::json!("left"))
    );
    let fresh = restored.insert(doc, None, &NodeFragment::leaf("hr")).unwrap();
    assert!(store.get_node(fresh).is_none(), "restored store must not reuse ids");
}

#[cfg(feature = "serde")]
#[test]
fn fragments_use_the_clipboard_field_names() {
    use doctree_core::NodeFragment;

    let fragment =
        NodeFragment::container("paragraph").with_child(NodeFragment::text("text", "hi"));
    let value = serde_json::to_value(&fragment).expect("serialize NodeFragment");
    assert_eq!(value["content"][0]["text"], "hi");

    let back: NodeFragment = serde_json::from_value(value).expect("deserialize NodeFragment");
    assert_eq!(back, fragment);
}

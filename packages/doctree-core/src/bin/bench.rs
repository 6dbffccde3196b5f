use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use doctree_core::{DocumentStore, NodeFragment, NodeId, TraversalOptions};

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    implementation: &'static str,
    storage: &'static str,
    workload: String,
    timestamp: String,
    name: String,
    total_ops: u64,
    duration_ms: f64,
    ops_per_sec: f64,
    extra: Extra,
    source_file: Option<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Extra {
    count: u64,
    overlay: bool,
    visited: usize,
}

fn run(count: u64, overlay: bool) -> Result<(f64, usize), doctree_core::Error> {
    let mut store = DocumentStore::new();
    let doc = store.create_root(&NodeFragment::container("doc"))?;

    let start = Instant::now();
    if overlay {
        store.begin_overlay();
    }
    let mut paragraphs: Vec<NodeId> = Vec::with_capacity(count as usize);
    for i in 0..count {
        let para = store.insert(
            doc,
            None,
            &NodeFragment::container("paragraph")
                .with_child(NodeFragment::text("text", format!("line {i}"))),
        )?;
        paragraphs.push(para);
    }
    // move every paragraph to the front, reversing the document
    for para in &paragraphs {
        store.move_node(*para, doc, 0)?;
    }
    store.commit_overlay()?;
    let visited = store.document_iter(TraversalOptions::new()).count();
    Ok((start.elapsed().as_secs_f64() * 1000.0, visited))
}

fn main() {
    let mut count: u64 = 200;
    let mut overlay = false;
    let mut out_file: Option<PathBuf> = None;
    for arg in env::args().skip(1) {
        if let Some(val) = arg.strip_prefix("--count=") {
            count = val.parse().unwrap_or(count);
        } else if let Some(val) = arg.strip_prefix("--out=") {
            out_file = Some(PathBuf::from(val));
        } else if arg == "--overlay" {
            overlay = true;
        }
    }

    let (duration_ms, visited) = run(count, overlay).expect("benchmark workload");
    let workload = format!(
        "insert-move-{}{}",
        count,
        if overlay { "-overlay" } else { "" }
    );

    let output = Output {
        implementation: "doctree-core",
        storage: "memory",
        workload: workload.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        name: workload,
        total_ops: count * 2,
        duration_ms,
        ops_per_sec: if duration_ms > 0.0 {
            (count as f64 * 2.0) / duration_ms * 1000.0
        } else {
            f64::INFINITY
        },
        extra: Extra {
            count,
            overlay,
            visited,
        },
        source_file: out_file.as_ref().map(|p| p.display().to_string()),
    };

    let json = serde_json::to_string_pretty(&output).expect("serialize");
    if let Some(path) = out_file {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdirs");
        }
        fs::write(&path, &json).expect("write output");
    }
    println!("{}", json);
}

//! Store-level integration tests against the in-memory engine.

use chrono::Utc;
use trellis_core::{
    content_hash, ExtractionBundle, SemanticEntity, SourceUnit, StructuralEntity,
};
use trellis_surrealdb::{apply_schema, GraphStore, SurrealClient};

async fn store() -> GraphStore {
    let client = SurrealClient::connect_memory().await.expect("memory store");
    apply_schema(&client).await.expect("schema");
    GraphStore::new(client)
}

fn unit(corpus: &str, path: &str, content: &str) -> SourceUnit {
    SourceUnit {
        path: path.to_string(),
        title: std::path::Path::new(path)
            .file_stem()
            .unwrap()
            .to_string_lossy()
            .to_string(),
        content: content.to_string(),
        size: content.len() as u64,
        modified: Utc::now(),
        hash: content_hash(content.as_bytes()),
        encoding: "utf-8".to_string(),
        extension: path.rsplit('.').next().unwrap_or_default().to_string(),
        corpus: corpus.to_string(),
        aliases: Vec::new(),
        embedding: None,
    }
}

fn import_bundle(module: &str) -> ExtractionBundle {
    let mut bundle = ExtractionBundle::default();
    bundle.push(StructuralEntity::ImportedModule {
        name: module.to_string(),
    });
    bundle
}

async fn apply(store: &GraphStore, unit: &SourceUnit, bundle: &ExtractionBundle) {
    store.upsert_unit(unit).await.expect("unit upsert");
    store.upsert_containers(unit).await.expect("containers");
    store.apply_structural(unit, bundle).await.expect("bundle");
}

#[tokio::test]
async fn reapplying_a_bundle_changes_nothing() {
    let store = store().await;
    let unit = unit("/corpus", "/corpus/a.py", "import pandas\n");
    let bundle = import_bundle("pandas");

    apply(&store, &unit, &bundle).await;
    let first = store.graph_counts("/corpus").await.unwrap();

    apply(&store, &unit, &bundle).await;
    let second = store.graph_counts("/corpus").await.unwrap();

    assert_eq!(first, second);
    assert!(first.total_nodes() > 0);
}

#[tokio::test]
async fn shared_entity_gets_one_node_and_two_edges() {
    let store = store().await;
    let a = unit("/corpus", "/corpus/a.py", "import pandas\n");
    let b = unit("/corpus", "/corpus/b.py", "import pandas\n");

    apply(&store, &a, &import_bundle("pandas")).await;
    apply(&store, &b, &import_bundle("pandas")).await;

    let counts = store.graph_counts("/corpus").await.unwrap();
    let nodes: std::collections::HashMap<_, _> = counts.nodes.iter().cloned().collect();
    let edges: std::collections::HashMap<_, _> = counts.edges.iter().cloned().collect();

    assert_eq!(nodes.get("unit"), Some(&2));
    assert_eq!(nodes.get("import_module"), Some(&1));
    assert_eq!(edges.get("imports"), Some(&2));
}

#[tokio::test]
async fn sync_unit_applies_only_the_edge_delta() {
    let store = store().await;
    let mut source = unit("/corpus", "/corpus/a.py", "import pandas\n");

    apply(&store, &source, &import_bundle("pandas")).await;

    // The unit now imports numpy instead.
    source.content = "import numpy\n".to_string();
    source.hash = content_hash(source.content.as_bytes());
    let (added, removed) = store
        .sync_unit(&source, &import_bundle("numpy"), &[], &[])
        .await
        .unwrap();

    assert_eq!((added, removed), (1, 1));
    let owned = store.edges_owned_by("/corpus/a.py").await.unwrap();
    assert_eq!(owned.len(), 1);
    let edge = owned.iter().next().unwrap();
    assert_eq!(edge.target.id, "numpy");
}

#[tokio::test]
async fn deleting_a_unit_keeps_shared_entities() {
    let store = store().await;
    let a = unit("/corpus", "/corpus/a.py", "import pandas\n");
    let b = unit("/corpus", "/corpus/b.py", "import pandas\n");

    apply(&store, &a, &import_bundle("pandas")).await;
    apply(&store, &b, &import_bundle("pandas")).await;

    store.delete_unit("/corpus/a.py").await.unwrap();

    assert!(store.get_unit("/corpus/a.py").await.unwrap().is_none());
    assert!(store.get_unit("/corpus/b.py").await.unwrap().is_some());

    let counts = store.graph_counts("/corpus").await.unwrap();
    let nodes: std::collections::HashMap<_, _> = counts.nodes.iter().cloned().collect();
    let edges: std::collections::HashMap<_, _> = counts.edges.iter().cloned().collect();
    assert_eq!(nodes.get("import_module"), Some(&1));
    assert_eq!(edges.get("imports"), Some(&1));
}

#[tokio::test]
async fn clear_removes_exactly_one_corpus() {
    let store = store().await;
    let mine = unit("/mine", "/mine/a.py", "import pandas\n");
    let theirs = unit("/theirs", "/theirs/b.py", "import numpy\n");

    apply(&store, &mine, &import_bundle("pandas")).await;
    apply(&store, &theirs, &import_bundle("numpy")).await;

    store.clear("/mine").await.unwrap();

    assert_eq!(store.graph_counts("/mine").await.unwrap().total_nodes(), 0);
    let remaining = store.graph_counts("/theirs").await.unwrap();
    assert!(remaining.total_nodes() > 0);
    assert!(store.get_unit("/theirs/b.py").await.unwrap().is_some());
}

#[tokio::test]
async fn semantics_link_units_to_concepts() {
    let store = store().await;
    let source = unit("/corpus", "/corpus/ada.md", "Ada Lovelace wrote programs.\n");

    apply(&store, &source, &ExtractionBundle::default()).await;
    let concept = SemanticEntity {
        name: "Ada Lovelace".to_string(),
        entity_type: "Person".to_string(),
        confidence: 0.95,
        aliases: vec![],
    };
    store
        .apply_semantics(&source, std::slice::from_ref(&concept), &[])
        .await
        .unwrap();
    // Re-applying merges on the concept key.
    store
        .apply_semantics(&source, std::slice::from_ref(&concept), &[])
        .await
        .unwrap();

    let counts = store.graph_counts("/corpus").await.unwrap();
    let nodes: std::collections::HashMap<_, _> = counts.nodes.iter().cloned().collect();
    let edges: std::collections::HashMap<_, _> = counts.edges.iter().cloned().collect();
    assert_eq!(nodes.get("concept"), Some(&1));
    assert_eq!(edges.get("mentions"), Some(&1));
}

#[tokio::test]
async fn duplicate_groups_share_a_hash() {
    let store = store().await;
    let a = unit("/corpus", "/corpus/one.md", "same body\n");
    let b = unit("/corpus", "/corpus/two.md", "same body\n");
    let c = unit("/corpus", "/corpus/three.md", "different body\n");

    for u in [&a, &b, &c] {
        apply(&store, u, &ExtractionBundle::default()).await;
    }

    let groups = store.duplicate_groups("/corpus").await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].copies, 2);
    assert_eq!(groups[0].hash, a.hash);
    let mut paths = groups[0].paths.clone();
    paths.sort();
    assert_eq!(paths, vec!["/corpus/one.md", "/corpus/two.md"]);
}

#[tokio::test]
async fn embeddings_backfill_and_query_back() {
    let store = store().await;
    let source = unit("/corpus", "/corpus/a.md", "embedded text\n");
    apply(&store, &source, &ExtractionBundle::default()).await;

    let pending = store.units_missing_embedding("/corpus").await.unwrap();
    assert_eq!(pending.len(), 1);

    store
        .set_embedding("/corpus/a.md", &[0.25, 0.5, 0.25])
        .await
        .unwrap();
    assert!(store
        .units_missing_embedding("/corpus")
        .await
        .unwrap()
        .is_empty());

    let record = store.get_unit("/corpus/a.md").await.unwrap().unwrap();
    assert_eq!(record.embedding, Some(vec![0.25, 0.5, 0.25]));
}

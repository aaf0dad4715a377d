//! Idempotent graph persistence.
//!
//! Every write goes through `UPSERT` (nodes) or `INSERT IGNORE RELATION`
//! (edges), so repeating an extraction merges instead of duplicating and
//! concurrent writers of the same key commute. Within one unit of work the
//! nodes are always written before the edges that reference them — an
//! interrupted process can lose edges, never strand them.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use trellis_core::{
    EdgeKind, ExtractionBundle, NodeKey, SemanticEntity, SemanticRelation, SourceUnit,
    StructuralEntity, UnitEdge,
};

use crate::schema::{EDGE_TABLES, NODE_TABLES};
use crate::{bindings, SurrealClient, StoreResult};

/// A stored unit row, as read back from the store.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitRecord {
    pub path: String,
    pub title: String,
    pub content: String,
    pub size: u64,
    pub modified: String,
    pub hash: String,
    pub encoding: String,
    pub extension: String,
    pub corpus: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// Graph store facade over one SurrealDB session.
#[derive(Debug, Clone)]
pub struct GraphStore {
    client: SurrealClient,
}

/// Intern a runtime table name back to the closed static set.
fn static_table(table: &str) -> Option<&'static str> {
    NODE_TABLES.iter().copied().find(|t| *t == table)
}

impl GraphStore {
    pub fn new(client: SurrealClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SurrealClient {
        &self.client
    }

    /// Upsert the unit node itself.
    ///
    /// The embedding field is omitted when absent so re-indexing an
    /// unchanged unit resets it to "pending" rather than storing nulls; the
    /// embedding backfill phase fills it in again.
    pub async fn upsert_unit(&self, unit: &SourceUnit) -> StoreResult<()> {
        let mut content = json!({
            "path": unit.path,
            "title": unit.title,
            "content": unit.content,
            "size": unit.size,
            "modified": unit.modified.to_rfc3339(),
            "hash": unit.hash,
            "encoding": unit.encoding,
            "extension": unit.extension,
            "corpus": unit.corpus,
            "aliases": unit.aliases,
        });
        if let Some(embedding) = &unit.embedding {
            content["embedding"] = json!(embedding);
        }

        self.client
            .execute(
                "UPSERT type::thing('unit', $path) CONTENT $content",
                bindings! { "path" => unit.path, "content" => content },
            )
            .await
    }

    /// Upsert the container chain from the corpus root down to the unit's
    /// parent, with `contains` edges along the way.
    pub async fn upsert_containers(&self, unit: &SourceUnit) -> StoreResult<()> {
        let root = Path::new(&unit.corpus);
        let unit_path = Path::new(&unit.path);

        // Ancestors inside the corpus, root first.
        let mut chain: Vec<&Path> = unit_path
            .ancestors()
            .skip(1)
            .take_while(|p| p.starts_with(root))
            .collect();
        chain.reverse();

        let mut parent: Option<String> = None;
        for dir in chain {
            let dir_path = dir.to_string_lossy().to_string();
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| dir_path.clone());

            self.client
                .execute(
                    "UPSERT type::thing('container', $path) CONTENT { path: $path, name: $name, corpus: $corpus }",
                    bindings! { "path" => dir_path, "name" => name, "corpus" => unit.corpus },
                )
                .await?;

            if let Some(parent_path) = parent {
                self.insert_edge(
                    EdgeKind::Contains,
                    &NodeKey::new("container", parent_path),
                    &NodeKey::new("container", dir_path.clone()),
                    &unit.corpus,
                    None,
                )
                .await?;
            }
            parent = Some(dir_path);
        }

        if let Some(parent_path) = parent {
            self.insert_edge(
                EdgeKind::Contains,
                &NodeKey::new("container", parent_path),
                &unit.key(),
                &unit.corpus,
                None,
            )
            .await?;
        }
        Ok(())
    }

    async fn upsert_structural_entity(
        &self,
        entity: &StructuralEntity,
        corpus: &str,
    ) -> StoreResult<()> {
        let key = entity.key();
        let content = match entity {
            StructuralEntity::ImportedModule { name }
            | StructuralEntity::Function { name }
            | StructuralEntity::Class { name }
            | StructuralEntity::Tag { name } => json!({ "name": name, "corpus": corpus }),
            StructuralEntity::InternalLink { target, resolved } => {
                json!({ "name": target, "resolved": resolved, "corpus": corpus })
            }
            StructuralEntity::ExternalLink { url, text } => {
                json!({ "url": url, "text": text, "corpus": corpus })
            }
            StructuralEntity::Header { title, level } => {
                json!({ "title": title, "level": level, "corpus": corpus })
            }
        };

        self.client
            .execute(
                &format!("UPSERT type::thing('{}', $id) CONTENT $content", key.table),
                bindings! { "id" => key.id, "content" => content },
            )
            .await
    }

    async fn upsert_concept(&self, concept: &SemanticEntity, corpus: &str) -> StoreResult<()> {
        let key = concept.key();
        self.client
            .execute(
                "UPSERT type::thing('concept', $id) CONTENT $content",
                bindings! {
                    "id" => key.id,
                    "content" => json!({
                        "name": concept.name,
                        "entity_type": concept.entity_type,
                        "confidence": concept.confidence,
                        "aliases": concept.aliases,
                        "corpus": corpus,
                    }),
                },
            )
            .await
    }

    /// Idempotently assert one edge. Duplicate asserts are no-ops absorbed
    /// by the UNIQUE (`in`, `out`) index.
    async fn insert_edge(
        &self,
        kind: EdgeKind,
        from: &NodeKey,
        to: &NodeKey,
        corpus: &str,
        relation: Option<(&str, f32)>,
    ) -> StoreResult<()> {
        let sql = format!(
            "INSERT IGNORE RELATION INTO {table} {{ in: type::thing($from_tb, $from_id), out: type::thing($to_tb, $to_id), corpus: $corpus{extra} }}",
            table = kind.table(),
            extra = if relation.is_some() {
                ", relation: $relation, confidence: $confidence"
            } else {
                ""
            },
        );

        let mut bindings = bindings! {
            "from_tb" => from.table,
            "from_id" => from.id,
            "to_tb" => to.table,
            "to_id" => to.id,
            "corpus" => corpus,
        };
        if let Some((name, confidence)) = relation {
            bindings.push(("relation".to_string(), json!(name)));
            bindings.push(("confidence".to_string(), json!(confidence)));
        }

        self.client.execute(&sql, bindings).await
    }

    /// Apply a structural bundle: entity nodes first, then unit edges.
    pub async fn apply_structural(
        &self,
        unit: &SourceUnit,
        bundle: &ExtractionBundle,
    ) -> StoreResult<()> {
        for entity in &bundle.entities {
            self.upsert_structural_entity(entity, &unit.corpus).await?;
        }
        let from = unit.key();
        for edge in &bundle.edges {
            self.insert_edge(edge.kind, &from, &edge.target, &unit.corpus, None)
                .await?;
        }
        Ok(())
    }

    /// Apply validated semantics: concept nodes, `mentions` edges, then
    /// concept-to-concept `relates` edges.
    pub async fn apply_semantics(
        &self,
        unit: &SourceUnit,
        entities: &[SemanticEntity],
        relations: &[SemanticRelation],
    ) -> StoreResult<()> {
        for concept in entities {
            self.upsert_concept(concept, &unit.corpus).await?;
        }

        let from = unit.key();
        for concept in entities {
            self.insert_edge(EdgeKind::Mentions, &from, &concept.key(), &unit.corpus, None)
                .await?;
        }

        let find = |name: &str| {
            entities
                .iter()
                .find(|e| e.name.eq_ignore_ascii_case(name))
                .map(SemanticEntity::key)
        };
        for relation in relations {
            let (Some(source), Some(target)) = (find(&relation.source), find(&relation.target))
            else {
                // Validation upstream makes this unreachable in practice.
                continue;
            };
            self.insert_edge(
                EdgeKind::Relates,
                &source,
                &target,
                &unit.corpus,
                Some((&relation.relation, relation.confidence)),
            )
            .await?;
        }
        Ok(())
    }

    /// Store a computed content embedding for a unit.
    pub async fn set_embedding(&self, path: &str, vector: &[f32]) -> StoreResult<()> {
        self.client
            .execute(
                "UPDATE type::thing('unit', $path) SET embedding = $vector",
                bindings! { "path" => path, "vector" => vector },
            )
            .await
    }

    /// Snapshot the edges a unit currently owns (all edges whose `in` side
    /// is the unit).
    pub async fn edges_owned_by(&self, path: &str) -> StoreResult<HashSet<UnitEdge>> {
        #[derive(Deserialize)]
        struct EdgeRow {
            target_tb: String,
            target_id: String,
        }

        let mut owned = HashSet::new();
        for kind in EdgeKind::UNIT_OWNED {
            let rows: Vec<EdgeRow> = self
                .client
                .select(
                    &format!(
                        "SELECT record::tb(out) AS target_tb, record::id(out) AS target_id FROM {} WHERE in = type::thing('unit', $path)",
                        kind.table()
                    ),
                    bindings! { "path" => path },
                )
                .await?;
            for row in rows {
                let Some(table) = static_table(&row.target_tb) else {
                    continue;
                };
                owned.insert(UnitEdge {
                    kind,
                    target: NodeKey::new(table, row.target_id),
                });
            }
        }
        Ok(owned)
    }

    /// Remove a previously asserted unit edge.
    pub async fn remove_edge(&self, path: &str, edge: &UnitEdge) -> StoreResult<()> {
        self.client
            .execute(
                &format!(
                    "DELETE {} WHERE in = type::thing('unit', $path) AND out = type::thing($to_tb, $to_id)",
                    edge.kind.table()
                ),
                bindings! { "path" => path, "to_tb" => edge.target.table, "to_id" => edge.target.id },
            )
            .await
    }

    /// Reconcile a unit's owned edges with a freshly extracted desired set.
    ///
    /// Nodes (unit, entities, concepts) are upserted first; then only the
    /// add/remove edge delta is applied — never a full rebuild. Returns
    /// `(added, removed)` edge counts.
    pub async fn sync_unit(
        &self,
        unit: &SourceUnit,
        bundle: &ExtractionBundle,
        entities: &[SemanticEntity],
        relations: &[SemanticRelation],
    ) -> StoreResult<(usize, usize)> {
        let existing = self.edges_owned_by(&unit.path).await?;

        self.upsert_unit(unit).await?;
        self.upsert_containers(unit).await?;
        self.apply_structural(unit, bundle).await?;
        self.apply_semantics(unit, entities, relations).await?;

        let mut desired: HashSet<UnitEdge> = bundle.edges.iter().cloned().collect();
        for concept in entities {
            desired.insert(UnitEdge {
                kind: EdgeKind::Mentions,
                target: concept.key(),
            });
        }

        let mut removed = 0;
        for stale in existing.difference(&desired) {
            self.remove_edge(&unit.path, stale).await?;
            removed += 1;
        }
        let added = desired.difference(&existing).count();

        debug!(unit = %unit.path, added, removed, "synchronized unit edges");
        Ok((added, removed))
    }

    /// Delete a unit node and every edge it exclusively owns. Shared entity
    /// nodes stay; other units' edges keep them meaningful.
    pub async fn delete_unit(&self, path: &str) -> StoreResult<()> {
        for kind in EdgeKind::UNIT_OWNED {
            self.client
                .execute(
                    &format!(
                        "DELETE {} WHERE in = type::thing('unit', $path)",
                        kind.table()
                    ),
                    bindings! { "path" => path },
                )
                .await?;
        }
        // Inbound containment edge, then the node itself.
        self.client
            .execute(
                "DELETE contains WHERE out = type::thing('unit', $path)",
                bindings! { "path" => path },
            )
            .await?;
        self.client
            .execute(
                "DELETE type::thing('unit', $path)",
                bindings! { "path" => path },
            )
            .await?;
        debug!(unit = %path, "deleted unit and owned edges");
        Ok(())
    }

    /// Atomically remove every row owned by one corpus — and nothing else.
    pub async fn clear(&self, corpus: &str) -> StoreResult<()> {
        let mut sql = String::from("BEGIN TRANSACTION;\n");
        // Edges first so no statement ever observes a dangling edge.
        for table in EDGE_TABLES {
            sql.push_str(&format!("DELETE {table} WHERE corpus = $corpus;\n"));
        }
        for table in NODE_TABLES {
            sql.push_str(&format!("DELETE {table} WHERE corpus = $corpus;\n"));
        }
        sql.push_str("COMMIT TRANSACTION;");

        self.client
            .execute(&sql, bindings! { "corpus" => corpus })
            .await?;
        debug!(corpus, "cleared corpus subgraph");
        Ok(())
    }

    /// Read one unit back, if present.
    pub async fn get_unit(&self, path: &str) -> StoreResult<Option<UnitRecord>> {
        let rows: Vec<UnitRecord> = self
            .client
            .select(
                "SELECT * FROM unit WHERE path = $path LIMIT 1",
                bindings! { "path" => path },
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// All titles, aliases, and file stems in a corpus, for link resolution.
    pub async fn titles(&self, corpus: &str) -> StoreResult<Vec<String>> {
        #[derive(Deserialize)]
        struct TitleRow {
            title: String,
            path: String,
            #[serde(default)]
            aliases: Vec<String>,
        }

        let rows: Vec<TitleRow> = self
            .client
            .select(
                "SELECT title, path, aliases FROM unit WHERE corpus = $corpus",
                bindings! { "corpus" => corpus },
            )
            .await?;
        Ok(rows
            .into_iter()
            .flat_map(|r| {
                let stem = Path::new(&r.path)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string());
                std::iter::once(r.title).chain(stem).chain(r.aliases)
            })
            .collect())
    }

    /// Units whose embedding has not been computed yet.
    pub async fn units_missing_embedding(
        &self,
        corpus: &str,
    ) -> StoreResult<Vec<(String, String)>> {
        #[derive(Deserialize)]
        struct PendingRow {
            path: String,
            content: String,
        }

        let rows: Vec<PendingRow> = self
            .client
            .select(
                "SELECT path, content FROM unit WHERE corpus = $corpus AND embedding IS NONE",
                bindings! { "corpus" => corpus },
            )
            .await?;
        Ok(rows.into_iter().map(|r| (r.path, r.content)).collect())
    }

    /// Node and edge counts per table, corpus-scoped.
    pub async fn graph_counts(&self, corpus: &str) -> StoreResult<GraphCounts> {
        let mut counts = GraphCounts::default();
        for table in NODE_TABLES {
            let n = self.client.count(table, Some(corpus)).await?;
            if n > 0 {
                counts.nodes.push((table.to_string(), n));
            }
        }
        for table in EDGE_TABLES {
            let n = self.client.count(table, Some(corpus)).await?;
            if n > 0 {
                counts.edges.push((table.to_string(), n));
            }
        }
        Ok(counts)
    }
}

/// Per-table node and edge totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphCounts {
    pub nodes: Vec<(String, u64)>,
    pub edges: Vec<(String, u64)>,
}

impl GraphCounts {
    pub fn total_nodes(&self) -> u64 {
        self.nodes.iter().map(|(_, n)| n).sum()
    }

    pub fn total_edges(&self) -> u64 {
        self.edges.iter().map(|(_, n)| n).sum()
    }
}

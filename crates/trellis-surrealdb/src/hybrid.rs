//! Hybrid retrieval engine.
//!
//! Combines vector similarity and full-text search over unit content, fuses
//! the two ranked lists through the configured [`FusionPolicy`], optionally
//! expands the result one graph hop (resolved links, shared tags), and can
//! hand the bounded context to the language model for an answer that must
//! cite its sources.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};
use trellis_core::{normalize_key, ChannelHit, FusionPolicy, ReciprocalRankFusion};
use trellis_llm::{ContextSnippet, EmbeddingProvider, GroundedAnswer, LanguageModel};

use crate::{bindings, GraphStore, StoreResult};

/// Optional narrowing of the search space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub tag: Option<String>,
    pub folder: Option<String>,
    pub extension: Option<String>,
}

impl SearchFilters {
    fn clauses(&self) -> (String, crate::client::Bindings) {
        let mut sql = String::new();
        let mut bindings = Vec::new();
        if let Some(tag) = &self.tag {
            sql.push_str(" AND ->has_tag->tag CONTAINS type::thing('tag', $filter_tag)");
            bindings.push(("filter_tag".to_string(), serde_json::json!(normalize_key(tag))));
        }
        if let Some(folder) = &self.folder {
            sql.push_str(" AND string::starts_with(path, $filter_folder)");
            bindings.push(("filter_folder".to_string(), serde_json::json!(folder)));
        }
        if let Some(extension) = &self.extension {
            sql.push_str(" AND extension = $filter_extension");
            bindings.push((
                "filter_extension".to_string(),
                serde_json::json!(extension.trim_start_matches('.')),
            ));
        }
        (sql, bindings)
    }
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct HybridConfig {
    /// Top-K fetched from each channel before fusion.
    pub channel_k: usize,
    /// Maximum context snippets, expansion included.
    pub context_window: usize,
    /// Characters of content carried per snippet.
    pub excerpt_chars: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            channel_k: 20,
            context_window: 20,
            excerpt_chars: 1000,
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub path: String,
    pub title: String,
    pub score: f64,
    pub in_vector: bool,
    pub in_fulltext: bool,
    /// True for results pulled in by one-hop graph expansion.
    pub expanded: bool,
    pub excerpt: String,
}

/// Result of the answer-generation step.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    /// `None` when no model is configured or the answer failed citation
    /// validation; the ranked context is always present.
    pub answer: Option<GroundedAnswer>,
    pub context: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct ScoredRow {
    path: String,
    title: String,
    content: String,
    score: f64,
}

#[derive(Deserialize)]
struct UnitRow {
    path: String,
    title: String,
    content: String,
}

/// The hybrid query engine.
pub struct HybridQueryEngine {
    store: GraphStore,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    model: Option<Arc<dyn LanguageModel>>,
    fusion: Arc<dyn FusionPolicy>,
    config: HybridConfig,
}

impl HybridQueryEngine {
    pub fn new(store: GraphStore, config: HybridConfig) -> Self {
        Self {
            store,
            embedder: None,
            model: None,
            fusion: Arc::new(ReciprocalRankFusion::default()),
            config,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Swap the fusion formula.
    pub fn with_fusion(mut self, fusion: Arc<dyn FusionPolicy>) -> Self {
        self.fusion = fusion;
        self
    }

    /// Vector-similarity channel. Empty when no embedder is configured or
    /// nothing has an embedding yet.
    async fn vector_channel(
        &self,
        corpus: &str,
        query: &str,
        filters: &SearchFilters,
    ) -> StoreResult<Vec<ScoredRow>> {
        let Some(embedder) = &self.embedder else {
            return Ok(Vec::new());
        };
        let vector = match embedder.embed(&[query.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => return Ok(Vec::new()),
            Err(e) => {
                warn!("query embedding failed, vector channel skipped: {e}");
                return Ok(Vec::new());
            }
        };

        let (filter_sql, filter_bindings) = filters.clauses();
        let knn_sql = format!(
            "SELECT path, title, content, vector::similarity::cosine(embedding, $vector) AS score \
             FROM unit WHERE corpus = $corpus AND embedding <|{k}|> $vector{filter_sql} \
             ORDER BY score DESC",
            k = self.config.channel_k,
        );
        let mut bindings = bindings! { "corpus" => corpus, "vector" => vector };
        bindings.extend(filter_bindings.clone());

        // KNN needs the MTREE index; fall back to a linear scan without it.
        match self.store.client().select(&knn_sql, bindings.clone()).await {
            Ok(rows) => Ok(rows),
            Err(e) => {
                debug!("knn search unavailable, falling back to ordered scan: {e}");
                let scan_sql = format!(
                    "SELECT path, title, content, vector::similarity::cosine(embedding, $vector) AS score \
                     FROM unit WHERE corpus = $corpus AND embedding != NONE{filter_sql} \
                     ORDER BY score DESC LIMIT {k}",
                    k = self.config.channel_k,
                );
                self.store.client().select(&scan_sql, bindings).await
            }
        }
    }

    /// Full-text channel over content and title.
    async fn fulltext_channel(
        &self,
        corpus: &str,
        query: &str,
        filters: &SearchFilters,
    ) -> StoreResult<Vec<ScoredRow>> {
        let (filter_sql, filter_bindings) = filters.clauses();
        let sql = format!(
            "SELECT path, title, content, (search::score(0) + search::score(1)) AS score \
             FROM unit WHERE corpus = $corpus AND (content @0@ $query OR title @1@ $query){filter_sql} \
             ORDER BY score DESC LIMIT {k}",
            k = self.config.channel_k,
        );
        let mut bindings = bindings! { "corpus" => corpus, "query" => query };
        bindings.extend(filter_bindings);
        self.store.client().select(&sql, bindings).await
    }

    /// Ranked hybrid search. An empty corpus or a query matching nothing
    /// yields an empty list, never an error.
    pub async fn search(
        &self,
        corpus: &str,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> StoreResult<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return self.list_units(corpus, filters, limit).await;
        }

        let vector_rows = self.vector_channel(corpus, query, filters).await?;
        let fulltext_rows = self.fulltext_channel(corpus, query, filters).await?;
        debug!(
            vector = vector_rows.len(),
            fulltext = fulltext_rows.len(),
            "channel results"
        );

        let to_hits = |rows: &[ScoredRow]| -> Vec<ChannelHit> {
            rows.iter()
                .map(|r| ChannelHit {
                    id: r.path.clone(),
                    score: r.score,
                })
                .collect()
        };
        let fused = self
            .fusion
            .fuse(&to_hits(&vector_rows), &to_hits(&fulltext_rows));

        // Join fused ranking back to row data for titles and excerpts.
        let mut by_path: std::collections::HashMap<&str, &ScoredRow> = Default::default();
        for row in vector_rows.iter().chain(fulltext_rows.iter()) {
            by_path.entry(&row.path).or_insert(row);
        }

        Ok(fused
            .into_iter()
            .take(limit)
            .filter_map(|hit| {
                by_path.get(hit.id.as_str()).map(|row| SearchHit {
                    path: row.path.clone(),
                    title: row.title.clone(),
                    score: hit.score,
                    in_vector: hit.in_vector,
                    in_fulltext: hit.in_fulltext,
                    expanded: false,
                    excerpt: excerpt(&row.content, self.config.excerpt_chars),
                })
            })
            .collect())
    }

    /// Filter-only listing (tag / folder / extension browse), newest first.
    pub async fn list_units(
        &self,
        corpus: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> StoreResult<Vec<SearchHit>> {
        let (filter_sql, filter_bindings) = filters.clauses();
        let sql = format!(
            "SELECT path, title, content FROM unit WHERE corpus = $corpus{filter_sql} \
             ORDER BY modified DESC LIMIT {limit}",
        );
        let mut bindings = bindings! { "corpus" => corpus };
        bindings.extend(filter_bindings);

        let rows: Vec<UnitRow> = self.store.client().select(&sql, bindings).await?;
        Ok(rows
            .into_iter()
            .map(|row| SearchHit {
                path: row.path,
                title: row.title,
                score: 0.0,
                in_vector: false,
                in_fulltext: false,
                expanded: false,
                excerpt: excerpt(&row.content, self.config.excerpt_chars),
            })
            .collect())
    }

    /// One-hop graph expansion: units resolved from the hits' reference
    /// links, then units sharing a tag, appended in that order until the
    /// context window is full.
    pub async fn expand_context(
        &self,
        corpus: &str,
        hits: &mut Vec<SearchHit>,
    ) -> StoreResult<()> {
        let window = self.config.context_window;
        if hits.len() >= window {
            hits.truncate(window);
            return Ok(());
        }

        #[derive(Deserialize)]
        struct TargetRow {
            target: String,
        }
        #[derive(Deserialize)]
        struct PathRow {
            path: String,
        }

        let mut seen: std::collections::HashSet<String> =
            hits.iter().map(|h| h.path.clone()).collect();
        let seeds: Vec<String> = hits.iter().map(|h| h.path.clone()).collect();

        for seed in &seeds {
            if hits.len() >= window {
                break;
            }

            // Resolved reference links out of the seed.
            let targets: Vec<TargetRow> = self
                .store
                .client()
                .select(
                    "SELECT record::id(out) AS target FROM links_to WHERE in = type::thing('unit', $path) AND out.resolved = true",
                    bindings! { "path" => seed },
                )
                .await?;
            let targets: Vec<String> = targets.into_iter().map(|r| r.target).collect();

            let linked: Vec<UnitRow> = if targets.is_empty() {
                Vec::new()
            } else {
                self.store
                    .client()
                    .select(
                        "SELECT path, title, content FROM unit WHERE corpus = $corpus AND string::lowercase(title) INSIDE $targets",
                        bindings! { "corpus" => corpus, "targets" => targets },
                    )
                    .await?
            };

            // Units sharing a tag with the seed.
            let tagged: Vec<PathRow> = self
                .store
                .client()
                .select(
                    "SELECT record::id(in) AS path FROM has_tag WHERE corpus = $corpus AND out INSIDE (SELECT VALUE out FROM has_tag WHERE in = type::thing('unit', $path)) AND record::id(in) != $path",
                    bindings! { "corpus" => corpus, "path" => seed },
                )
                .await?;

            for unit in linked {
                if hits.len() >= window {
                    break;
                }
                if seen.insert(unit.path.clone()) {
                    hits.push(SearchHit {
                        path: unit.path,
                        title: unit.title,
                        score: 0.0,
                        in_vector: false,
                        in_fulltext: false,
                        expanded: true,
                        excerpt: excerpt(&unit.content, self.config.excerpt_chars),
                    });
                }
            }

            for row in tagged {
                if hits.len() >= window {
                    break;
                }
                if seen.insert(row.path.clone()) {
                    if let Some(unit) = self.store.get_unit(&row.path).await? {
                        hits.push(SearchHit {
                            path: unit.path,
                            title: unit.title,
                            score: 0.0,
                            in_vector: false,
                            in_fulltext: false,
                            expanded: true,
                            excerpt: excerpt(&unit.content, self.config.excerpt_chars),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Search, expand, and answer with enforced citations.
    ///
    /// The model's answer is only trusted when every citation names a source
    /// present in the supplied context; otherwise the answer is discarded
    /// and the caller falls back to showing the context itself.
    pub async fn answer(
        &self,
        corpus: &str,
        question: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> StoreResult<AnswerOutcome> {
        let mut context = self.search(corpus, question, filters, limit).await?;
        self.expand_context(corpus, &mut context).await?;

        let Some(model) = &self.model else {
            return Ok(AnswerOutcome {
                answer: None,
                context,
            });
        };
        if context.is_empty() {
            return Ok(AnswerOutcome {
                answer: None,
                context,
            });
        }

        let snippets: Vec<ContextSnippet> = context
            .iter()
            .map(|hit| ContextSnippet {
                id: hit.path.clone(),
                title: hit.title.clone(),
                excerpt: hit.excerpt.clone(),
            })
            .collect();

        let answer = match model.answer(question, &snippets).await {
            Ok(answer) => {
                let known: std::collections::HashSet<&str> =
                    snippets.iter().map(|s| s.id.as_str()).collect();
                let rogue: Vec<&String> = answer
                    .citations
                    .iter()
                    .filter(|c| !known.contains(c.as_str()))
                    .collect();
                if answer.citations.is_empty() {
                    warn!("discarding answer with no citations");
                    None
                } else if !rogue.is_empty() {
                    warn!(?rogue, "discarding answer citing sources outside the context");
                    None
                } else {
                    Some(answer)
                }
            }
            Err(e) => {
                warn!("answer generation failed: {e}");
                None
            }
        };

        Ok(AnswerOutcome { answer, context })
    }
}

/// Truncate content on a character boundary for display and prompting.
fn excerpt(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let mut cut: String = content.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("héllo wörld", 5), "héllo…");
    }

    #[test]
    fn filter_clauses_compose() {
        let filters = SearchFilters {
            tag: Some("Rust".into()),
            folder: Some("/v/notes".into()),
            extension: Some(".md".into()),
        };
        let (sql, bindings) = filters.clauses();
        assert!(sql.contains("has_tag"));
        assert!(sql.contains("starts_with"));
        assert!(sql.contains("extension ="));
        // Tag normalized, extension stripped of its dot.
        assert_eq!(bindings[0].1, serde_json::json!("rust"));
        assert_eq!(bindings[2].1, serde_json::json!("md"));
    }
}

//! Read-side aggregate operations.
//!
//! Every built-in read goes through a parameterized template here; the only
//! raw-query surface is the explicit pass-through on the client. All
//! operations are corpus-scoped so two corpora can share a database.

use serde::Deserialize;

use crate::{bindings, GraphCounts, GraphStore, StoreResult};

/// One bucket of the extension histogram.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtensionCount {
    pub extension: String,
    pub count: u64,
}

/// One bucket of the tag-usage histogram.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TagUsage {
    pub tag: String,
    pub uses: u64,
}

/// A unit ranked by size.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SizeRanked {
    pub path: String,
    pub title: String,
    pub size: u64,
}

/// A group of byte-identical units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DuplicateGroup {
    pub hash: String,
    pub copies: u64,
    pub paths: Vec<String>,
}

/// A link target ranked by inbound link count.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkRank {
    pub target: String,
    pub resolved: bool,
    pub inbound: u64,
}

/// A unit with neither inbound nor outbound reference links.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrphanUnit {
    pub path: String,
    pub title: String,
}

/// Corpus-level size statistics.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CorpusStats {
    pub total_units: u64,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub avg_size: f64,
    #[serde(default)]
    pub max_size: u64,
}

/// Stored detail view of one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitDetail {
    pub path: String,
    pub title: String,
    pub size: u64,
    pub modified: String,
    pub hash: String,
    pub encoding: String,
    pub aliases: Vec<String>,
    pub tags: Vec<String>,
    pub links: Vec<(String, bool)>,
    pub external_links: Vec<(String, String)>,
    pub headers: Vec<(String, u8)>,
    pub concepts: Vec<(String, String)>,
}

impl GraphStore {
    /// Histogram of unit extensions.
    pub async fn extension_histogram(&self, corpus: &str) -> StoreResult<Vec<ExtensionCount>> {
        self.client()
            .select(
                "SELECT extension, count() AS count FROM unit WHERE corpus = $corpus GROUP BY extension ORDER BY count DESC",
                bindings! { "corpus" => corpus },
            )
            .await
    }

    /// Most-used tags by inbound `has_tag` edge count.
    pub async fn tag_histogram(&self, corpus: &str, limit: usize) -> StoreResult<Vec<TagUsage>> {
        self.client()
            .select(
                "SELECT record::id(id) AS tag, count(<-has_tag) AS uses FROM tag WHERE corpus = $corpus ORDER BY uses DESC LIMIT $limit",
                bindings! { "corpus" => corpus, "limit" => limit },
            )
            .await
    }

    /// Largest units by byte size.
    pub async fn largest_units(&self, corpus: &str, limit: usize) -> StoreResult<Vec<SizeRanked>> {
        self.client()
            .select(
                "SELECT path, title, size FROM unit WHERE corpus = $corpus ORDER BY size DESC LIMIT $limit",
                bindings! { "corpus" => corpus, "limit" => limit },
            )
            .await
    }

    /// Groups of distinct paths sharing one content hash.
    pub async fn duplicate_groups(&self, corpus: &str) -> StoreResult<Vec<DuplicateGroup>> {
        self.client()
            .select(
                "SELECT * FROM (SELECT hash, count() AS copies, array::group(path) AS paths FROM unit WHERE corpus = $corpus GROUP BY hash) WHERE copies > 1 ORDER BY copies DESC",
                bindings! { "corpus" => corpus },
            )
            .await
    }

    /// Link targets ranked by inbound `links_to` degree.
    pub async fn most_linked(&self, corpus: &str, limit: usize) -> StoreResult<Vec<LinkRank>> {
        self.client()
            .select(
                "SELECT record::id(id) AS target, resolved, count(<-links_to) AS inbound FROM internal_link WHERE corpus = $corpus ORDER BY inbound DESC LIMIT $limit",
                bindings! { "corpus" => corpus, "limit" => limit },
            )
            .await
    }

    /// Units with no outbound reference links and no inbound resolution.
    pub async fn orphan_units(&self, corpus: &str) -> StoreResult<Vec<OrphanUnit>> {
        #[derive(Deserialize)]
        struct CandidateRow {
            path: String,
            title: String,
        }
        #[derive(Deserialize)]
        struct LinkedTarget {
            target: String,
        }

        let candidates: Vec<CandidateRow> = self
            .client()
            .select(
                "SELECT path, title FROM unit WHERE corpus = $corpus AND count(->links_to) = 0 ORDER BY path",
                bindings! { "corpus" => corpus },
            )
            .await?;

        // Targets that something links to, normalized like link keys are.
        let linked: Vec<LinkedTarget> = self
            .client()
            .select(
                "SELECT record::id(id) AS target FROM internal_link WHERE corpus = $corpus AND count(<-links_to) > 0",
                bindings! { "corpus" => corpus },
            )
            .await?;
        let linked: std::collections::HashSet<String> =
            linked.into_iter().map(|r| r.target).collect();

        Ok(candidates
            .into_iter()
            .filter(|c| !linked.contains(&trellis_core::normalize_key(&c.title)))
            .map(|c| OrphanUnit {
                path: c.path,
                title: c.title,
            })
            .collect())
    }

    /// Unit count and size aggregates for one corpus.
    pub async fn corpus_stats(&self, corpus: &str) -> StoreResult<CorpusStats> {
        let rows: Vec<CorpusStats> = self
            .client()
            .select(
                "SELECT count() AS total_units, math::sum(size) AS total_size, math::mean(size) AS avg_size, math::max(size) AS max_size FROM unit WHERE corpus = $corpus GROUP ALL",
                bindings! { "corpus" => corpus },
            )
            .await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    /// Per-table node and edge counts (re-exported here for the CLI).
    pub async fn counts(&self, corpus: &str) -> StoreResult<GraphCounts> {
        self.graph_counts(corpus).await
    }

    /// Everything stored about one unit, or `None` when it is not indexed.
    pub async fn unit_detail(&self, path: &str) -> StoreResult<Option<UnitDetail>> {
        let Some(unit) = self.get_unit(path).await? else {
            return Ok(None);
        };

        #[derive(Deserialize)]
        struct NameRow {
            name: String,
        }
        #[derive(Deserialize)]
        struct LinkRow {
            name: String,
            resolved: bool,
        }
        #[derive(Deserialize)]
        struct ExternalRow {
            text: String,
            url: String,
        }
        #[derive(Deserialize)]
        struct HeaderRow {
            title: String,
            level: u8,
        }
        #[derive(Deserialize)]
        struct ConceptRow {
            name: String,
            entity_type: String,
        }

        let tags: Vec<NameRow> = self
            .client()
            .select(
                "SELECT out.name AS name FROM has_tag WHERE in = type::thing('unit', $path) ORDER BY name",
                bindings! { "path" => path },
            )
            .await?;
        let links: Vec<LinkRow> = self
            .client()
            .select(
                "SELECT out.name AS name, out.resolved AS resolved FROM links_to WHERE in = type::thing('unit', $path) ORDER BY name",
                bindings! { "path" => path },
            )
            .await?;
        let external: Vec<ExternalRow> = self
            .client()
            .select(
                "SELECT out.text AS text, out.url AS url FROM links_to_external WHERE in = type::thing('unit', $path) ORDER BY url",
                bindings! { "path" => path },
            )
            .await?;
        let headers: Vec<HeaderRow> = self
            .client()
            .select(
                "SELECT out.title AS title, out.level AS level FROM has_header WHERE in = type::thing('unit', $path) ORDER BY level, title",
                bindings! { "path" => path },
            )
            .await?;
        let concepts: Vec<ConceptRow> = self
            .client()
            .select(
                "SELECT out.name AS name, out.entity_type AS entity_type FROM mentions WHERE in = type::thing('unit', $path) ORDER BY name",
                bindings! { "path" => path },
            )
            .await?;

        Ok(Some(UnitDetail {
            path: unit.path,
            title: unit.title,
            size: unit.size,
            modified: unit.modified,
            hash: unit.hash,
            encoding: unit.encoding,
            aliases: unit.aliases,
            tags: tags.into_iter().map(|r| r.name).collect(),
            links: links.into_iter().map(|r| (r.name, r.resolved)).collect(),
            external_links: external.into_iter().map(|r| (r.text, r.url)).collect(),
            headers: headers.into_iter().map(|r| (r.title, r.level)).collect(),
            concepts: concepts
                .into_iter()
                .map(|r| (r.name, r.entity_type))
                .collect(),
        }))
    }
}

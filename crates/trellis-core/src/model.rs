//! Property-graph data model.
//!
//! A corpus is a tree of [`SourceUnit`]s (files or notes) plus the entities
//! extracted from them. Structural entities come from the deterministic
//! parser; semantic entities come from the taxonomy-constrained language
//! model. Every node has a stable [`NodeKey`] so that repeated extraction
//! merges instead of duplicating.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize_key;

/// Which structural extraction profile applies to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitProfile {
    /// Source code: imports and top-level definitions.
    Code,
    /// Markdown-style notes: metadata, tags, links, headers.
    Note,
}

impl UnitProfile {
    /// Select a profile from a file extension (lowercase, without dot).
    pub fn for_extension(ext: &str) -> Self {
        match ext {
            "md" | "markdown" | "txt" => Self::Note,
            _ => Self::Code,
        }
    }
}

/// One indexed file or note.
///
/// The absolute path is the unique key. The embedding stays `None` until the
/// embedding backfill phase computes it; full-text search works regardless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub path: String,
    pub title: String,
    pub content: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub hash: String,
    pub encoding: String,
    pub extension: String,
    /// Canonicalized root path of the corpus this unit belongs to.
    pub corpus: String,
    /// Alternate titles from note metadata.
    pub aliases: Vec<String>,
    pub embedding: Option<Vec<f32>>,
}

impl SourceUnit {
    /// Graph key for this unit.
    pub fn key(&self) -> NodeKey {
        NodeKey::new("unit", &self.path)
    }

    pub fn profile(&self) -> UnitProfile {
        UnitProfile::for_extension(&self.extension)
    }
}

/// Address of a node: target table plus the record id within it.
///
/// Structural and semantic entities live in different tables, so their key
/// namespaces can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NodeKey {
    pub table: &'static str,
    pub id: String,
}

impl NodeKey {
    pub fn new(table: &'static str, id: impl Into<String>) -> Self {
        Self {
            table,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table, self.id)
    }
}

/// A deterministically extracted construct.
///
/// Keys are scoped to the corpus and shared across units: two files importing
/// `pandas` point at the same `import_module` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralEntity {
    ImportedModule { name: String },
    Function { name: String },
    Class { name: String },
    Tag { name: String },
    InternalLink { target: String, resolved: bool },
    ExternalLink { url: String, text: String },
    Header { title: String, level: u8 },
}

impl StructuralEntity {
    /// Table this entity variant persists into.
    pub fn table(&self) -> &'static str {
        match self {
            Self::ImportedModule { .. } => "import_module",
            Self::Function { .. } => "function",
            Self::Class { .. } => "class",
            Self::Tag { .. } => "tag",
            Self::InternalLink { .. } => "internal_link",
            Self::ExternalLink { .. } => "external_link",
            Self::Header { .. } => "header",
        }
    }

    /// Stable graph key. Headers fold their nesting level into the key so
    /// equal titles at different depths stay distinct.
    pub fn key(&self) -> NodeKey {
        let id = match self {
            Self::ImportedModule { name } | Self::Function { name } | Self::Class { name } => {
                name.clone()
            }
            Self::Tag { name } => normalize_key(name),
            Self::InternalLink { target, .. } => normalize_key(target),
            Self::ExternalLink { url, .. } => url.clone(),
            Self::Header { title, level } => format!("{}::h{}", normalize_key(title), level),
        };
        NodeKey::new(self.table(), id)
    }

    /// The edge kind connecting an owning unit to this entity.
    pub fn edge_kind(&self) -> EdgeKind {
        match self {
            Self::ImportedModule { .. } => EdgeKind::Imports,
            Self::Function { .. } | Self::Class { .. } => EdgeKind::Defines,
            Self::Tag { .. } => EdgeKind::HasTag,
            Self::InternalLink { .. } => EdgeKind::LinksTo,
            Self::ExternalLink { .. } => EdgeKind::LinksToExternal,
            Self::Header { .. } => EdgeKind::HasHeader,
        }
    }
}

/// A taxonomy-classified concept from the language-model extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticEntity {
    pub name: String,
    /// One of the taxonomy's entity types; validated before it gets here.
    pub entity_type: String,
    pub confidence: f32,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl SemanticEntity {
    /// Key is (taxonomy type, canonical name) inside the `concept` table.
    pub fn key(&self) -> NodeKey {
        NodeKey::new(
            "concept",
            format!(
                "{}::{}",
                normalize_key(&self.entity_type),
                normalize_key(&self.name)
            ),
        )
    }
}

/// A typed relation between two semantic entities, by entity name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticRelation {
    pub source: String,
    pub target: String,
    /// One of the taxonomy's relation types.
    pub relation: String,
    pub confidence: f32,
}

/// Directed edge kinds of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Imports,
    Defines,
    HasTag,
    LinksTo,
    LinksToExternal,
    HasHeader,
    /// Unit → semantic concept.
    Mentions,
    /// Concept → concept, carrying the taxonomy relation name.
    Relates,
}

impl EdgeKind {
    /// All edge kinds whose source endpoint is a unit. These are the edges a
    /// unit "owns" for diffing and deletion.
    pub const UNIT_OWNED: [EdgeKind; 7] = [
        EdgeKind::Imports,
        EdgeKind::Defines,
        EdgeKind::HasTag,
        EdgeKind::LinksTo,
        EdgeKind::LinksToExternal,
        EdgeKind::HasHeader,
        EdgeKind::Mentions,
    ];

    /// Edge-table name in the store.
    pub fn table(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Imports => "imports",
            Self::Defines => "defines",
            Self::HasTag => "has_tag",
            Self::LinksTo => "links_to",
            Self::LinksToExternal => "links_to_external",
            Self::HasHeader => "has_header",
            Self::Mentions => "mentions",
            Self::Relates => "relates",
        }
    }

    pub fn from_table(table: &str) -> Option<Self> {
        match table {
            "contains" => Some(Self::Contains),
            "imports" => Some(Self::Imports),
            "defines" => Some(Self::Defines),
            "has_tag" => Some(Self::HasTag),
            "links_to" => Some(Self::LinksTo),
            "links_to_external" => Some(Self::LinksToExternal),
            "has_header" => Some(Self::HasHeader),
            "mentions" => Some(Self::Mentions),
            "relates" => Some(Self::Relates),
            _ => None,
        }
    }
}

/// An edge from an owning unit to an extracted entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UnitEdge {
    pub kind: EdgeKind,
    pub target: NodeKey,
}

/// Fixed-shape output of structural extraction, identical for both profiles.
///
/// Entities always precede the edges that reference them, matching the
/// store's nodes-before-edges write ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionBundle {
    pub entities: Vec<StructuralEntity>,
    pub edges: Vec<UnitEdge>,
}

impl ExtractionBundle {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.edges.is_empty()
    }

    /// Push an entity together with its natural unit edge.
    pub fn push(&mut self, entity: StructuralEntity) {
        let edge = UnitEdge {
            kind: entity.edge_kind(),
            target: entity.key(),
        };
        // Re-extraction of the same construct merges on the key.
        if !self.edges.contains(&edge) {
            self.entities.push(entity);
            self.edges.push(edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_entities_key_identically() {
        let a = StructuralEntity::ImportedModule {
            name: "pandas".into(),
        };
        let b = StructuralEntity::ImportedModule {
            name: "pandas".into(),
        };
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().table, "import_module");
    }

    #[test]
    fn header_key_includes_level() {
        let h2 = StructuralEntity::Header {
            title: "Setup".into(),
            level: 2,
        };
        let h3 = StructuralEntity::Header {
            title: "Setup".into(),
            level: 3,
        };
        assert_ne!(h2.key(), h3.key());
    }

    #[test]
    fn semantic_keys_are_namespaced_away_from_structural() {
        let concept = SemanticEntity {
            name: "Pandas".into(),
            entity_type: "Software".into(),
            confidence: 0.9,
            aliases: vec![],
        };
        let module = StructuralEntity::ImportedModule {
            name: "pandas".into(),
        };
        assert_ne!(concept.key().table, module.key().table);
    }

    #[test]
    fn bundle_push_deduplicates_by_key() {
        let mut bundle = ExtractionBundle::default();
        bundle.push(StructuralEntity::Tag { name: "Rust".into() });
        bundle.push(StructuralEntity::Tag { name: "rust".into() });
        assert_eq!(bundle.entities.len(), 1);
        assert_eq!(bundle.edges.len(), 1);
    }

    #[test]
    fn profile_selection_by_extension() {
        assert_eq!(UnitProfile::for_extension("md"), UnitProfile::Note);
        assert_eq!(UnitProfile::for_extension("py"), UnitProfile::Code);
        assert_eq!(UnitProfile::for_extension("rs"), UnitProfile::Code);
    }
}

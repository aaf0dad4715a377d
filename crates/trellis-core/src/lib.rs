//! Trellis core types
//!
//! Shared vocabulary for the whole workspace: the property-graph data model
//! (source units, structural and semantic entities, edge kinds), the fixed
//! semantic taxonomy, content hashing, and the score-fusion policy used by
//! hybrid retrieval. This crate is pure data and policy — no I/O, no async.

pub mod fusion;
pub mod hashing;
pub mod model;
pub mod taxonomy;

pub use fusion::{ChannelHit, FusedHit, FusionPolicy, ReciprocalRankFusion};
pub use hashing::content_hash;
pub use model::{
    EdgeKind, ExtractionBundle, NodeKey, SemanticEntity, SemanticRelation, SourceUnit,
    StructuralEntity, UnitEdge, UnitProfile,
};
pub use taxonomy::{Taxonomy, TaxonomyDomain};

/// Normalize a free-form name into a stable graph key.
///
/// Lowercases, trims, and collapses internal whitespace so that
/// `"Other Note"` and `"other  note"` merge onto the same node.
pub fn normalize_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_case_and_whitespace() {
        assert_eq!(normalize_key("  Other   Note "), "other note");
        assert_eq!(normalize_key("pandas"), "pandas");
    }
}

//! Trellis SurrealDB backend
//!
//! The graph store and the hybrid retrieval engine. Persistence is
//! schema-constrained and idempotent: node keys become record ids, edge
//! tables carry UNIQUE (`in`, `out`) indexes, and every write is an upsert —
//! re-asserting existing facts is always a no-op. Read-side aggregates,
//! per-corpus clearing, hybrid (vector + full-text + graph) search, and the
//! visualization exports all live here too.

pub mod aggregates;
pub mod client;
pub mod error;
pub mod export;
pub mod hybrid;
pub mod schema;
pub mod store;

pub use aggregates::{
    CorpusStats, DuplicateGroup, ExtensionCount, LinkRank, OrphanUnit, SizeRanked, TagUsage,
    UnitDetail,
};
pub use client::{Bindings, StoreConfig, SurrealClient};
pub use error::{StoreError, StoreResult};
pub use export::{write_snapshot, ExportFormat, GraphSnapshot, SnapshotEdge, SnapshotNode};
pub use hybrid::{AnswerOutcome, HybridConfig, HybridQueryEngine, SearchFilters, SearchHit};
pub use schema::{apply_schema, ensure_vector_index};
pub use store::{GraphCounts, GraphStore, UnitRecord};

//! Trellis pipeline
//!
//! Scanning and orchestration: walks a corpus, decodes candidates, runs
//! structural and semantic extraction, persists results through the graph
//! store, and backfills embeddings. One pipeline object serves both the
//! full `index` run and the watcher's per-unit re-extraction.

pub mod error;
pub mod pipeline;
pub mod scanner;

pub use error::{PipelineError, PipelineResult};
pub use pipeline::{IndexPipeline, PipelineConfig, RunSummary};
pub use scanner::{decode, scan, ScanConfig, ScanOutcome, ScannedFile};

//! Trellis language-model capability
//!
//! Abstracts the external language-model service behind two narrow traits:
//! [`LanguageModel`] for taxonomy-constrained entity extraction and grounded
//! answer generation, and [`EmbeddingProvider`] for content vectors. An
//! OpenAI-compatible HTTP implementation talks to the live service; a
//! deterministic mock decouples every pipeline test from it.
//!
//! The [`SemanticExtractor`] sits above the trait: it batches units, retries
//! transient failures with exponential backoff, validates every returned
//! entity and relation against the taxonomy, and degrades gracefully when
//! the service stays down.

pub mod error;
pub mod extractor;
pub mod http;
pub mod mock;
pub mod provider;

pub use error::{LlmError, LlmResult};
pub use extractor::{ExtractorConfig, SemanticExtractor, UnitSemantics};
pub use http::{HttpConfig, HttpLanguageModel};
pub use mock::{MockEmbeddingProvider, MockLanguageModel};
pub use provider::{
    ContextSnippet, EmbeddingProvider, GroundedAnswer, LanguageModel, RawEntity, RawRelation,
    RawUnitExtraction, UnitText,
};

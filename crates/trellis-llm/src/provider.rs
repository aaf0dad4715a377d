//! Capability traits for the external language-model service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trellis_core::Taxonomy;

use crate::LlmResult;

/// The text of one unit as handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitText {
    /// Unit identity — the path.
    pub id: String,
    pub title: String,
    pub text: String,
}

/// An entity as returned by the model, before taxonomy validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    pub name: String,
    pub entity_type: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A relation as returned by the model, before taxonomy validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRelation {
    pub source: String,
    pub target: String,
    pub relation: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    0.7
}

/// The model's extraction for one unit of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawUnitExtraction {
    pub id: String,
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default)]
    pub relations: Vec<RawRelation>,
}

/// One retrieved unit handed to answer generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnippet {
    /// Source identifier the answer must cite — the unit path.
    pub id: String,
    pub title: String,
    pub excerpt: String,
}

/// An answer with the source identifiers it claims to rest on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroundedAnswer {
    pub text: String,
    pub citations: Vec<String>,
}

/// Batched entity/relation extraction and grounded answer generation.
///
/// Implementations are oracles: the pipeline validates everything they
/// return and never trusts type names or citations blindly.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Extract entities and relations for each unit of a batch.
    ///
    /// The result carries one element per input unit, matched by id. Units
    /// the model stayed silent on simply produce empty extractions.
    async fn extract(
        &self,
        batch: &[UnitText],
        taxonomy: &Taxonomy,
    ) -> LlmResult<Vec<RawUnitExtraction>>;

    /// Answer a question from the supplied context only, citing source ids.
    async fn answer(
        &self,
        question: &str,
        context: &[ContextSnippet],
    ) -> LlmResult<GroundedAnswer>;

    /// Implementation name for logs.
    fn name(&self) -> &'static str;
}

/// Content embedding generation.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>>;

    /// Dimensionality of the produced vectors.
    fn dimensions(&self) -> usize;

    /// Implementation name for logs.
    fn name(&self) -> &'static str;
}

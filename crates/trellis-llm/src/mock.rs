//! Deterministic test doubles for the language-model capability.
//!
//! The mock model replays fixtures keyed by unit id, so pipeline tests can
//! assert exact graph content without a live service. The mock embedder
//! derives vectors from a content hash: equal text always embeds equally,
//! and similar tests stay reproducible across runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use trellis_core::Taxonomy;

use crate::provider::{
    ContextSnippet, EmbeddingProvider, GroundedAnswer, LanguageModel, RawUnitExtraction, UnitText,
};
use crate::{LlmError, LlmResult};

/// Fixture-backed [`LanguageModel`].
#[derive(Default)]
pub struct MockLanguageModel {
    fixtures: Mutex<HashMap<String, RawUnitExtraction>>,
    /// Number of transient failures to inject before succeeding.
    fail_first: AtomicUsize,
    calls: AtomicUsize,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the extraction returned for a unit id.
    pub fn with_fixture(self, extraction: RawUnitExtraction) -> Self {
        self.fixtures
            .lock()
            .expect("fixture lock")
            .insert(extraction.id.clone(), extraction);
        self
    }

    /// Make the next `count` calls fail with a timeout before recovering.
    pub fn failing_first(self, count: usize) -> Self {
        self.fail_first.store(count, Ordering::SeqCst);
        self
    }

    /// How many extract/answer calls reached the mock.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self) -> LlmResult<()> {
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(LlmError::Timeout(1));
        }
        Ok(())
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn extract(
        &self,
        batch: &[UnitText],
        _taxonomy: &Taxonomy,
    ) -> LlmResult<Vec<RawUnitExtraction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;

        let fixtures = self.fixtures.lock().expect("fixture lock");
        Ok(batch
            .iter()
            .map(|unit| {
                fixtures
                    .get(&unit.id)
                    .cloned()
                    .unwrap_or(RawUnitExtraction {
                        id: unit.id.clone(),
                        entities: Vec::new(),
                        relations: Vec::new(),
                    })
            })
            .collect())
    }

    async fn answer(
        &self,
        question: &str,
        context: &[ContextSnippet],
    ) -> LlmResult<GroundedAnswer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;

        // Deterministic: answer mentions the question, cites every source.
        Ok(GroundedAnswer {
            text: format!("Answering '{question}' from {} sources.", context.len()),
            citations: context.iter().map(|c| c.id.clone()).collect(),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Hash-derived [`EmbeddingProvider`].
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        (0..self.dimensions)
            .map(|i| {
                let byte = digest[i % digest.len()];
                // Spread bytes into [-1, 1) with a per-index twist so the
                // vector is not constant.
                let twisted = byte.wrapping_add((i / digest.len()) as u8);
                (twisted as f32 / 128.0) - 1.0
            })
            .collect()
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::with_dimensions(384)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RawEntity;

    fn unit(id: &str) -> UnitText {
        UnitText {
            id: id.into(),
            title: id.into(),
            text: "text".into(),
        }
    }

    #[tokio::test]
    async fn fixtures_replay_by_unit_id() {
        let model = MockLanguageModel::new().with_fixture(RawUnitExtraction {
            id: "a".into(),
            entities: vec![RawEntity {
                name: "Ada Lovelace".into(),
                entity_type: "Person".into(),
                confidence: 0.95,
                aliases: vec![],
            }],
            relations: vec![],
        });

        let result = model
            .extract(&[unit("a"), unit("b")], &Taxonomy::standard())
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].entities.len(), 1);
        assert!(result[1].entities.is_empty());
    }

    #[tokio::test]
    async fn injected_failures_recover() {
        let model = MockLanguageModel::new().failing_first(2);
        let taxonomy = Taxonomy::standard();

        assert!(model.extract(&[unit("a")], &taxonomy).await.is_err());
        assert!(model.extract(&[unit("a")], &taxonomy).await.is_err());
        assert!(model.extract(&[unit("a")], &taxonomy).await.is_ok());
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let embedder = MockEmbeddingProvider::with_dimensions(16);
        let a = embedder.embed(&["same text".into()]).await.unwrap();
        let b = embedder.embed(&["same text".into()]).await.unwrap();
        let c = embedder.embed(&["other text".into()]).await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a[0].len(), 16);
    }
}

//! Batch-level semantic extraction with validation and retry.
//!
//! Sits between the pipeline and the raw [`LanguageModel`] capability.
//! Batching only amortizes call overhead — results are produced per unit, so
//! splitting the same units into different batches yields the same graph.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use trellis_core::{SemanticEntity, SemanticRelation, Taxonomy};

use crate::provider::{LanguageModel, RawUnitExtraction, UnitText};

/// Tuning for the semantic extraction phase.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Units per model call.
    pub batch_size: usize,
    /// Total attempts per batch, including the first.
    pub max_attempts: u32,
    /// First backoff delay; doubles per retry.
    pub base_delay: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Validated semantic extraction for one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitSemantics {
    pub id: String,
    pub entities: Vec<SemanticEntity>,
    pub relations: Vec<SemanticRelation>,
    /// Entries the model returned that failed taxonomy validation.
    pub dropped_entries: usize,
    /// True when the unit's batch failed persistently and the unit keeps
    /// only structural extraction results.
    pub degraded: bool,
}

/// Batched, validated, retrying semantic extractor.
pub struct SemanticExtractor {
    model: Arc<dyn LanguageModel>,
    taxonomy: Taxonomy,
    config: ExtractorConfig,
}

impl SemanticExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, taxonomy: Taxonomy, config: ExtractorConfig) -> Self {
        Self {
            model,
            taxonomy,
            config,
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Configured units-per-call batch size.
    pub fn batch_size(&self) -> usize {
        self.config.batch_size.max(1)
    }

    /// Extract semantics for every unit, batch by batch.
    ///
    /// Always returns one element per input unit, in input order. A batch
    /// that keeps failing transiently (or fails fatally) is skipped: its
    /// units come back `degraded` with no entities, and the run continues.
    pub async fn extract_units(&self, units: &[UnitText]) -> Vec<UnitSemantics> {
        let mut results = Vec::with_capacity(units.len());
        for batch in units.chunks(self.config.batch_size.max(1)) {
            match self.call_with_retry(batch).await {
                Some(raw) => {
                    for extraction in raw {
                        results.push(self.validate(extraction));
                    }
                }
                None => {
                    for unit in batch {
                        results.push(UnitSemantics {
                            id: unit.id.clone(),
                            degraded: true,
                            ..UnitSemantics::default()
                        });
                    }
                }
            }
        }
        results
    }

    async fn call_with_retry(&self, batch: &[UnitText]) -> Option<Vec<RawUnitExtraction>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.model.extract(batch, &self.taxonomy).await {
                Ok(raw) => {
                    debug!(units = batch.len(), attempt, "semantic batch extracted");
                    return Some(raw);
                }
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.base_delay * 2u32.pow(attempt - 1);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient extraction failure, backing off: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(
                        units = batch.len(),
                        "skipping semantic batch after {attempt} attempt(s): {e}"
                    );
                    return None;
                }
            }
        }
    }

    /// Enforce the taxonomy contract on one unit's raw extraction.
    ///
    /// Entities with unknown types are dropped; relations are dropped when
    /// their type is unknown or either endpoint did not survive as an
    /// entity. Surviving type names are canonicalized to catalog spelling.
    fn validate(&self, raw: RawUnitExtraction) -> UnitSemantics {
        let mut semantics = UnitSemantics {
            id: raw.id,
            ..UnitSemantics::default()
        };

        for entity in raw.entities {
            match self.taxonomy.canonical_entity_type(&entity.entity_type) {
                Some(canonical) => semantics.entities.push(SemanticEntity {
                    name: entity.name.trim().to_string(),
                    entity_type: canonical.to_string(),
                    confidence: entity.confidence.clamp(0.0, 1.0),
                    aliases: entity.aliases,
                }),
                None => {
                    warn!(
                        unit = %semantics.id,
                        entity_type = %entity.entity_type,
                        "dropping entity with type outside the taxonomy"
                    );
                    semantics.dropped_entries += 1;
                }
            }
        }

        let entity_names: Vec<String> = semantics
            .entities
            .iter()
            .map(|e| e.name.to_lowercase())
            .collect();
        let known = |name: &str| entity_names.contains(&name.trim().to_lowercase());
        for relation in raw.relations {
            match self.taxonomy.canonical_relation(&relation.relation) {
                Some(canonical) if known(&relation.source) && known(&relation.target) => {
                    semantics.relations.push(SemanticRelation {
                        source: relation.source.trim().to_string(),
                        target: relation.target.trim().to_string(),
                        relation: canonical.to_string(),
                        confidence: relation.confidence.clamp(0.0, 1.0),
                    });
                }
                Some(_) => {
                    warn!(
                        unit = %semantics.id,
                        "dropping relation whose endpoints were not extracted"
                    );
                    semantics.dropped_entries += 1;
                }
                None => {
                    warn!(
                        unit = %semantics.id,
                        relation = %relation.relation,
                        "dropping relation with type outside the taxonomy"
                    );
                    semantics.dropped_entries += 1;
                }
            }
        }

        semantics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLanguageModel;
    use crate::provider::{RawEntity, RawRelation};

    fn unit(id: &str) -> UnitText {
        UnitText {
            id: id.into(),
            title: id.into(),
            text: format!("text of {id}"),
        }
    }

    fn fixture(id: &str, entities: Vec<RawEntity>, relations: Vec<RawRelation>) -> RawUnitExtraction {
        RawUnitExtraction {
            id: id.into(),
            entities,
            relations,
        }
    }

    fn entity(name: &str, entity_type: &str) -> RawEntity {
        RawEntity {
            name: name.into(),
            entity_type: entity_type.into(),
            confidence: 0.9,
            aliases: vec![],
        }
    }

    fn fast_config(batch_size: usize) -> ExtractorConfig {
        ExtractorConfig {
            batch_size,
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn invalid_taxonomy_entries_are_dropped_not_propagated() {
        let model = MockLanguageModel::new().with_fixture(fixture(
            "a",
            vec![entity("Ada", "Person"), entity("Widget", "Gadget")],
            vec![
                RawRelation {
                    source: "Ada".into(),
                    target: "Widget".into(),
                    relation: "RELATED_TO".into(),
                    confidence: 0.8,
                },
                RawRelation {
                    source: "Ada".into(),
                    target: "Ada".into(),
                    relation: "TELEPORTS_TO".into(),
                    confidence: 0.8,
                },
            ],
        ));
        let extractor =
            SemanticExtractor::new(Arc::new(model), Taxonomy::standard(), fast_config(5));

        let results = extractor.extract_units(&[unit("a")]).await;
        let semantics = &results[0];

        // "Gadget" is not in the taxonomy; the relation pointing at it and
        // the unknown relation type both drop too.
        assert_eq!(semantics.entities.len(), 1);
        assert_eq!(semantics.entities[0].entity_type, "Person");
        assert!(semantics.relations.is_empty());
        assert_eq!(semantics.dropped_entries, 3);
        assert!(!semantics.degraded);
    }

    #[tokio::test]
    async fn type_spelling_is_canonicalized() {
        let model = MockLanguageModel::new().with_fixture(fixture(
            "a",
            vec![entity("Rust", "programminglanguage")],
            vec![],
        ));
        let extractor =
            SemanticExtractor::new(Arc::new(model), Taxonomy::standard(), fast_config(5));

        let results = extractor.extract_units(&[unit("a")]).await;
        assert_eq!(results[0].entities[0].entity_type, "ProgrammingLanguage");
    }

    #[tokio::test]
    async fn batch_boundaries_do_not_change_results() {
        let fixtures = || {
            MockLanguageModel::new()
                .with_fixture(fixture("a", vec![entity("Ada", "Person")], vec![]))
                .with_fixture(fixture("b", vec![entity("Paris", "City")], vec![]))
                .with_fixture(fixture("c", vec![entity("Logic", "Concept")], vec![]))
        };
        let units = vec![unit("a"), unit("b"), unit("c")];

        let one_batch =
            SemanticExtractor::new(Arc::new(fixtures()), Taxonomy::standard(), fast_config(3));
        let per_unit =
            SemanticExtractor::new(Arc::new(fixtures()), Taxonomy::standard(), fast_config(1));

        assert_eq!(
            one_batch.extract_units(&units).await,
            per_unit.extract_units(&units).await
        );
    }

    #[tokio::test]
    async fn transient_failures_retry_and_recover() {
        let model = MockLanguageModel::new()
            .failing_first(2)
            .with_fixture(fixture("a", vec![entity("Ada", "Person")], vec![]));
        let extractor =
            SemanticExtractor::new(Arc::new(model), Taxonomy::standard(), fast_config(5));

        let results = extractor.extract_units(&[unit("a")]).await;
        assert!(!results[0].degraded);
        assert_eq!(results[0].entities.len(), 1);
    }

    #[tokio::test]
    async fn persistent_failure_skips_batch_and_continues() {
        // More failures than attempts: the first batch dies, the second runs.
        let model = MockLanguageModel::new()
            .failing_first(3)
            .with_fixture(fixture("b", vec![entity("Paris", "City")], vec![]));
        let extractor =
            SemanticExtractor::new(Arc::new(model), Taxonomy::standard(), fast_config(1));

        let results = extractor.extract_units(&[unit("a"), unit("b")]).await;
        assert!(results[0].degraded);
        assert!(results[0].entities.is_empty());
        assert!(!results[1].degraded);
        assert_eq!(results[1].entities.len(), 1);
    }
}

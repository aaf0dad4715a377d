//! Shared command context.
//!
//! One explicit object owns the store session, the optional language-model
//! capabilities, and the resolved configuration; every command receives it
//! instead of reaching for ambient state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use trellis_llm::{
    EmbeddingProvider, HttpLanguageModel, LanguageModel, MockEmbeddingProvider, MockLanguageModel,
    SemanticExtractor,
};
use trellis_pipeline::{IndexPipeline, PipelineConfig, ScanConfig};
use trellis_surrealdb::{
    apply_schema, GraphStore, HybridConfig, HybridQueryEngine, SurrealClient,
};
use trellis_core::Taxonomy;

use crate::config::{AppConfig, LlmProvider};

/// Connected application context.
pub struct AppContext {
    pub config: AppConfig,
    pub store: GraphStore,
    pub model: Option<Arc<dyn LanguageModel>>,
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl AppContext {
    /// Connect to the store (fatal on failure) and wire the configured
    /// language-model provider.
    pub async fn connect(config: AppConfig) -> Result<Self> {
        let client = SurrealClient::connect(config.store.clone())
            .await
            .context("could not connect to the graph store")?;
        apply_schema(&client).await?;
        let store = GraphStore::new(client);

        let (model, embedder): (
            Option<Arc<dyn LanguageModel>>,
            Option<Arc<dyn EmbeddingProvider>>,
        ) = match config.llm_provider {
            LlmProvider::None => (None, None),
            LlmProvider::Openai => {
                let provider = Arc::new(HttpLanguageModel::new(config.llm_http.clone())?);
                (Some(provider.clone()), Some(provider))
            }
            LlmProvider::Mock => (
                Some(Arc::new(MockLanguageModel::new())),
                Some(Arc::new(MockEmbeddingProvider::default())),
            ),
        };

        Ok(Self {
            config,
            store,
            model,
            embedder,
        })
    }

    /// The batched semantic extractor, when a model is configured.
    pub fn semantic_extractor(&self) -> Option<Arc<SemanticExtractor>> {
        self.model.as_ref().map(|model| {
            Arc::new(SemanticExtractor::new(
                model.clone(),
                Taxonomy::standard(),
                self.config.extractor.clone(),
            ))
        })
    }

    /// Build an index pipeline for one corpus root.
    pub fn pipeline(
        &self,
        root: &Path,
        recursive: bool,
        semantic: bool,
    ) -> Result<IndexPipeline> {
        let mut scan = ScanConfig {
            recursive,
            max_file_size: self.config.max_file_size,
            ..ScanConfig::default()
        };
        if let Some(extensions) = &self.config.extensions {
            scan.extensions = extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect();
        }

        let mut pipeline_config = PipelineConfig {
            scan,
            ..PipelineConfig::default()
        };
        if let Some(parallelism) = self.config.parallelism {
            pipeline_config.parallelism = parallelism.max(1);
        }

        let mut pipeline = IndexPipeline::new(root, self.store.clone(), pipeline_config)?;
        if semantic {
            if let Some(extractor) = self.semantic_extractor() {
                pipeline = pipeline.with_semantic(extractor);
            }
        }
        if let Some(embedder) = &self.embedder {
            pipeline = pipeline.with_embedder(embedder.clone());
        }
        Ok(pipeline)
    }

    /// The hybrid engine over the connected store.
    pub fn engine(&self) -> HybridQueryEngine {
        let mut engine = HybridQueryEngine::new(
            self.store.clone(),
            HybridConfig {
                channel_k: self.config.channel_k,
                context_window: self.config.context_window,
                ..HybridConfig::default()
            },
        );
        if let Some(embedder) = &self.embedder {
            engine = engine.with_embedder(embedder.clone());
        }
        if let Some(model) = &self.model {
            engine = engine.with_model(model.clone());
        }
        engine
    }

    /// Resolve the corpus a read command operates on: the explicit flag, or
    /// the only corpus the store knows about.
    pub async fn resolve_corpus(&self, flag: Option<&PathBuf>) -> Result<String> {
        if let Some(path) = flag {
            let canonical = path
                .canonicalize()
                .with_context(|| format!("corpus root {} not found", path.display()))?;
            return Ok(canonical.to_string_lossy().to_string());
        }

        #[derive(Deserialize)]
        struct CorpusRow {
            corpus: String,
        }
        let rows: Vec<CorpusRow> = self
            .store
            .client()
            .select("SELECT corpus FROM unit GROUP BY corpus", Vec::new())
            .await?;

        match rows.len() {
            0 => bail!("nothing indexed yet — run `trellis index <path>` first"),
            1 => Ok(rows.into_iter().next().expect("one row").corpus),
            _ => {
                let known: Vec<String> = rows.into_iter().map(|r| r.corpus).collect();
                bail!(
                    "multiple corpora indexed; pass --path to pick one of: {}",
                    known.join(", ")
                )
            }
        }
    }
}

//! Index-run orchestration.
//!
//! Phases of a full run:
//!
//! 1. **Scan** the corpus root under the configured policy.
//! 2. **Load** candidates with bounded parallelism, sniffing encodings.
//! 3. **Structural**: parse every unit and persist nodes-then-edges.
//! 4. **Semantic**: batched language-model extraction, applied batch by
//!    batch so cancellation leaves exactly the merged batches behind.
//! 5. **Embeddings**: backfill vectors for units that lack one.
//!
//! The same pipeline object also implements [`UnitProcessor`], so the
//! watcher re-runs phases 3–5 for a single changed unit and patches the
//! graph with an edge diff instead of rebuilding.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use trellis_core::{content_hash, SourceUnit, UnitProfile};
use trellis_llm::{EmbeddingProvider, SemanticExtractor, UnitText};
use trellis_parser::{note, StructuralExtractor, StructuralOutput, TitleIndex};
use trellis_surrealdb::{ensure_vector_index, GraphStore};
use trellis_watch::{UnitProcessor, WatchError, WatchResult};

use crate::scanner::{self, decode, ScanConfig, ScannedFile};
use crate::{PipelineError, PipelineResult};

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub scan: ScanConfig,
    /// Bounded parallelism for loading and structural extraction.
    pub parallelism: usize,
    /// Texts per embedding call.
    pub embed_batch: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            parallelism: num_cpus::get().clamp(1, 8),
            embed_batch: 16,
        }
    }
}

/// End-of-run accounting, printed by the CLI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub scanned: usize,
    pub indexed: usize,
    pub skipped_oversize: usize,
    pub skipped_binary: usize,
    pub skipped_unreadable: usize,
    /// Units that kept only structural results after their model batch
    /// failed persistently.
    pub degraded_units: usize,
    /// Model entries dropped by taxonomy validation.
    pub dropped_entries: usize,
    /// Structural parse degradations (e.g. malformed metadata blocks).
    pub parse_warnings: usize,
    pub embedded: usize,
    pub cancelled: bool,
}

/// A candidate read and decoded into memory.
#[derive(Debug, Clone)]
struct LoadedUnit {
    file: ScannedFile,
    content: String,
    encoding: &'static str,
    title: String,
}

enum LoadResult {
    Loaded(Box<LoadedUnit>),
    Binary,
    Unreadable,
}

/// The extraction-and-indexing pipeline for one corpus root.
pub struct IndexPipeline {
    root: PathBuf,
    corpus: String,
    store: GraphStore,
    parser: StructuralExtractor,
    semantic: Option<Arc<SemanticExtractor>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    config: PipelineConfig,
    cancel: Arc<AtomicBool>,
    vector_index_ready: AtomicBool,
}

impl IndexPipeline {
    /// Create a pipeline rooted at `root` (must be an existing directory).
    pub fn new(root: &Path, store: GraphStore, config: PipelineConfig) -> PipelineResult<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| PipelineError::InvalidRoot(format!("{}: {e}", root.display())))?;
        if !root.is_dir() {
            return Err(PipelineError::InvalidRoot(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let corpus = root.to_string_lossy().to_string();

        Ok(Self {
            root,
            corpus,
            store,
            parser: StructuralExtractor::new(),
            semantic: None,
            embedder: None,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            vector_index_ready: AtomicBool::new(false),
        })
    }

    /// Enable the semantic extraction phase.
    pub fn with_semantic(mut self, extractor: Arc<SemanticExtractor>) -> Self {
        self.semantic = Some(extractor);
        self
    }

    /// Enable the embedding backfill phase.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Canonicalized corpus identity.
    pub fn corpus(&self) -> &str {
        &self.corpus
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Flag checked between units and between batches; set it to stop the
    /// run after the currently merging batch.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Run the full pipeline over the corpus.
    pub async fn index_corpus(&self) -> PipelineResult<RunSummary> {
        info!(corpus = %self.corpus, "index run starting");
        let scan_outcome = scanner::scan(&self.root, &self.config.scan);

        let mut summary = RunSummary {
            scanned: scan_outcome.files.len(),
            skipped_oversize: scan_outcome.skipped_oversize,
            skipped_unreadable: scan_outcome.skipped_unreadable,
            ..RunSummary::default()
        };

        // Phase 2: load and decode with bounded parallelism.
        let mut loaded = Vec::new();
        let load_results: Vec<LoadResult> = stream::iter(scan_outcome.files)
            .map(load_unit)
            .buffer_unordered(self.config.parallelism)
            .collect()
            .await;
        for result in load_results {
            match result {
                LoadResult::Loaded(unit) => loaded.push(*unit),
                LoadResult::Binary => summary.skipped_binary += 1,
                LoadResult::Unreadable => summary.skipped_unreadable += 1,
            }
        }
        // Parallel loading scrambles order; restore it for determinism.
        loaded.sort_by(|a, b| a.file.path.cmp(&b.file.path));

        // Every title is known before any link resolves, so resolution does
        // not depend on processing order.
        let mut titles = TitleIndex::new();
        for unit in &loaded {
            titles.insert(&unit.title);
            if let Some(stem) = unit.file.path.file_stem() {
                titles.insert(&stem.to_string_lossy());
            }
        }
        let titles = Arc::new(titles);

        // Phase 3: structural extraction and persistence.
        let mut sources = Vec::new();
        let structural_results: Vec<PipelineResult<Option<(SourceUnit, usize)>>> =
            stream::iter(loaded.iter())
                .map(|unit| {
                    let titles = Arc::clone(&titles);
                    async move {
                        if self.cancelled() {
                            return Ok(None);
                        }
                        let (source, output) = self.extract_structural(unit, &titles);
                        self.persist_structural(&source, &output).await?;
                        Ok(Some((source, output.warnings.len())))
                    }
                })
                .buffer_unordered(self.config.parallelism)
                .collect()
                .await;
        for result in structural_results {
            match result? {
                Some((source, warnings)) => {
                    summary.indexed += 1;
                    summary.parse_warnings += warnings;
                    sources.push(source);
                }
                None => summary.cancelled = true,
            }
        }
        sources.sort_by(|a, b| a.path.cmp(&b.path));

        // Phase 4: semantic extraction, batch by batch.
        if let Some(extractor) = &self.semantic {
            let by_path: HashMap<&str, &SourceUnit> =
                sources.iter().map(|s| (s.path.as_str(), s)).collect();
            let content_by_path: HashMap<String, &str> = loaded
                .iter()
                .map(|u| {
                    (
                        u.file.path.to_string_lossy().to_string(),
                        u.content.as_str(),
                    )
                })
                .collect();

            let texts: Vec<UnitText> = sources
                .iter()
                .map(|source| UnitText {
                    id: source.path.clone(),
                    title: source.title.clone(),
                    text: content_by_path
                        .get(source.path.as_str())
                        .map(|c| (*c).to_string())
                        .unwrap_or_default(),
                })
                .collect();

            for batch in texts.chunks(extractor.batch_size()) {
                if self.cancelled() {
                    summary.cancelled = true;
                    break;
                }
                for semantics in extractor.extract_units(batch).await {
                    summary.dropped_entries += semantics.dropped_entries;
                    if semantics.degraded {
                        summary.degraded_units += 1;
                        continue;
                    }
                    if let Some(source) = by_path.get(semantics.id.as_str()) {
                        self.store
                            .apply_semantics(source, &semantics.entities, &semantics.relations)
                            .await?;
                    }
                }
            }
        }

        // Phase 5: embedding backfill.
        summary.embedded = self.backfill_embeddings().await?;

        info!(
            indexed = summary.indexed,
            degraded = summary.degraded_units,
            embedded = summary.embedded,
            cancelled = summary.cancelled,
            "index run finished"
        );
        Ok(summary)
    }

    fn extract_structural(
        &self,
        unit: &LoadedUnit,
        titles: &TitleIndex,
    ) -> (SourceUnit, StructuralOutput) {
        let path = &unit.file.path;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        let output = self.parser.extract(&extension, &unit.content, titles);

        for warning in &output.warnings {
            warn!(unit = %path.display(), "{warning}");
        }

        let source = SourceUnit {
            path: path.to_string_lossy().to_string(),
            title: output.title.clone().unwrap_or_else(|| unit.title.clone()),
            content: unit.content.clone(),
            size: unit.file.size,
            modified: DateTime::<Utc>::from(unit.file.modified),
            hash: content_hash(unit.content.as_bytes()),
            encoding: unit.encoding.to_string(),
            extension,
            corpus: self.corpus.clone(),
            aliases: output.aliases.clone(),
            embedding: None,
        };
        (source, output)
    }

    async fn persist_structural(
        &self,
        source: &SourceUnit,
        output: &StructuralOutput,
    ) -> PipelineResult<()> {
        self.store.upsert_unit(source).await?;
        self.store.upsert_containers(source).await?;
        self.store.apply_structural(source, &output.bundle).await?;
        debug!(unit = %source.path, entities = output.bundle.entities.len(), "unit persisted");
        Ok(())
    }

    async fn backfill_embeddings(&self) -> PipelineResult<usize> {
        let Some(embedder) = &self.embedder else {
            return Ok(0);
        };

        if !self.vector_index_ready.swap(true, Ordering::SeqCst) {
            ensure_vector_index(self.store.client(), embedder.dimensions()).await?;
        }

        let pending = self.store.units_missing_embedding(&self.corpus).await?;
        let mut embedded = 0;
        for chunk in pending.chunks(self.config.embed_batch.max(1)) {
            if self.cancelled() {
                break;
            }
            let texts: Vec<String> = chunk.iter().map(|(_, content)| content.clone()).collect();
            match embedder.embed(&texts).await {
                Ok(vectors) => {
                    for ((path, _), vector) in chunk.iter().zip(vectors) {
                        self.store.set_embedding(path, &vector).await?;
                        embedded += 1;
                    }
                }
                Err(e) => {
                    // Embeddings are an enhancement; full-text search still
                    // covers unembedded units.
                    warn!("embedding batch failed, continuing without: {e}");
                }
            }
        }
        Ok(embedded)
    }

    /// Whether a path is inside this pipeline's corpus and passes policy.
    fn governs(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
            && self.config.scan.accepts(path)
            && !self.config.scan.crosses_skip_dir(path)
    }
}

async fn load_unit(file: ScannedFile) -> LoadResult {
    let bytes = match tokio::fs::read(&file.path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %file.path.display(), "unreadable unit, skipping: {e}");
            return LoadResult::Unreadable;
        }
    };
    let Some((content, encoding)) = decode(&bytes) else {
        debug!(path = %file.path.display(), "binary content, skipping");
        return LoadResult::Binary;
    };

    let stem = file
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = file
        .path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let title = match UnitProfile::for_extension(&extension) {
        UnitProfile::Note => note::peek_title(&content).unwrap_or(stem),
        UnitProfile::Code => stem,
    };

    LoadResult::Loaded(Box::new(LoadedUnit {
        file,
        content,
        encoding,
        title,
    }))
}

#[async_trait]
impl UnitProcessor for IndexPipeline {
    async fn process_change(&self, path: &Path) -> WatchResult<()> {
        if !self.governs(path) {
            debug!(path = %path.display(), "change outside policy, ignoring");
            return Ok(());
        }
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            // Gone again already, or a directory event: nothing to do.
            _ => return Ok(()),
        };
        if metadata.len() > self.config.scan.max_file_size {
            debug!(path = %path.display(), "changed unit exceeds size cap, ignoring");
            return Ok(());
        }

        let file = ScannedFile {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        };
        let loaded = match load_unit(file).await {
            LoadResult::Loaded(unit) => *unit,
            LoadResult::Binary | LoadResult::Unreadable => return Ok(()),
        };

        let store_err = |e: trellis_surrealdb::StoreError| WatchError::Processor {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        // Unchanged content means the graph is already consistent, as long
        // as the embedding (when one is expected) has been computed.
        let hash = content_hash(loaded.content.as_bytes());
        if let Some(existing) = self
            .store
            .get_unit(&loaded.file.path.to_string_lossy())
            .await
            .map_err(store_err)?
        {
            let embedded = self.embedder.is_none() || existing.embedding.is_some();
            if existing.hash == hash && embedded {
                debug!(path = %path.display(), "content unchanged, skipping");
                return Ok(());
            }
        }

        let mut titles: TitleIndex = self
            .store
            .titles(&self.corpus)
            .await
            .map_err(store_err)?
            .into_iter()
            .collect();
        titles.insert(&loaded.title);

        let (source, output) = self.extract_structural(&loaded, &titles);

        let (entities, relations) = match &self.semantic {
            Some(extractor) => {
                let text = UnitText {
                    id: source.path.clone(),
                    title: source.title.clone(),
                    text: loaded.content.clone(),
                };
                let mut results = extractor.extract_units(std::slice::from_ref(&text)).await;
                let semantics = results.pop().unwrap_or_default();
                (semantics.entities, semantics.relations)
            }
            None => (Vec::new(), Vec::new()),
        };

        self.store
            .sync_unit(&source, &output.bundle, &entities, &relations)
            .await
            .map_err(store_err)?;

        if let Some(embedder) = &self.embedder {
            if let Ok(mut vectors) = embedder.embed(&[source.content.clone()]).await {
                if !vectors.is_empty() {
                    self.store
                        .set_embedding(&source.path, &vectors.remove(0))
                        .await
                        .map_err(store_err)?;
                }
            }
        }

        Ok(())
    }

    async fn process_removal(&self, path: &Path) -> WatchResult<()> {
        if !path.starts_with(&self.root) {
            return Ok(());
        }
        self.store
            .delete_unit(&path.to_string_lossy())
            .await
            .map_err(|e| WatchError::Processor {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }
}

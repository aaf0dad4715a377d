//! Per-path debounced state machine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::{ChangeEvent, ChangeKind, WatchResult};

/// Re-extraction hooks the synchronizer drives.
///
/// The pipeline implements this; tests use lightweight recorders. Either
/// method failing marks the event as failed but never stops the
/// synchronizer — the next change for the path retries naturally.
#[async_trait]
pub trait UnitProcessor: Send + Sync {
    /// Re-run extraction for one created or modified unit and patch the
    /// graph with the add/remove edge delta.
    async fn process_change(&self, path: &Path) -> WatchResult<()>;

    /// Remove a deleted unit from the graph.
    async fn process_removal(&self, path: &Path) -> WatchResult<()>;
}

/// Synchronizer tuning.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Per-path quiet window before extraction starts.
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
        }
    }
}

/// Observable state of one watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathState {
    #[default]
    Idle,
    /// An event arrived; the debounce window is open.
    Pending,
    /// Extraction is running for the latest event.
    Extracting,
}

#[derive(Default)]
struct PathEntry {
    /// Bumped on every event; a worker only acts while it still holds the
    /// latest generation, so superseded work applies nothing.
    generation: u64,
    state: PathState,
    latest: Option<ChangeKind>,
    /// Serializes extraction per path.
    gate: Arc<Mutex<()>>,
}

/// The incremental synchronizer.
///
/// Cheap to clone; clones share the same path table.
#[derive(Clone)]
pub struct Synchronizer {
    processor: Arc<dyn UnitProcessor>,
    config: SyncConfig,
    paths: Arc<Mutex<HashMap<PathBuf, PathEntry>>>,
    in_flight: Arc<AtomicUsize>,
}

impl Synchronizer {
    pub fn new(processor: Arc<dyn UnitProcessor>, config: SyncConfig) -> Self {
        Self {
            processor,
            config,
            paths: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Consume events until the channel closes.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<ChangeEvent>) {
        while let Some(event) = events.recv().await {
            self.accept(event).await;
        }
        debug!("event channel closed, synchronizer stopping");
    }

    /// Register one event and schedule its debounced worker.
    pub async fn accept(&self, event: ChangeEvent) {
        let generation = {
            let mut paths = self.paths.lock().await;
            let entry = paths.entry(event.path.clone()).or_default();
            entry.generation += 1;
            entry.state = PathState::Pending;
            entry.latest = Some(event.kind);
            entry.generation
        };

        debug!(path = %event.path.display(), generation, ?event.kind, "event accepted");
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let sync = self.clone();
        let path = event.path;
        tokio::spawn(async move {
            sync.worker(path, generation).await;
            sync.in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    async fn worker(&self, path: PathBuf, generation: u64) {
        tokio::time::sleep(self.config.debounce).await;

        // Superseded during the debounce window: the newer worker owns the
        // path now, this one applies nothing.
        let gate = {
            let paths = self.paths.lock().await;
            match paths.get(&path) {
                Some(entry) if entry.generation == generation => entry.gate.clone(),
                _ => {
                    debug!(path = %path.display(), generation, "superseded while pending");
                    return;
                }
            }
        };

        // One extraction per path at a time; distinct paths run in parallel.
        let _serialized = gate.lock().await;

        // Re-check after waiting for a previous extraction to finish.
        let kind = {
            let mut paths = self.paths.lock().await;
            match paths.get_mut(&path) {
                Some(entry) if entry.generation == generation => {
                    entry.state = PathState::Extracting;
                    entry.latest
                }
                _ => {
                    debug!(path = %path.display(), generation, "superseded while waiting");
                    return;
                }
            }
        };

        let result = match kind {
            Some(ChangeKind::Removed) => self.processor.process_removal(&path).await,
            Some(ChangeKind::Created) | Some(ChangeKind::Modified) => {
                self.processor.process_change(&path).await
            }
            None => Ok(()),
        };
        if let Err(e) = result {
            warn!(path = %path.display(), "synchronization failed: {e}");
        }

        let mut paths = self.paths.lock().await;
        if let Some(entry) = paths.get_mut(&path) {
            if entry.generation == generation {
                entry.state = PathState::Idle;
            }
        }
    }

    /// Current state of a path, for observability and tests.
    pub async fn state_of(&self, path: &Path) -> PathState {
        let paths = self.paths.lock().await;
        paths.get(path).map(|e| e.state).unwrap_or_default()
    }

    /// Wait until every scheduled worker has finished.
    pub async fn quiesce(&self) {
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Records the calls that actually reached the processor.
    #[derive(Default)]
    struct Recorder {
        changes: StdMutex<Vec<PathBuf>>,
        removals: StdMutex<Vec<PathBuf>>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl UnitProcessor for Recorder {
        async fn process_change(&self, path: &Path) -> WatchResult<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.changes.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        async fn process_removal(&self, path: &Path) -> WatchResult<()> {
            self.removals.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    fn fast_sync(recorder: Arc<Recorder>) -> Synchronizer {
        Synchronizer::new(
            recorder,
            SyncConfig {
                debounce: Duration::from_millis(20),
            },
        )
    }

    #[tokio::test]
    async fn burst_of_events_collapses_to_one_extraction() {
        let recorder = Arc::new(Recorder::default());
        let sync = fast_sync(recorder.clone());

        for _ in 0..5 {
            sync.accept(ChangeEvent::modified("/v/a.md")).await;
        }
        sync.quiesce().await;

        assert_eq!(recorder.changes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn last_event_kind_wins() {
        let recorder = Arc::new(Recorder::default());
        let sync = fast_sync(recorder.clone());

        sync.accept(ChangeEvent::modified("/v/a.md")).await;
        sync.accept(ChangeEvent::removed("/v/a.md")).await;
        sync.quiesce().await;

        assert!(recorder.changes.lock().unwrap().is_empty());
        assert_eq!(recorder.removals.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn distinct_paths_are_processed_independently() {
        let recorder = Arc::new(Recorder::default());
        let sync = fast_sync(recorder.clone());

        sync.accept(ChangeEvent::modified("/v/a.md")).await;
        sync.accept(ChangeEvent::modified("/v/b.md")).await;
        sync.accept(ChangeEvent::modified("/v/c.md")).await;
        sync.quiesce().await;

        let mut changes = recorder.changes.lock().unwrap().clone();
        changes.sort();
        assert_eq!(
            changes,
            vec![
                PathBuf::from("/v/a.md"),
                PathBuf::from("/v/b.md"),
                PathBuf::from("/v/c.md"),
            ]
        );
    }

    #[tokio::test]
    async fn event_during_extraction_triggers_a_second_pass() {
        let recorder = Arc::new(Recorder {
            delay: Some(Duration::from_millis(60)),
            ..Recorder::default()
        });
        let sync = fast_sync(recorder.clone());

        sync.accept(ChangeEvent::modified("/v/a.md")).await;
        // Let the first worker enter extraction, then supersede mid-flight.
        tokio::time::sleep(Duration::from_millis(40)).await;
        sync.accept(ChangeEvent::modified("/v/a.md")).await;
        sync.quiesce().await;

        // Both extractions ran, serialized: the second saw the newer content.
        assert_eq!(recorder.changes.lock().unwrap().len(), 2);
        assert_eq!(sync.state_of(Path::new("/v/a.md")).await, PathState::Idle);
    }

    #[tokio::test]
    async fn channel_driven_run_consumes_until_close() {
        let recorder = Arc::new(Recorder::default());
        let sync = fast_sync(recorder.clone());
        let (tx, rx) = mpsc::unbounded_channel();

        let runner = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.run(rx).await })
        };

        tx.send(ChangeEvent::created("/v/new.md")).unwrap();
        drop(tx);
        runner.await.unwrap();
        sync.quiesce().await;

        assert_eq!(recorder.changes.lock().unwrap().len(), 1);
    }
}

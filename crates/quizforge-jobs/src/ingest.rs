//! Ingestion watcher: turns file-creation events in the uploads directory
//! into document extraction runs.
//!
//! Each event for `<uploads>/<name>.pdf` claims the `uploaded` document stored
//! under that exact path, fetches it into a scratch directory, extracts it
//! with the extractor for its declared type, and finalizes the status as
//! `processed` or `error`. Events are handled one at a time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use quizforge_core::defaults::{
    DOCUMENT_EXTENSION, EVENT_BUS_CAPACITY, SCRATCH_PREFIX, UPLOADS_DIR, WATCH_CHANNEL_CAPACITY,
};
use quizforge_core::{
    Document, DocumentStatus, Error, ErrorKind, ExtractionOutput, FileFetcher, JobStore,
    ProcessingStats, Result,
};

use crate::extraction::ExtractorSet;
use crate::worker::{WorkerEvent, WorkerHandle, WorkerKind};

/// Configuration for the ingestion watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory watched (non-recursively) for new PDFs.
    pub uploads_dir: PathBuf,
    /// Buffered filesystem events between the notifier thread and the worker task.
    pub channel_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from(UPLOADS_DIR),
            channel_capacity: WATCH_CHANNEL_CAPACITY,
        }
    }
}

impl WatcherConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `UPLOADS_DIR` | `uploads/pdfs` | Watched directory; stored paths are `<UPLOADS_DIR>/<file name>` |
    pub fn from_env() -> Self {
        let uploads_dir = std::env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(UPLOADS_DIR));
        Self {
            uploads_dir,
            ..Self::default()
        }
    }

    pub fn with_uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.uploads_dir = dir.into();
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

// =============================================================================
// IN-FLIGHT SET
// =============================================================================

/// Paths currently being handled by one watcher.
#[derive(Clone, Default)]
pub struct InFlightSet {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        // The set holds plain paths; a panic mid-insert cannot corrupt it.
        self.paths.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark `path` as in flight. Returns `None` if it already is.
    pub fn try_acquire(&self, path: &Path) -> Option<InFlightGuard> {
        if self.lock().insert(path.to_path_buf()) {
            Some(InFlightGuard {
                set: self.clone(),
                path: path.to_path_buf(),
            })
        } else {
            None
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its path from the [`InFlightSet`] when dropped.
pub struct InFlightGuard {
    set: InFlightSet,
    path: PathBuf,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.path);
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Result of handling one creation event.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Not a PDF path.
    Ignored,
    /// The same path is already being handled by this watcher.
    AlreadyInFlight,
    /// No `uploaded` document is stored under the path.
    NotPending,
    /// The claim query itself failed; nothing was changed.
    ClaimFailed { error: Error },
    /// Document reached `processed`.
    Processed { document_id: String },
    /// Document reached `error`.
    Failed { document_id: String, error: Error },
    /// The final status write failed; the document remains `processing`.
    Unfinalized { document_id: String, error: Error },
}

/// Claims, fetches, extracts and finalizes documents.
pub struct IngestionPipeline {
    store: Arc<dyn JobStore>,
    fetcher: Arc<dyn FileFetcher>,
    extractors: ExtractorSet,
    in_flight: InFlightSet,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        fetcher: Arc<dyn FileFetcher>,
        extractors: ExtractorSet,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            store,
            fetcher,
            extractors,
            in_flight: InFlightSet::new(),
            event_tx,
        }
    }

    /// Get a receiver for pipeline events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Paths currently being handled.
    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    fn emit(&self, event: WorkerEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Handle a file-creation event for `path`.
    ///
    /// `path` must be spelled the way the document's `file_path` is stored.
    pub async fn handle_created(&self, path: &Path) -> IngestOutcome {
        if !is_document_path(path) {
            debug!(subsystem = "ingest", component = "watcher", path = %path.display(), "Ignoring non-PDF path");
            return IngestOutcome::Ignored;
        }
        let Some(key) = path.to_str() else {
            warn!(subsystem = "ingest", component = "watcher", path = %path.display(), "Ignoring non UTF-8 path");
            return IngestOutcome::Ignored;
        };

        let Some(_guard) = self.in_flight.try_acquire(path) else {
            debug!(subsystem = "ingest", component = "watcher", path = key, "Path already in flight");
            return IngestOutcome::AlreadyInFlight;
        };

        let document = match self.store.claim_pending_by_path(key).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                info!(
                    subsystem = "ingest",
                    component = "watcher",
                    op = "claim",
                    path = key,
                    "No pending document for path"
                );
                return IngestOutcome::NotPending;
            }
            Err(e) => {
                error!(
                    subsystem = "ingest",
                    component = "watcher",
                    op = "claim",
                    path = key,
                    error = %e,
                    error_kind = %e.kind(),
                    "Failed to claim document"
                );
                return IngestOutcome::ClaimFailed { error: e };
            }
        };

        info!(
            subsystem = "ingest",
            component = "watcher",
            op = "claim",
            document_id = %document.id,
            path = key,
            pdf_type = %document.pdf_type,
            "Claimed document"
        );
        self.emit(WorkerEvent::DocumentClaimed {
            document_id: document.id.clone(),
            path: key.to_string(),
        });

        let start = Instant::now();
        let result = self.process(&document).await;
        self.finalize(&document, result, start.elapsed()).await
    }

    /// Fetch into a scratch directory and extract. The scratch directory is
    /// removed when this returns.
    async fn process(&self, document: &Document) -> Result<ExtractionOutput> {
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()?;
        let local = scratch.path().join(format!("{}.{}", document.id, DOCUMENT_EXTENSION));

        self.fetcher.fetch(&document.file_path, &local).await?;
        debug!(
            subsystem = "ingest",
            op = "fetch",
            document_id = %document.id,
            fetcher = self.fetcher.name(),
            "Fetched document"
        );

        let pdf_type = document.declared_type()?;
        self.extractors.extract(&local, pdf_type).await
    }

    /// Write the terminal status.
    ///
    /// Only the page count and timing of a successful extraction are kept.
    /// The schema has no column for the text, so it is dropped here and
    /// question generation works from document and unit metadata.
    async fn finalize(
        &self,
        document: &Document,
        result: Result<ExtractionOutput>,
        elapsed: Duration,
    ) -> IngestOutcome {
        let document_id = document.id.clone();
        let duration_ms = elapsed.as_millis() as u64;

        match result {
            Ok(output) => {
                if let Err(e) = self
                    .store
                    .mark_status(&document_id, DocumentStatus::Processed)
                    .await
                {
                    return self.unfinalized(document_id, e);
                }

                let stats = ProcessingStats {
                    page_count: output.page_count,
                    processing_secs: i32::try_from(elapsed.as_secs()).unwrap_or(i32::MAX),
                };
                if let Err(e) = self.store.record_processing_stats(&document_id, stats).await {
                    warn!(
                        subsystem = "ingest",
                        op = "record_stats",
                        document_id = %document_id,
                        error = %e,
                        "Failed to record processing stats"
                    );
                }

                let text_chars = output.text.chars().count();
                info!(
                    subsystem = "ingest",
                    component = "watcher",
                    op = "finalize",
                    document_id = %document_id,
                    page_count = ?output.page_count,
                    text_chars,
                    duration_ms,
                    "Document processed"
                );
                self.emit(WorkerEvent::DocumentProcessed {
                    document_id: document_id.clone(),
                    page_count: output.page_count,
                    text_chars,
                    duration_ms,
                });
                IngestOutcome::Processed { document_id }
            }
            Err(failure) => {
                if let Err(e) = self
                    .store
                    .mark_status(&document_id, DocumentStatus::Error)
                    .await
                {
                    error!(
                        subsystem = "ingest",
                        document_id = %document_id,
                        error = %failure,
                        "Pipeline failed before the error status could be written"
                    );
                    return self.unfinalized(document_id, e);
                }

                error!(
                    subsystem = "ingest",
                    component = "watcher",
                    op = "finalize",
                    document_id = %document_id,
                    error = %failure,
                    error_kind = %failure.kind(),
                    duration_ms,
                    "Document processing failed"
                );
                self.emit(WorkerEvent::DocumentFailed {
                    document_id: document_id.clone(),
                    kind: failure.kind(),
                    error: failure.to_string(),
                    finalized: true,
                });
                IngestOutcome::Failed {
                    document_id,
                    error: failure,
                }
            }
        }
    }

    fn unfinalized(&self, document_id: String, error: Error) -> IngestOutcome {
        error!(
            subsystem = "ingest",
            component = "watcher",
            op = "finalize",
            document_id = %document_id,
            error = %error,
            error_kind = %error.kind(),
            "Failed to write final status, document left in processing"
        );
        self.emit(WorkerEvent::DocumentFailed {
            document_id: document_id.clone(),
            kind: ErrorKind::Store,
            error: error.to_string(),
            finalized: false,
        });
        IngestOutcome::Unfinalized { document_id, error }
    }
}

/// Whether `path` names a PDF by extension (case-sensitive, like the stored paths).
pub fn is_document_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(DOCUMENT_EXTENSION)
}

/// Document paths named by a filesystem event, re-rooted at `uploads_dir`
/// so they match the stored `file_path` spelling.
///
/// Decided from the event alone, without touching the filesystem.
pub(crate) fn created_documents(event: &Event, uploads_dir: &Path) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => return Vec::new(),
        EventKind::Create(_) => {}
        _ => return Vec::new(),
    }
    event
        .paths
        .iter()
        .filter(|p| is_document_path(p))
        .filter_map(|p| p.file_name())
        .map(|name| uploads_dir.join(name))
        .collect()
}

// =============================================================================
// WATCHER
// =============================================================================

/// Watches the uploads directory and feeds creation events to an
/// [`IngestionPipeline`].
pub struct IngestionWatcher {
    config: WatcherConfig,
    pipeline: Arc<IngestionPipeline>,
}

impl IngestionWatcher {
    pub fn new(config: WatcherConfig, pipeline: IngestionPipeline) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Get a receiver for watcher events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.pipeline.subscribe()
    }

    /// Create the uploads directory if needed, subscribe to its events and
    /// start handling them on a background task.
    pub fn start(self) -> Result<WorkerHandle> {
        let uploads_dir = self.config.uploads_dir.clone();
        std::fs::create_dir_all(&uploads_dir)?;

        let (fs_tx, mut fs_rx) = mpsc::channel(self.config.channel_capacity);
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| {
                // Runs on the notifier's own thread
                let _ = fs_tx.blocking_send(res);
            })
            .map_err(|e| Error::Internal(format!("Failed to create file watcher: {}", e)))?;
        watcher
            .watch(&uploads_dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to watch {}: {}",
                    uploads_dir.display(),
                    e
                ))
            })?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.pipeline.subscribe();
        let pipeline = self.pipeline;

        let task = tokio::spawn(async move {
            info!(
                subsystem = "ingest",
                component = "watcher",
                uploads_dir = %uploads_dir.display(),
                "Ingestion watcher started"
            );
            pipeline.emit(WorkerEvent::WorkerStarted {
                worker: WorkerKind::Ingestion,
            });

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(subsystem = "ingest", "Ingestion watcher received shutdown signal");
                        break;
                    }
                    received = fs_rx.recv() => match received {
                        Some(Ok(event)) => {
                            for path in created_documents(&event, &uploads_dir) {
                                pipeline.handle_created(&path).await;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(subsystem = "ingest", error = %e, "File watcher error");
                        }
                        None => {
                            warn!(subsystem = "ingest", "File watcher channel closed");
                            break;
                        }
                    }
                }
            }

            drop(watcher);
            pipeline.emit(WorkerEvent::WorkerStopped {
                worker: WorkerKind::Ingestion,
            });
            info!(subsystem = "ingest", component = "watcher", "Ingestion watcher stopped");
        });

        Ok(WorkerHandle::new(shutdown_tx, event_rx, task))
    }
}

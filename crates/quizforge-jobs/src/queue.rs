//! Quiz generation queue: a directory of JSON request descriptors drained by
//! a polling consumer.
//!
//! The queue is at-most-once. Every descriptor seen in an iteration is
//! deleted after its single attempt, whatever the outcome. A descriptor that
//! cannot be deleted is remembered and skipped until its file disappears.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use quizforge_core::defaults::{
    DESCRIPTOR_EXTENSION, EVENT_BUS_CAPACITY, QUIZ_POLL_INTERVAL_MS, QUIZ_QUEUE_DIR,
};
use quizforge_core::{new_id, Error, JobStore, QuestionGenerator, QuizRequest, Result};

use crate::worker::{WorkerEvent, WorkerHandle, WorkerKind};

/// Configuration for the queue consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Directory polled for `*.json` descriptors.
    pub queue_dir: PathBuf,
    /// Sleep between iterations in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queue_dir: PathBuf::from(QUIZ_QUEUE_DIR),
            poll_interval_ms: QUIZ_POLL_INTERVAL_MS,
        }
    }
}

impl ConsumerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `QUIZ_QUEUE_DIR` | `queue/quiz_generation` | Request directory |
    /// | `QUIZ_POLL_INTERVAL_MS` | `1000` | Sleep between iterations |
    pub fn from_env() -> Self {
        let queue_dir = std::env::var("QUIZ_QUEUE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(QUIZ_QUEUE_DIR));
        let poll_interval_ms = std::env::var("QUIZ_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(QUIZ_POLL_INTERVAL_MS);
        Self {
            queue_dir,
            poll_interval_ms,
        }
    }

    pub fn with_queue_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.queue_dir = dir.into();
        self
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }
}

/// Counts for one polling iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationReport {
    /// Requests whose questions were stored.
    pub generated: usize,
    /// Well-formed requests that failed.
    pub failed: usize,
    /// Malformed descriptors deleted without generation.
    pub discarded: usize,
}

impl IterationReport {
    pub fn total(&self) -> usize {
        self.generated + self.failed + self.discarded
    }
}

/// Outcome of a single descriptor.
#[derive(Debug)]
pub enum DescriptorOutcome {
    Generated {
        quiz_id: String,
        question_count: usize,
    },
    Failed {
        quiz_id: String,
        error: Error,
    },
    Discarded {
        error: Error,
    },
}

/// Write a request descriptor into `dir` so the consumer never sees it half
/// written. Returns the descriptor path.
pub async fn submit_quiz_request(dir: &Path, request: &QuizRequest) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let name = format!("{}.{}", new_id(), DESCRIPTOR_EXTENSION);
    let staging = dir.join(format!(".{}.tmp", name));
    let target = dir.join(&name);

    tokio::fs::write(&staging, serde_json::to_vec(request)?).await?;
    tokio::fs::rename(&staging, &target).await?;

    debug!(
        subsystem = "quiz",
        component = "producer",
        quiz_id = %request.quiz_id,
        path = %target.display(),
        "Submitted quiz request"
    );
    Ok(target)
}

/// Descriptors currently in `dir`, sorted by file name.
pub async fn list_descriptors(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut descriptors = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_descriptor =
            path.extension().and_then(|e| e.to_str()) == Some(DESCRIPTOR_EXTENSION);
        if is_descriptor && entry.file_type().await?.is_file() {
            descriptors.push(path);
        }
    }
    descriptors.sort();
    Ok(descriptors)
}

/// Drains the request directory and generates quizzes.
pub struct QueueConsumer {
    config: ConsumerConfig,
    store: Arc<dyn JobStore>,
    generator: Arc<dyn QuestionGenerator>,
    event_tx: broadcast::Sender<WorkerEvent>,
    /// Attempted descriptors whose deletion failed.
    undeletable: Mutex<HashSet<PathBuf>>,
}

impl QueueConsumer {
    pub fn new(
        config: ConsumerConfig,
        store: Arc<dyn JobStore>,
        generator: Arc<dyn QuestionGenerator>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            config,
            store,
            generator,
            event_tx,
            undeletable: Mutex::new(HashSet::new()),
        }
    }

    /// Get a receiver for consumer events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    fn emit(&self, event: WorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    fn lock_undeletable(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.undeletable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether `path` was already attempted but could not be deleted.
    pub fn is_undeletable(&self, path: &Path) -> bool {
        self.lock_undeletable().contains(path)
    }

    /// Drop remembered paths that are gone and filter the rest out of `listed`.
    fn pending(&self, listed: Vec<PathBuf>) -> Vec<PathBuf> {
        let mut undeletable = self.lock_undeletable();
        undeletable.retain(|path| listed.contains(path));
        listed
            .into_iter()
            .filter(|path| {
                let skip = undeletable.contains(path);
                if skip {
                    trace!(subsystem = "quiz", path = %path.display(), "Skipping undeletable request");
                }
                !skip
            })
            .collect()
    }

    /// Handle every descriptor present at the start of the call.
    ///
    /// Descriptors created while the iteration runs are left for the next one.
    pub async fn run_iteration(&self) -> Result<IterationReport> {
        let descriptors = self.pending(list_descriptors(&self.config.queue_dir).await?);
        trace!(subsystem = "quiz", count = descriptors.len(), "Queue snapshot");

        let mut report = IterationReport::default();
        for path in descriptors {
            match self.handle_descriptor(&path).await {
                DescriptorOutcome::Generated { .. } => report.generated += 1,
                DescriptorOutcome::Failed { .. } => report.failed += 1,
                DescriptorOutcome::Discarded { .. } => report.discarded += 1,
            }
        }
        Ok(report)
    }

    /// Attempt one descriptor once, then delete it.
    ///
    /// If the delete fails the path is remembered so later iterations skip it.
    pub async fn handle_descriptor(&self, path: &Path) -> DescriptorOutcome {
        let parsed = match tokio::fs::read(path).await {
            Ok(bytes) => QuizRequest::from_json(&bytes),
            Err(e) => Err(Error::Io(e)),
        };

        let outcome = match parsed {
            Ok(request) => self.attempt(&request).await,
            Err(e) => {
                warn!(
                    subsystem = "quiz",
                    component = "consumer",
                    path = %path.display(),
                    error = %e,
                    error_kind = %e.kind(),
                    "Discarding malformed quiz request"
                );
                self.emit(WorkerEvent::RequestDiscarded {
                    descriptor: path.display().to_string(),
                    error: e.to_string(),
                });
                DescriptorOutcome::Discarded { error: e }
            }
        };

        if !remove_descriptor(path).await {
            self.lock_undeletable().insert(path.to_path_buf());
        }
        outcome
    }

    async fn attempt(&self, request: &QuizRequest) -> DescriptorOutcome {
        let start = Instant::now();
        match self.generate(request).await {
            Ok(question_count) => {
                info!(
                    subsystem = "quiz",
                    component = "consumer",
                    op = "generate",
                    quiz_id = %request.quiz_id,
                    document_id = %request.document_id,
                    unit_id = ?request.unit_id,
                    question_count,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Quiz generated"
                );
                self.emit(WorkerEvent::QuizGenerated {
                    quiz_id: request.quiz_id.clone(),
                    document_id: request.document_id.clone(),
                    question_count,
                });
                DescriptorOutcome::Generated {
                    quiz_id: request.quiz_id.clone(),
                    question_count,
                }
            }
            Err(e) => {
                error!(
                    subsystem = "quiz",
                    component = "consumer",
                    op = "generate",
                    quiz_id = %request.quiz_id,
                    document_id = %request.document_id,
                    unit_id = ?request.unit_id,
                    error = %e,
                    error_kind = %e.kind(),
                    "Quiz generation failed, request dropped"
                );
                self.emit(WorkerEvent::QuizFailed {
                    quiz_id: request.quiz_id.clone(),
                    document_id: request.document_id.clone(),
                    kind: e.kind(),
                    error: e.to_string(),
                });
                DescriptorOutcome::Failed {
                    quiz_id: request.quiz_id.clone(),
                    error: e,
                }
            }
        }
    }

    /// Look up context, generate and store. Returns the number of questions stored.
    async fn generate(&self, request: &QuizRequest) -> Result<usize> {
        let document = self
            .store
            .fetch_document(&request.document_id)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(request.document_id.clone()))?;

        let unit = match &request.unit_id {
            Some(unit_id) => Some(
                self.store
                    .fetch_unit(unit_id)
                    .await?
                    .ok_or_else(|| Error::UnitNotFound(unit_id.clone()))?,
            ),
            None => None,
        };

        let questions = self.generator.generate(&document, unit.as_ref()).await?;
        debug!(
            subsystem = "quiz",
            generator = self.generator.name(),
            quiz_id = %request.quiz_id,
            question_count = questions.len(),
            "Questions generated"
        );

        let ids = self
            .store
            .insert_questions(
                &document.id,
                request.unit_id.as_deref(),
                &request.quiz_id,
                &questions,
            )
            .await?;
        Ok(ids.len())
    }

    /// Create the request directory if needed and start polling on a
    /// background task.
    pub fn start(self) -> Result<WorkerHandle> {
        std::fs::create_dir_all(&self.config.queue_dir)?;

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();
        let consumer = self;

        let task = tokio::spawn(async move {
            let poll_interval = Duration::from_millis(consumer.config.poll_interval_ms);
            info!(
                subsystem = "quiz",
                component = "consumer",
                queue_dir = %consumer.config.queue_dir.display(),
                poll_interval_ms = consumer.config.poll_interval_ms,
                generator = consumer.generator.name(),
                "Quiz queue consumer started"
            );
            consumer.emit(WorkerEvent::WorkerStarted {
                worker: WorkerKind::QuizQueue,
            });

            loop {
                if shutdown_rx.try_recv().is_ok() {
                    info!(subsystem = "quiz", "Quiz queue consumer received shutdown signal");
                    break;
                }

                match consumer.run_iteration().await {
                    Ok(report) if report.total() > 0 => {
                        info!(
                            subsystem = "quiz",
                            component = "consumer",
                            generated = report.generated,
                            failed = report.failed,
                            discarded = report.discarded,
                            "Queue iteration complete"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(
                            subsystem = "quiz",
                            component = "consumer",
                            error = %e,
                            "Failed to read quiz queue"
                        );
                    }
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(subsystem = "quiz", "Quiz queue consumer received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            }

            consumer.emit(WorkerEvent::WorkerStopped {
                worker: WorkerKind::QuizQueue,
            });
            info!(subsystem = "quiz", component = "consumer", "Quiz queue consumer stopped");
        });

        Ok(WorkerHandle::new(shutdown_tx, event_rx, task))
    }
}

/// Delete a descriptor. Returns false when the file is still there.
async fn remove_descriptor(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            error!(
                subsystem = "quiz",
                component = "consumer",
                path = %path.display(),
                error = %e,
                "Failed to delete quiz request, it will not be attempted again"
            );
            false
        }
    }
}

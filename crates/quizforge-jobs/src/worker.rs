//! Worker events and the handle used to observe and stop a running worker.

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use quizforge_core::{Error, ErrorKind, Result};

/// Which worker emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Ingestion,
    QuizQueue,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Ingestion => "ingestion",
            WorkerKind::QuizQueue => "quiz_queue",
        }
    }
}

/// Event emitted by a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Worker started.
    WorkerStarted { worker: WorkerKind },
    /// Worker stopped.
    WorkerStopped { worker: WorkerKind },
    /// A document moved from `uploaded` to `processing`.
    DocumentClaimed { document_id: String, path: String },
    /// A document reached `processed`. The extracted text itself is not
    /// stored; `text_chars` reports how much was extracted.
    DocumentProcessed {
        document_id: String,
        page_count: Option<i32>,
        text_chars: usize,
        duration_ms: u64,
    },
    /// A claimed document failed. `finalized` is false when the `error`
    /// status write itself failed and the document remains `processing`.
    DocumentFailed {
        document_id: String,
        kind: ErrorKind,
        error: String,
        finalized: bool,
    },
    /// Questions for a quiz were generated and stored.
    QuizGenerated {
        quiz_id: String,
        document_id: String,
        question_count: usize,
    },
    /// A well-formed request failed during lookup, generation or persistence.
    QuizFailed {
        quiz_id: String,
        document_id: String,
        kind: ErrorKind,
        error: String,
    },
    /// A malformed request descriptor was deleted without generation.
    RequestDiscarded { descriptor: String, error: String },
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub(crate) fn new(
        shutdown_tx: mpsc::Sender<()>,
        event_rx: broadcast::Receiver<WorkerEvent>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            shutdown_tx,
            event_rx,
            task,
        }
    }

    /// Signal the worker to stop and wait for the current job to finish.
    pub async fn shutdown(self) -> Result<()> {
        // A closed channel means the loop already exited.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Worker task failed: {}", e)))
    }

    /// Get a receiver for worker events emitted after this call.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }

    /// Whether the worker loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_worker_kind_names() {
        assert_eq!(WorkerKind::Ingestion.as_str(), "ingestion");
        assert_eq!(WorkerKind::QuizQueue.as_str(), "quiz_queue");
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_task() {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let (event_tx, event_rx) = broadcast::channel(8);
        let task = tokio::spawn(async move {
            shutdown_rx.recv().await;
            let _ = event_tx.send(WorkerEvent::WorkerStopped {
                worker: WorkerKind::QuizQueue,
            });
        });

        let handle = WorkerHandle::new(shutdown_tx, event_rx, task);
        let mut events = handle.events();
        handle.shutdown().await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            WorkerEvent::WorkerStopped {
                worker: WorkerKind::QuizQueue
            }
        );
    }

    #[tokio::test]
    async fn test_shutdown_after_loop_exit() {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let (_event_tx, event_rx) = broadcast::channel(8);
        drop(shutdown_rx);
        let task = tokio::spawn(async {});

        let handle = WorkerHandle::new(shutdown_tx, event_rx, task);
        assert!(handle.shutdown().await.is_ok());
    }
}

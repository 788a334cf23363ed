//! # quizforge-jobs
//!
//! Background workers for quizforge.
//!
//! This crate provides:
//! - The ingestion watcher: file-creation events in the uploads directory
//!   drive documents from `uploaded` to `processed` or `error`
//! - The quiz queue consumer: JSON request descriptors become stored questions
//! - File fetchers, content extractors and question generators behind the
//!   capability traits from `quizforge-core`
//! - Worker events via broadcast channels and graceful shutdown handles
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quizforge_jobs::{
//!     ConsumerConfig, ExtractorConfig, FetcherConfig, GeneratorConfig, IngestionPipeline,
//!     IngestionWatcher, QueueConsumer, WatcherConfig,
//! };
//! use quizforge_db::Database;
//!
//! let db = Arc::new(Database::connect("postgres://...").await?);
//!
//! let pipeline = IngestionPipeline::new(
//!     db.clone(),
//!     FetcherConfig::from_env()?.build()?,
//!     ExtractorConfig::from_env()?.build(),
//! );
//! let watcher = IngestionWatcher::new(WatcherConfig::from_env(), pipeline).start()?;
//!
//! let consumer = QueueConsumer::new(
//!     ConsumerConfig::from_env(),
//!     db,
//!     GeneratorConfig::from_env()?.build()?,
//! )
//! .start()?;
//!
//! // Listen for events
//! let mut events = consumer.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! // Graceful shutdown
//! watcher.shutdown().await?;
//! consumer.shutdown().await?;
//! ```

pub mod adapters;
pub mod extraction;
pub mod fetcher;
pub mod generation;
pub mod ingest;
pub mod queue;
pub mod worker;

// Re-export core types
pub use quizforge_core::*;

pub use adapters::{PdfOcrExtractor, PdfTextExtractor};
pub use extraction::{ExtractorConfig, ExtractorSet, NoopExtractor};
pub use fetcher::{FetcherConfig, HttpFileFetcher, LocalFileFetcher};
pub use generation::{GeneratorConfig, OllamaQuestionGenerator, SampleQuestionGenerator};
pub use ingest::{
    is_document_path, InFlightGuard, InFlightSet, IngestOutcome, IngestionPipeline,
    IngestionWatcher, WatcherConfig,
};
pub use queue::{
    list_descriptors, submit_quiz_request, ConsumerConfig, DescriptorOutcome, IterationReport,
    QueueConsumer,
};
pub use worker::{WorkerEvent, WorkerHandle, WorkerKind};

//! Watches the uploads directory and extracts text from newly created PDFs.

use tracing::{info, warn};

use quizforge_jobs::{
    ExtractorConfig, FetcherConfig, IngestionPipeline, IngestionWatcher, WatcherConfig,
};
use quizforge_worker::{connect_store, init_telemetry, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let _log_guard = init_telemetry(
        "pdf_processor=info,quizforge_worker=info,quizforge_jobs=info,quizforge_db=info",
        "pdf-processor.log",
    );

    let db = connect_store().await?;

    let fetcher = FetcherConfig::from_env()?.build()?;
    let extractors = ExtractorConfig::from_env()?.build();
    for (pdf_type, healthy) in extractors.health_check_all().await {
        if healthy {
            info!(subsystem = "ingest", pdf_type = %pdf_type, "Extractor available");
        } else {
            warn!(
                subsystem = "ingest",
                pdf_type = %pdf_type,
                "Extractor unavailable, documents of this type will fail"
            );
        }
    }

    let config = WatcherConfig::from_env();
    info!(
        subsystem = "ingest",
        uploads_dir = %config.uploads_dir.display(),
        fetcher = fetcher.name(),
        "Starting PDF processor"
    );

    let pipeline = IngestionPipeline::new(db.clone(), fetcher, extractors);
    let handle = IngestionWatcher::new(config, pipeline).start()?;

    shutdown_signal().await;

    info!(subsystem = "ingest", "Shutting down PDF processor");
    handle.shutdown().await?;
    db.close().await;
    info!(subsystem = "ingest", "PDF processor stopped");

    Ok(())
}

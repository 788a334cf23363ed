//! Polls the quiz request queue and stores generated questions.

use tracing::info;

use quizforge_jobs::{ConsumerConfig, GeneratorConfig, QueueConsumer};
use quizforge_worker::{connect_store, init_telemetry, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let _log_guard = init_telemetry(
        "quiz_generator=info,quizforge_worker=info,quizforge_jobs=info,quizforge_db=info",
        "quiz-generator.log",
    );

    let db = connect_store().await?;
    let generator = GeneratorConfig::from_env()?.build()?;

    let config = ConsumerConfig::from_env();
    info!(
        subsystem = "quiz",
        queue_dir = %config.queue_dir.display(),
        poll_interval_ms = config.poll_interval_ms,
        generator = generator.name(),
        "Starting quiz generator"
    );

    let handle = QueueConsumer::new(config, db.clone(), generator).start()?;

    shutdown_signal().await;

    info!(subsystem = "quiz", "Shutting down quiz generator");
    handle.shutdown().await?;
    db.close().await;
    info!(subsystem = "quiz", "Quiz generator stopped");

    Ok(())
}

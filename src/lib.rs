pub mod modules;
pub mod schema;
pub mod shared;

use modules::{
    catalog::{ArticleRecordsImpl, SourceRecords},
    image_queue::{ImageProcessingWorker, QueueRepository, QueueRepositoryImpl, QueueService},
    imaging::{CloudinaryStore, GeminiEnhancer, ImageEnhancer, ObjectStore},
};
use shared::{AppConfig, AppError, AppResult, Database};
use std::sync::Arc;

/// Wired services for one process
pub struct ImageQueueApp {
    pub queue: Arc<QueueService>,
    pub worker: Arc<ImageProcessingWorker>,
}

impl ImageQueueApp {
    /// Compose the Postgres-backed queue, catalog access and external clients
    pub fn build(config: &AppConfig, database: Arc<Database>) -> AppResult<Self> {
        let records: Arc<dyn SourceRecords> =
            Arc::new(ArticleRecordsImpl::new(Arc::clone(&database)));
        let repository: Arc<dyn QueueRepository> =
            Arc::new(QueueRepositoryImpl::new(Arc::clone(&database)));

        let enhancer: Arc<dyn ImageEnhancer> =
            Arc::new(GeminiEnhancer::new(config.gemini.clone())?);
        let store: Arc<dyn ObjectStore> =
            Arc::new(CloudinaryStore::new(config.cloudinary.clone())?);

        if !enhancer.is_configured() {
            log_warn!("GEMINI_API_KEY is not set; queued images will wait until it is configured");
        }

        let queue = Arc::new(QueueService::new(
            repository,
            Arc::clone(&records),
            config.queue.clone(),
        ));
        let worker = Arc::new(ImageProcessingWorker::new(
            Arc::clone(&queue),
            records,
            enhancer,
            store,
            config.worker.clone(),
        ));

        Ok(Self { queue, worker })
    }
}

/// Connect, migrate, and run the worker until Ctrl-C
pub async fn run(config: AppConfig) -> AppResult<()> {
    let database_url = config.database_url.clone();
    let database = tokio::task::spawn_blocking(move || -> AppResult<Database> {
        let database = Database::new(&database_url)?;
        database.run_migrations()?;
        Ok(database)
    })
    .await??;

    let pool = database.pool_status();
    log_info!(
        "Database pool ready: {}/{} connections ({} idle)",
        pool.connections,
        pool.max_size,
        pool.idle_connections
    );

    let app = ImageQueueApp::build(&config, Arc::new(database))?;
    let Some(handle) = app.worker.start() else {
        return Err(AppError::InternalError(
            "Image worker was already running".to_string(),
        ));
    };

    let status = app.queue.status().await?;
    log_info!(
        "Image queue ready: {} pending, {} failed, {} total",
        status.counts.pending,
        status.counts.failed,
        status.counts.total
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        log_error!("Failed to listen for shutdown signal: {}", e);
    }

    log_info!("Shutdown requested, waiting for the current item to finish");
    handle.stop();
    handle.join().await
}

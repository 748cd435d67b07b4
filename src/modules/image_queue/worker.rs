//! Background worker that enhances queued images one at a time
//!
//! A single supervised task drives cycles: one immediately on start, then
//! after `reschedule_delay` while backlog remains, otherwise every
//! `sweep_interval`. `wake()` cuts a wait short. Only one cycle runs at a
//! time regardless of how many triggers fire.

use crate::modules::catalog::domain::repository::SourceRecords;
use crate::modules::image_queue::application::QueueService;
use crate::modules::image_queue::domain::entities::QueueItem;
use crate::modules::imaging::domain::enhancer::{EnhanceMetadata, ImageEnhancer};
use crate::modules::imaging::domain::object_store::ObjectStore;
use crate::shared::config::WorkerConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{LogContext, TimedOperation};
use crate::{log_debug, log_error, log_info, log_warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What a single cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Stopped,
    /// Another cycle already holds the worker
    Busy,
    /// Enhancer has no credentials; nothing was claimed
    Disabled,
    Idle,
    Completed { id: i64 },
    Failed { id: i64 },
}

impl CycleOutcome {
    pub fn processed_item(&self) -> bool {
        matches!(self, CycleOutcome::Completed { .. } | CycleOutcome::Failed { .. })
    }
}

/// Step of the per-item pipeline that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Download,
    Enhance,
    Upload,
    UpdateSubject,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Download => write!(f, "download"),
            PipelineStage::Enhance => write!(f, "enhance"),
            PipelineStage::Upload => write!(f, "upload"),
            PipelineStage::UpdateSubject => write!(f, "update_subject"),
        }
    }
}

#[derive(Debug)]
struct StageFailure {
    stage: PipelineStage,
    error: AppError,
}

impl StageFailure {
    fn at(stage: PipelineStage) -> impl FnOnce(AppError) -> Self {
        move |error| Self { stage, error }
    }

    fn detail(&self) -> String {
        format!(
            "stage: {}\nkind: {}\nerror: {:?}",
            self.stage,
            self.error.kind(),
            self.error
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerState {
    pub running: bool,
    pub processing: bool,
    pub stopped: bool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ImageProcessingWorker {
    queue: Arc<QueueService>,
    records: Arc<dyn SourceRecords>,
    enhancer: Arc<dyn ImageEnhancer>,
    store: Arc<dyn ObjectStore>,
    config: WorkerConfig,
    busy: AtomicBool,
    running: AtomicBool,
    stopped: AtomicBool,
    wake: Notify,
    shutdown: Mutex<CancellationToken>,
}

impl ImageProcessingWorker {
    pub fn new(
        queue: Arc<QueueService>,
        records: Arc<dyn SourceRecords>,
        enhancer: Arc<dyn ImageEnhancer>,
        store: Arc<dyn ObjectStore>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            records,
            enhancer,
            store,
            config,
            busy: AtomicBool::new(false),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            wake: Notify::new(),
            shutdown: Mutex::new(CancellationToken::new()),
        }
    }

    /// Spawn the supervised loop. Returns `None` when already running.
    pub fn start(self: &Arc<Self>) -> Option<WorkerHandle> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log_debug!("Image worker already running");
            return None;
        }

        self.stopped.store(false, Ordering::Release);
        let token = CancellationToken::new();
        if let Ok(mut slot) = self.shutdown.lock() {
            *slot = token.clone();
        }

        log_info!(
            "Image worker started (sweep every {:?}, reschedule after {:?})",
            self.config.sweep_interval,
            self.config.reschedule_delay
        );

        let worker = Arc::clone(self);
        let task = tokio::spawn(async move {
            worker.supervise(token).await;
        });

        Some(WorkerHandle {
            worker: Arc::clone(self),
            task,
        })
    }

    /// Stop scheduling new cycles. An item already in flight finishes.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            log_info!("Image worker stop requested");
        }
        if let Ok(token) = self.shutdown.lock() {
            token.cancel();
        }
        self.wake.notify_one();
    }

    /// Run a cycle as soon as the loop is free
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    pub fn state(&self) -> WorkerState {
        WorkerState {
            running: self.running.load(Ordering::Acquire),
            processing: self.busy.load(Ordering::Acquire),
            stopped: self.stopped.load(Ordering::Acquire),
        }
    }

    async fn supervise(&self, token: CancellationToken) {
        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(delay) => {}
            }
            if token.is_cancelled() {
                break;
            }

            delay = self.sweep().await;
        }

        self.running.store(false, Ordering::Release);
        log_info!("Image worker stopped");
    }

    /// One scheduling step; returns how long to wait before the next one
    async fn sweep(&self) -> Duration {
        if let Err(e) = self.queue.reclaim_stale(self.config.stale_after).await {
            log_warn!("Failed to reclaim stale queue items: {}", e);
        }

        match self.queue.statistics().await {
            Ok(stats) if stats.pending == 0 => return self.config.sweep_interval,
            Ok(stats) => log_debug!("{} image(s) pending, starting cycle", stats.pending),
            Err(e) => {
                log_error!("Failed to read queue statistics: {}", e);
                return self.config.sweep_interval;
            }
        }

        match self.run_cycle().await {
            Ok(outcome) if outcome.processed_item() => self.config.reschedule_delay,
            Ok(_) => self.config.sweep_interval,
            Err(e) => {
                log_error!("Image worker cycle failed: {}", e);
                self.config.sweep_interval
            }
        }
    }

    /// Claim and process at most one item.
    ///
    /// Pipeline failures are recorded on the row and reported as
    /// `CycleOutcome::Failed`; only queue bookkeeping errors surface as `Err`.
    pub async fn run_cycle(&self) -> AppResult<CycleOutcome> {
        if self.stopped.load(Ordering::Acquire) {
            return Ok(CycleOutcome::Stopped);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(CycleOutcome::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        if !self.enhancer.is_configured() {
            log_warn!("Image enhancer is not configured, worker paused");
            return Ok(CycleOutcome::Disabled);
        }

        let Some(item) = self.queue.dequeue_next().await? else {
            return Ok(CycleOutcome::Idle);
        };

        log_info!(
            "Processing subject {} \"{}\" (queue item {}, attempt {}/{})",
            item.subject_id,
            item.subject_name,
            item.id,
            item.attempts,
            item.max_attempts
        );

        let timer = TimedOperation::new("image_queue.process_item");
        let outcome = match self.process_item(&item).await {
            Ok(new_url) => {
                self.queue.mark_completed(item.id, &new_url).await?;
                timer.finish_with_info("completed");
                log_info!("Subject {} enhanced: {}", item.subject_id, new_url);
                CycleOutcome::Completed { id: item.id }
            }
            Err(failure) => {
                timer.finish_with_info("failed");
                log_warn!(
                    "Subject {} failed at {}: {}",
                    item.subject_id,
                    failure.stage,
                    failure.error
                );
                self.queue
                    .mark_failed(item.id, &failure.error.to_string(), Some(failure.detail()))
                    .await?;
                CycleOutcome::Failed { id: item.id }
            }
        };

        self.log_queue_snapshot().await;
        Ok(outcome)
    }

    async fn process_item(&self, item: &QueueItem) -> Result<String, StageFailure> {
        let original = self
            .store
            .fetch(&item.source_url)
            .await
            .map_err(StageFailure::at(PipelineStage::Download))?;

        let metadata = EnhanceMetadata {
            name: Some(item.subject_name.clone()),
            description: item.subject_description.clone(),
            unit: item.subject_unit.clone(),
        };
        let enhanced = self
            .enhancer
            .enhance(original, &metadata)
            .await
            .map_err(StageFailure::at(PipelineStage::Enhance))?;

        if let Err(e) = self.store.delete(&item.source_url).await {
            LogContext::error_with_context(
                &e,
                &format!("Could not delete previous image of subject {}", item.subject_id),
            );
        }

        let folder = self.store.default_folder();
        let new_url = self
            .store
            .put(enhanced, &folder)
            .await
            .map_err(StageFailure::at(PipelineStage::Upload))?;

        self.records
            .update_image(item.subject_id, &new_url)
            .await
            .map_err(StageFailure::at(PipelineStage::UpdateSubject))?;

        Ok(new_url)
    }

    async fn log_queue_snapshot(&self) {
        match self.queue.statistics().await {
            Ok(s) => LogContext::queue_snapshot(s.pending, s.processing, s.completed, s.failed, s.total),
            Err(e) => log_warn!("Could not read queue statistics: {}", e),
        }
    }
}

/// Owner-side handle for a started worker
pub struct WorkerHandle {
    worker: Arc<ImageProcessingWorker>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn wake(&self) {
        self.worker.wake();
    }

    pub fn stop(&self) {
        self.worker.stop();
    }

    pub fn state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Wait for the loop to exit (after `stop`)
    pub async fn join(self) -> AppResult<()> {
        self.task.await.map_err(AppError::from)
    }
}

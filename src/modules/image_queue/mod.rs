//! Durable image enhancement queue
//!
//! - Domain: queue item lifecycle and the `QueueRepository` contract
//! - Infrastructure: Postgres (diesel) and in-memory stores
//! - Application: `QueueService`, the enqueue/admin/worker-facing API
//! - Worker: single-flight processing loop

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod worker;

pub use application::QueueService;
pub use domain::entities::{
    AddedItem, CurrentItem, EnqueueOutcome, HistoryEntry, QueueItem, QueueState,
    QueueStatistics, QueueStatus, SkipReason, SkippedItem,
};
pub use domain::repository::QueueRepository;
pub use infrastructure::{InMemoryQueueRepository, QueueRepositoryImpl};
pub use worker::{CycleOutcome, ImageProcessingWorker, WorkerHandle, WorkerState};

use crate::modules::image_queue::domain::entities::{
    EnqueueAttempt, NewQueueItem, QueueItem, QueueStatistics,
};
use crate::shared::application::PaginationParams;
use crate::shared::errors::AppResult;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Insert the row unless the subject already has a pending/processing row.
    /// The check and the insert happen atomically per subject.
    async fn insert_if_absent(&self, item: NewQueueItem) -> AppResult<EnqueueAttempt>;

    /// Claim the highest priority, oldest eligible pending row: flips it to
    /// `processing`, stamps `started_at` and bumps `attempts`
    async fn dequeue_next(&self) -> AppResult<Option<QueueItem>>;

    async fn mark_completed(&self, id: i64, result_url: &str) -> AppResult<()>;

    async fn mark_failed(&self, id: i64, message: &str, detail: Option<String>) -> AppResult<()>;

    /// Put a failed or pending row back to `pending` with cleared diagnostics
    async fn retry(&self, id: i64) -> AppResult<QueueItem>;

    /// Delete terminal rows whose `completed_at` is older than `days`
    async fn purge(&self, days: i32) -> AppResult<usize>;

    async fn statistics(&self) -> AppResult<QueueStatistics>;

    /// Oldest row currently `processing`
    async fn current_item(&self) -> AppResult<Option<QueueItem>>;

    /// Newest first
    async fn history(&self, params: PaginationParams) -> AppResult<Vec<QueueItem>>;

    async fn get_by_id(&self, id: i64) -> AppResult<Option<QueueItem>>;

    /// Recover `processing` rows started longer than `older_than` ago
    async fn reclaim_stale(&self, older_than: chrono::Duration) -> AppResult<usize>;
}

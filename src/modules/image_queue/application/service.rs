use crate::modules::catalog::domain::repository::SourceRecords;
use crate::modules::image_queue::domain::entities::{
    AddedItem, CurrentItem, EnqueueAttempt, EnqueueOutcome, HistoryEntry, NewQueueItem,
    QueueItem, QueueStatistics, QueueStatus, SkipReason, SkippedItem,
};
use crate::modules::image_queue::domain::repository::QueueRepository;
use crate::shared::application::{PaginatedResult, PaginationParams};
use crate::shared::config::QueueConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_info};
use chrono::Utc;
use std::sync::Arc;

/// Queue operations exposed to the worker and to administrative callers
pub struct QueueService {
    repository: Arc<dyn QueueRepository>,
    records: Arc<dyn SourceRecords>,
    config: QueueConfig,
}

impl QueueService {
    pub fn new(
        repository: Arc<dyn QueueRepository>,
        records: Arc<dyn SourceRecords>,
        config: QueueConfig,
    ) -> Self {
        Self {
            repository,
            records,
            config,
        }
    }

    /// Queue each subject that exists, is active, has an image and is not
    /// already pending or processing. Ineligible subjects end up in `skipped`.
    pub async fn enqueue(
        &self,
        subject_ids: &[i64],
        priority: Option<i32>,
    ) -> AppResult<EnqueueOutcome> {
        if subject_ids.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one subject id is required".to_string(),
            ));
        }

        let priority = priority.unwrap_or(0);
        let mut outcome = EnqueueOutcome::default();

        for &subject_id in subject_ids {
            let skip = |reason| SkippedItem { subject_id, reason };

            let Some(subject) = self.records.get(subject_id).await? else {
                outcome.skipped.push(skip(SkipReason::NotFound));
                continue;
            };
            if !subject.active {
                outcome.skipped.push(skip(SkipReason::Inactive));
                continue;
            }
            let Some(source_url) = subject.usable_image_url() else {
                outcome.skipped.push(skip(SkipReason::NoImage));
                continue;
            };

            let new_item =
                NewQueueItem::from_subject(&subject, source_url, priority, self.config.max_attempts);

            match self.repository.insert_if_absent(new_item).await? {
                EnqueueAttempt::Inserted(queue_id) => {
                    outcome.added.push(AddedItem {
                        subject_id,
                        queue_id,
                    });
                }
                EnqueueAttempt::AlreadyQueued => {
                    outcome.skipped.push(skip(SkipReason::AlreadyQueued));
                }
            }
        }

        log_info!(
            "Enqueued {} image(s), skipped {} (priority {})",
            outcome.added_count(),
            outcome.skipped_count(),
            priority
        );
        for skipped in &outcome.skipped {
            log_debug!("Skipped subject {}: {}", skipped.subject_id, skipped.reason);
        }

        Ok(outcome)
    }

    pub async fn dequeue_next(&self) -> AppResult<Option<QueueItem>> {
        self.repository.dequeue_next().await
    }

    pub async fn mark_completed(&self, id: i64, result_url: &str) -> AppResult<()> {
        self.repository.mark_completed(id, result_url).await
    }

    pub async fn mark_failed(&self, id: i64, message: &str, detail: Option<String>) -> AppResult<()> {
        self.repository.mark_failed(id, message, detail).await
    }

    pub async fn retry(&self, id: i64) -> AppResult<QueueItem> {
        let item = self.repository.retry(id).await?;
        log_info!(
            "Queue item {} reset to pending (attempts {}/{})",
            item.id,
            item.attempts,
            item.max_attempts
        );
        Ok(item)
    }

    /// Delete completed/failed rows older than `older_than_days`
    /// (configured retention when `None`)
    pub async fn purge(&self, older_than_days: Option<i32>) -> AppResult<usize> {
        let days = older_than_days.unwrap_or(self.config.retention_days);
        if days < 0 {
            return Err(AppError::InvalidInput(format!(
                "older_than_days must not be negative, got {}",
                days
            )));
        }

        let deleted = self.repository.purge(days).await?;
        log_info!("Purged {} queue item(s) older than {} days", deleted, days);
        Ok(deleted)
    }

    pub async fn statistics(&self) -> AppResult<QueueStatistics> {
        self.repository.statistics().await
    }

    pub async fn status(&self) -> AppResult<QueueStatus> {
        let counts = self.repository.statistics().await?;
        let current_item = self
            .repository
            .current_item()
            .await?
            .map(|item| CurrentItem::from_item(&item, Utc::now()));

        Ok(QueueStatus {
            counts,
            current_item,
        })
    }

    pub async fn history(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<PaginatedResult<HistoryEntry>> {
        let params = PaginationParams::new(limit, offset);
        let rows = self.repository.history(params).await?;
        let total = self.repository.statistics().await?.total;

        let now = Utc::now();
        let entries = rows
            .into_iter()
            .map(|item| HistoryEntry::from_item(item, now))
            .collect();

        Ok(PaginatedResult::new(entries, total, &params))
    }

    pub async fn get(&self, id: i64) -> AppResult<QueueItem> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Queue item {} not found", id)))
    }

    pub async fn reclaim_stale(&self, older_than: std::time::Duration) -> AppResult<usize> {
        let older_than = chrono::Duration::from_std(older_than)
            .map_err(|e| AppError::InvalidInput(format!("Invalid stale threshold: {}", e)))?;

        let reclaimed = self.repository.reclaim_stale(older_than).await?;
        if reclaimed > 0 {
            log_info!("Reclaimed {} stale processing item(s)", reclaimed);
        }
        Ok(reclaimed)
    }
}

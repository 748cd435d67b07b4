//! In-process QueueRepository
//!
//! Same state machine as the Postgres store. A single mutex makes every
//! operation atomic, which gives `dequeue_next` its at-most-one-claim
//! guarantee. Used for tests and for running the worker without a database.

use crate::modules::image_queue::domain::entities::{
    EnqueueAttempt, NewQueueItem, QueueItem, QueueState, QueueStatistics,
};
use crate::modules::image_queue::domain::repository::QueueRepository;
use crate::shared::application::PaginationParams;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::cmp::Reverse;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    rows: Vec<QueueItem>,
}

impl MemoryState {
    fn find_mut(&mut self, id: i64) -> AppResult<&mut QueueItem> {
        self.rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Queue item {} not found", id)))
    }
}

#[derive(Default)]
pub struct InMemoryQueueRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AppError::InternalError("Queue state lock poisoned".to_string()))
    }

    /// Shift every timestamp of a row into the past.
    ///
    /// Lets retention and stale-claim behaviour be exercised without waiting.
    pub fn backdate(&self, id: i64, by: Duration) -> AppResult<()> {
        let mut state = self.lock()?;
        let row = state.find_mut(id)?;
        row.enqueued_at -= by;
        row.started_at = row.started_at.map(|t| t - by);
        row.completed_at = row.completed_at.map(|t| t - by);
        Ok(())
    }

    /// Number of rows, terminal ones included
    pub fn len(&self) -> usize {
        self.lock().map(|state| state.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn insert_if_absent(&self, item: NewQueueItem) -> AppResult<EnqueueAttempt> {
        let mut state = self.lock()?;

        if state
            .rows
            .iter()
            .any(|row| row.subject_id == item.subject_id && row.state.is_active())
        {
            return Ok(EnqueueAttempt::AlreadyQueued);
        }

        state.next_id += 1;
        let id = state.next_id;
        state.rows.push(QueueItem {
            id,
            subject_id: item.subject_id,
            state: QueueState::Pending,
            priority: item.priority,
            source_url: item.source_url,
            result_url: None,
            attempts: 0,
            max_attempts: item.max_attempts,
            error_message: None,
            error_detail: None,
            subject_name: item.subject_name,
            subject_description: item.subject_description,
            subject_unit: item.subject_unit,
            enqueued_at: Utc::now(),
            started_at: None,
            completed_at: None,
        });

        Ok(EnqueueAttempt::Inserted(id))
    }

    async fn dequeue_next(&self) -> AppResult<Option<QueueItem>> {
        let mut state = self.lock()?;

        let candidate = state
            .rows
            .iter_mut()
            .filter(|row| row.state == QueueState::Pending && row.attempts < row.max_attempts)
            .max_by_key(|row| (row.priority, Reverse(row.enqueued_at), Reverse(row.id)));

        Ok(candidate.map(|row| {
            row.state = QueueState::Processing;
            row.started_at = Some(Utc::now());
            row.attempts += 1;
            row.clone()
        }))
    }

    async fn mark_completed(&self, id: i64, result_url: &str) -> AppResult<()> {
        let mut state = self.lock()?;
        let row = state.find_mut(id)?;

        if row.state != QueueState::Completed || row.completed_at.is_none() {
            row.completed_at = Some(Utc::now());
        }
        row.state = QueueState::Completed;
        row.result_url = Some(result_url.to_string());
        row.error_message = None;
        row.error_detail = None;
        Ok(())
    }

    async fn mark_failed(&self, id: i64, message: &str, detail: Option<String>) -> AppResult<()> {
        let mut state = self.lock()?;
        let row = state.find_mut(id)?;

        row.state = QueueState::Failed;
        row.error_message = Some(message.to_string());
        row.error_detail = detail;
        row.result_url = None;
        row.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn retry(&self, id: i64) -> AppResult<QueueItem> {
        let mut state = self.lock()?;
        let row = state.find_mut(id)?;

        if !matches!(row.state, QueueState::Pending | QueueState::Failed) {
            return Err(AppError::InvalidOperation(format!(
                "Queue item {} is {} and cannot be retried",
                id, row.state
            )));
        }

        let subject_id = row.subject_id;
        let queued_elsewhere = state.rows.iter().any(|other| {
            other.id != id && other.subject_id == subject_id && other.state.is_active()
        });
        if queued_elsewhere {
            return Err(AppError::InvalidOperation(format!(
                "Queue item {} cannot be retried: subject {} is already queued",
                id, subject_id
            )));
        }

        let row = state.find_mut(id)?;
        row.max_attempts = row.max_attempts.max(row.attempts + 1);
        row.state = QueueState::Pending;
        row.error_message = None;
        row.error_detail = None;
        row.result_url = None;
        row.started_at = None;
        row.completed_at = None;
        Ok(row.clone())
    }

    async fn purge(&self, days: i32) -> AppResult<usize> {
        // A window reaching past the representable range matches nothing
        let Some(cutoff) = Duration::try_days(i64::from(days))
            .and_then(|window| Utc::now().checked_sub_signed(window))
        else {
            return Ok(0);
        };
        let mut state = self.lock()?;

        let before = state.rows.len();
        state.rows.retain(|row| {
            let expired = row.state.is_terminal()
                && row.completed_at.is_some_and(|completed| completed < cutoff);
            !expired
        });
        Ok(before - state.rows.len())
    }

    async fn statistics(&self) -> AppResult<QueueStatistics> {
        let state = self.lock()?;

        let mut stats = QueueStatistics {
            total: state.rows.len() as i64,
            ..QueueStatistics::default()
        };
        for row in &state.rows {
            match row.state {
                QueueState::Pending => stats.pending += 1,
                QueueState::Processing => stats.processing += 1,
                QueueState::Completed => stats.completed += 1,
                QueueState::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    async fn current_item(&self) -> AppResult<Option<QueueItem>> {
        let state = self.lock()?;
        Ok(state
            .rows
            .iter()
            .filter(|row| row.state == QueueState::Processing)
            .min_by_key(|row| (row.started_at, row.id))
            .cloned())
    }

    async fn history(&self, params: PaginationParams) -> AppResult<Vec<QueueItem>> {
        let state = self.lock()?;

        let mut rows: Vec<&QueueItem> = state.rows.iter().collect();
        rows.sort_by_key(|row| Reverse((row.enqueued_at, row.id)));

        Ok(rows
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<QueueItem>> {
        let state = self.lock()?;
        Ok(state.rows.iter().find(|row| row.id == id).cloned())
    }

    async fn reclaim_stale(&self, older_than: Duration) -> AppResult<usize> {
        let Some(cutoff) = Utc::now().checked_sub_signed(older_than) else {
            return Ok(0);
        };
        let mut state = self.lock()?;

        let mut reclaimed = 0;
        for row in state.rows.iter_mut().filter(|row| {
            row.state == QueueState::Processing && row.started_at.is_some_and(|s| s < cutoff)
        }) {
            if row.attempts < row.max_attempts {
                row.state = QueueState::Pending;
                row.started_at = None;
            } else {
                row.state = QueueState::Failed;
                row.error_message = Some("processing timed out".to_string());
                row.completed_at = Some(Utc::now());
            }
            reclaimed += 1;
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item(subject_id: i64, priority: i32) -> NewQueueItem {
        NewQueueItem {
            subject_id,
            priority,
            source_url: format!("https://img.test/{}.jpg", subject_id),
            max_attempts: 3,
            subject_name: format!("Articulo {}", subject_id),
            subject_description: None,
            subject_unit: None,
        }
    }

    async fn insert(repo: &InMemoryQueueRepository, subject_id: i64, priority: i32) -> i64 {
        match repo.insert_if_absent(new_item(subject_id, priority)).await.unwrap() {
            EnqueueAttempt::Inserted(id) => id,
            EnqueueAttempt::AlreadyQueued => panic!("subject {} already queued", subject_id),
        }
    }

    #[tokio::test]
    async fn test_rejects_second_active_row_for_subject() {
        let repo = InMemoryQueueRepository::new();
        insert(&repo, 1, 0).await;

        let second = repo.insert_if_absent(new_item(1, 0)).await.unwrap();
        assert_eq!(second, EnqueueAttempt::AlreadyQueued);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_allows_requeue_after_terminal_state() {
        let repo = InMemoryQueueRepository::new();
        let id = insert(&repo, 1, 0).await;
        repo.dequeue_next().await.unwrap();
        repo.mark_failed(id, "boom", None).await.unwrap();

        let again = repo.insert_if_absent(new_item(1, 0)).await.unwrap();
        assert!(matches!(again, EnqueueAttempt::Inserted(_)));
    }

    #[tokio::test]
    async fn test_dequeue_orders_by_priority_then_age() {
        let repo = InMemoryQueueRepository::new();
        let a = insert(&repo, 1, 1).await;
        let b = insert(&repo, 2, 5).await;
        let c = insert(&repo, 3, 1).await;

        let order: Vec<i64> = vec![
            repo.dequeue_next().await.unwrap().unwrap().id,
            repo.dequeue_next().await.unwrap().unwrap().id,
            repo.dequeue_next().await.unwrap().unwrap().id,
        ];
        assert_eq!(order, vec![b, a, c]);
        assert!(repo.dequeue_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dequeue_claims_and_counts_attempt() {
        let repo = InMemoryQueueRepository::new();
        insert(&repo, 1, 0).await;

        let claimed = repo.dequeue_next().await.unwrap().unwrap();
        assert_eq!(claimed.state, QueueState::Processing);
        assert_eq!(claimed.attempts, 1);
        assert!(claimed.started_at.is_some());
    }

    #[tokio::test]
    async fn test_retry_gives_exhausted_row_one_more_attempt() {
        let repo = InMemoryQueueRepository::new();
        let id = match repo
            .insert_if_absent(NewQueueItem {
                max_attempts: 1,
                ..new_item(1, 0)
            })
            .await
            .unwrap()
        {
            EnqueueAttempt::Inserted(id) => id,
            EnqueueAttempt::AlreadyQueued => unreachable!(),
        };

        repo.dequeue_next().await.unwrap().unwrap();
        repo.mark_failed(id, "boom", Some("enhance".to_string()))
            .await
            .unwrap();

        let retried = repo.retry(id).await.unwrap();
        assert_eq!(retried.state, QueueState::Pending);
        assert_eq!(retried.attempts, 1);
        assert_eq!(retried.max_attempts, 2);
        assert_eq!(retried.error_message, None);
        assert_eq!(retried.error_detail, None);

        let claimed = repo.dequeue_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.attempts, 2);
        assert!(repo.dequeue_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_only_removes_old_terminal_rows() {
        let repo = InMemoryQueueRepository::new();
        let old_done = insert(&repo, 1, 0).await;
        let young_done = insert(&repo, 2, 0).await;
        let old_pending = insert(&repo, 3, 0).await;

        repo.dequeue_next().await.unwrap();
        repo.dequeue_next().await.unwrap();
        repo.mark_completed(old_done, "https://cdn/1.jpg").await.unwrap();
        repo.mark_failed(young_done, "boom", None).await.unwrap();
        repo.backdate(old_done, Duration::days(8)).unwrap();
        repo.backdate(old_pending, Duration::days(30)).unwrap();

        assert_eq!(repo.purge(7).await.unwrap(), 1);
        assert!(repo.get_by_id(old_done).await.unwrap().is_none());
        assert!(repo.get_by_id(young_done).await.unwrap().is_some());
        assert!(repo.get_by_id(old_pending).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_mark_completed_is_idempotent() {
        let repo = InMemoryQueueRepository::new();
        let id = insert(&repo, 1, 0).await;
        repo.dequeue_next().await.unwrap();

        repo.mark_completed(id, "https://cdn/new.jpg").await.unwrap();
        let first = repo.get_by_id(id).await.unwrap().unwrap();
        repo.mark_completed(id, "https://cdn/new.jpg").await.unwrap();
        let second = repo.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(second.result_url.as_deref(), Some("https://cdn/new.jpg"));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let repo = InMemoryQueueRepository::new();
        assert!(matches!(
            repo.mark_completed(99, "x").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            repo.mark_failed(99, "x", None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(repo.retry(99).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_retry_rejects_processing_and_completed() {
        let repo = InMemoryQueueRepository::new();
        let id = insert(&repo, 1, 0).await;
        repo.dequeue_next().await.unwrap();
        assert!(matches!(
            repo.retry(id).await,
            Err(AppError::InvalidOperation(_))
        ));

        repo.mark_completed(id, "https://cdn/x.jpg").await.unwrap();
        assert!(matches!(
            repo.retry(id).await,
            Err(AppError::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_retry_refuses_when_subject_queued_again() {
        let repo = InMemoryQueueRepository::new();
        let old = insert(&repo, 1, 0).await;
        repo.dequeue_next().await.unwrap();
        repo.mark_failed(old, "boom", None).await.unwrap();
        let newer = insert(&repo, 1, 0).await;

        assert!(matches!(
            repo.retry(old).await,
            Err(AppError::InvalidOperation(_))
        ));
        let old_row = repo.get_by_id(old).await.unwrap().unwrap();
        assert_eq!(old_row.state, QueueState::Failed);
        assert_eq!(old_row.error_message.as_deref(), Some("boom"));
        assert_eq!(repo.statistics().await.unwrap().pending, 1);

        // Once the newer row is terminal the old one can be retried again
        repo.dequeue_next().await.unwrap();
        repo.mark_failed(newer, "boom again", None).await.unwrap();
        assert_eq!(repo.retry(old).await.unwrap().state, QueueState::Pending);
    }

    #[tokio::test]
    async fn test_huge_windows_match_nothing() {
        let repo = InMemoryQueueRepository::new();
        let id = insert(&repo, 1, 0).await;
        repo.dequeue_next().await.unwrap();
        repo.mark_completed(id, "https://cdn/1.jpg").await.unwrap();

        assert_eq!(repo.purge(i32::MAX).await.unwrap(), 0);
        assert_eq!(repo.reclaim_stale(Duration::MAX).await.unwrap(), 0);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_reclaim_stale_processing_rows() {
        let repo = InMemoryQueueRepository::new();
        let fresh = insert(&repo, 1, 0).await;
        let stale = insert(&repo, 2, 0).await;
        repo.dequeue_next().await.unwrap();
        repo.dequeue_next().await.unwrap();
        repo.backdate(stale, Duration::minutes(30)).unwrap();

        let reclaimed = repo.reclaim_stale(Duration::minutes(15)).await.unwrap();
        assert_eq!(reclaimed, 1);

        let stale_row = repo.get_by_id(stale).await.unwrap().unwrap();
        assert_eq!(stale_row.state, QueueState::Pending);
        assert_eq!(stale_row.attempts, 1);
        assert_eq!(stale_row.started_at, None);

        let fresh_row = repo.get_by_id(fresh).await.unwrap().unwrap();
        assert_eq!(fresh_row.state, QueueState::Processing);
    }

    #[tokio::test]
    async fn test_reclaim_fails_rows_without_attempts_left() {
        let repo = InMemoryQueueRepository::new();
        let id = match repo
            .insert_if_absent(NewQueueItem {
                max_attempts: 1,
                ..new_item(5, 0)
            })
            .await
            .unwrap()
        {
            EnqueueAttempt::Inserted(id) => id,
            EnqueueAttempt::AlreadyQueued => unreachable!(),
        };
        repo.dequeue_next().await.unwrap();
        repo.backdate(id, Duration::hours(1)).unwrap();

        assert_eq!(repo.reclaim_stale(Duration::minutes(15)).await.unwrap(), 1);
        let row = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.state, QueueState::Failed);
        assert_eq!(row.error_message.as_deref(), Some("processing timed out"));
        assert!(row.completed_at.is_some());
    }
}

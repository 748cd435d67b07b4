//! Diesel-based implementation of QueueRepository
//!
//! Uses PostgreSQL `FOR UPDATE SKIP LOCKED` for atomic claiming and a
//! transaction-scoped advisory lock per subject for duplicate-free enqueue.

use crate::modules::image_queue::domain::entities::{
    EnqueueAttempt, NewQueueItem, QueueItem, QueueState, QueueStatistics,
};
use crate::modules::image_queue::domain::repository::QueueRepository;
use crate::modules::image_queue::domain::value_objects::QueueStateDb;
use crate::modules::image_queue::infrastructure::models::{NewQueueItemModel, QueueItemModel};
use crate::schema::image_processing_queue;
use crate::shared::application::PaginationParams;
use crate::shared::database::DbConnection;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::LogContext;
use crate::shared::Database;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Integer, Nullable, Text};
use std::sync::Arc;
use std::time::Instant;
use tokio::task;

const TABLE: &str = "image_processing_queue";

#[derive(QueryableByName)]
struct StatisticsRow {
    #[diesel(sql_type = BigInt)]
    pending: i64,
    #[diesel(sql_type = BigInt)]
    processing: i64,
    #[diesel(sql_type = BigInt)]
    completed: i64,
    #[diesel(sql_type = BigInt)]
    failed: i64,
    #[diesel(sql_type = BigInt)]
    total: i64,
}

pub struct QueueRepositoryImpl {
    db: Arc<Database>,
}

impl QueueRepositoryImpl {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Run a blocking diesel closure on the blocking pool
    async fn run<T, F>(&self, operation: &'static str, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DbConnection) -> AppResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let started = Instant::now();
            let mut conn = db.get_connection()?;
            let result = f(&mut conn);
            LogContext::db_operation(
                operation,
                TABLE,
                Some(started.elapsed().as_millis() as u64),
            );
            result
        })
        .await?
    }
}

fn db_error(context: &str) -> impl Fn(diesel::result::Error) -> AppError + '_ {
    move |e| AppError::DatabaseError(format!("{}: {}", context, e))
}

#[async_trait]
impl QueueRepository for QueueRepositoryImpl {
    async fn insert_if_absent(&self, item: NewQueueItem) -> AppResult<EnqueueAttempt> {
        use crate::schema::image_processing_queue::dsl;

        self.run("insert_if_absent", move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                // Serialises concurrent enqueues of the same subject until commit
                diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
                    .bind::<BigInt, _>(item.subject_id)
                    .execute(conn)
                    .map_err(db_error("Failed to lock subject"))?;

                let active: i64 = dsl::image_processing_queue
                    .filter(dsl::subject_id.eq(item.subject_id))
                    .filter(dsl::state.eq_any([QueueStateDb::Pending, QueueStateDb::Processing]))
                    .count()
                    .get_result(conn)
                    .map_err(db_error("Failed to check active rows"))?;

                if active > 0 {
                    return Ok(EnqueueAttempt::AlreadyQueued);
                }

                let id = diesel::insert_into(image_processing_queue::table)
                    .values(NewQueueItemModel::from(&item))
                    .returning(dsl::id)
                    .get_result::<i64>(conn)
                    .map_err(db_error("Failed to enqueue item"))?;

                Ok(EnqueueAttempt::Inserted(id))
            })
        })
        .await
    }

    async fn dequeue_next(&self) -> AppResult<Option<QueueItem>> {
        self.run("dequeue_next", |conn| {
            let claimed: Option<QueueItemModel> = diesel::sql_query(
                r#"
                UPDATE image_processing_queue
                SET state = 'processing',
                    started_at = NOW(),
                    attempts = attempts + 1
                WHERE id = (
                    SELECT id
                    FROM image_processing_queue
                    WHERE state = 'pending'
                      AND attempts < max_attempts
                    ORDER BY priority DESC, enqueued_at ASC, id ASC
                    LIMIT 1
                    FOR UPDATE SKIP LOCKED
                )
                RETURNING id, subject_id, state, priority, source_url, result_url,
                          attempts, max_attempts, error_message, error_detail,
                          subject_name, subject_description, subject_unit,
                          enqueued_at, started_at, completed_at
                "#,
            )
            .get_result(conn)
            .optional()
            .map_err(db_error("Failed to dequeue item"))?;

            Ok(claimed.map(QueueItem::from))
        })
        .await
    }

    async fn mark_completed(&self, id: i64, result_url: &str) -> AppResult<()> {
        let result_url = result_url.to_string();
        self.run("mark_completed", move |conn| {
            // A repeated call keeps the original completion time
            let updated = diesel::sql_query(
                "UPDATE image_processing_queue
                 SET completed_at = CASE
                         WHEN state = 'completed'::queue_state THEN COALESCE(completed_at, NOW())
                         ELSE NOW()
                     END,
                     state = 'completed',
                     result_url = $2,
                     error_message = NULL,
                     error_detail = NULL
                 WHERE id = $1",
            )
            .bind::<BigInt, _>(id)
            .bind::<Text, _>(result_url)
            .execute(conn)
            .map_err(db_error("Failed to mark item as completed"))?;

            if updated == 0 {
                return Err(AppError::NotFound(format!("Queue item {} not found", id)));
            }
            Ok(())
        })
        .await
    }

    async fn mark_failed(&self, id: i64, message: &str, detail: Option<String>) -> AppResult<()> {
        let message = message.to_string();
        self.run("mark_failed", move |conn| {
            let updated = diesel::sql_query(
                "UPDATE image_processing_queue
                 SET state = 'failed',
                     error_message = $2,
                     error_detail = $3,
                     result_url = NULL,
                     completed_at = NOW()
                 WHERE id = $1",
            )
            .bind::<BigInt, _>(id)
            .bind::<Text, _>(message)
            .bind::<Nullable<Text>, _>(detail)
            .execute(conn)
            .map_err(db_error("Failed to mark item as failed"))?;

            if updated == 0 {
                return Err(AppError::NotFound(format!("Queue item {} not found", id)));
            }
            Ok(())
        })
        .await
    }

    async fn retry(&self, id: i64) -> AppResult<QueueItem> {
        use crate::schema::image_processing_queue::dsl;

        self.run("retry", move |conn| {
            conn.transaction::<_, AppError, _>(|conn| {
                let subject_id: i64 = dsl::image_processing_queue
                    .find(id)
                    .select(dsl::subject_id)
                    .first(conn)
                    .optional()
                    .map_err(db_error("Failed to load queue item"))?
                    .ok_or_else(|| AppError::NotFound(format!("Queue item {} not found", id)))?;

                // Same lock enqueue takes, so no sibling row can appear until commit
                diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
                    .bind::<BigInt, _>(subject_id)
                    .execute(conn)
                    .map_err(db_error("Failed to lock subject"))?;

                let current: QueueItemModel = dsl::image_processing_queue
                    .find(id)
                    .select(QueueItemModel::as_select())
                    .for_update()
                    .first(conn)
                    .optional()
                    .map_err(db_error("Failed to load queue item"))?
                    .ok_or_else(|| AppError::NotFound(format!("Queue item {} not found", id)))?;

                match current.state {
                    QueueStateDb::Pending | QueueStateDb::Failed => {}
                    other => {
                        return Err(AppError::InvalidOperation(format!(
                            "Queue item {} is {} and cannot be retried",
                            id,
                            QueueState::from(other)
                        )))
                    }
                }

                let siblings: i64 = dsl::image_processing_queue
                    .filter(dsl::subject_id.eq(subject_id))
                    .filter(dsl::id.ne(id))
                    .filter(dsl::state.eq_any([QueueStateDb::Pending, QueueStateDb::Processing]))
                    .count()
                    .get_result(conn)
                    .map_err(db_error("Failed to check active rows"))?;
                if siblings > 0 {
                    return Err(AppError::InvalidOperation(format!(
                        "Queue item {} cannot be retried: subject {} is already queued",
                        id, subject_id
                    )));
                }

                // attempts never decreases; widen the budget by one instead
                let max_attempts = current.max_attempts.max(current.attempts + 1);

                diesel::update(dsl::image_processing_queue.find(id))
                    .set((
                        dsl::state.eq(QueueStateDb::Pending),
                        dsl::max_attempts.eq(max_attempts),
                        dsl::error_message.eq(None::<String>),
                        dsl::error_detail.eq(None::<String>),
                        dsl::result_url.eq(None::<String>),
                        dsl::started_at.eq(None::<DateTime<Utc>>),
                        dsl::completed_at.eq(None::<DateTime<Utc>>),
                    ))
                    .returning(QueueItemModel::as_returning())
                    .get_result(conn)
                    .map(QueueItem::from)
                    .map_err(db_error("Failed to retry queue item"))
            })
        })
        .await
    }

    async fn purge(&self, days: i32) -> AppResult<usize> {
        self.run("purge", move |conn| {
            diesel::sql_query(
                "DELETE FROM image_processing_queue
                 WHERE state IN ('completed', 'failed')
                   AND completed_at < NOW() - INTERVAL '1 day' * $1",
            )
            .bind::<Integer, _>(days)
            .execute(conn)
            .map_err(db_error("Failed to purge queue"))
        })
        .await
    }

    async fn statistics(&self) -> AppResult<QueueStatistics> {
        self.run("statistics", |conn| {
            let row: StatisticsRow = diesel::sql_query(
                "SELECT COUNT(*) FILTER (WHERE state = 'pending') AS pending,
                        COUNT(*) FILTER (WHERE state = 'processing') AS processing,
                        COUNT(*) FILTER (WHERE state = 'completed') AS completed,
                        COUNT(*) FILTER (WHERE state = 'failed') AS failed,
                        COUNT(*) AS total
                 FROM image_processing_queue",
            )
            .get_result(conn)
            .map_err(db_error("Failed to count queue items"))?;

            Ok(QueueStatistics {
                pending: row.pending,
                processing: row.processing,
                completed: row.completed,
                failed: row.failed,
                total: row.total,
            })
        })
        .await
    }

    async fn current_item(&self) -> AppResult<Option<QueueItem>> {
        use crate::schema::image_processing_queue::dsl;

        self.run("current_item", |conn| {
            dsl::image_processing_queue
                .filter(dsl::state.eq(QueueStateDb::Processing))
                .order((dsl::started_at.asc(), dsl::id.asc()))
                .select(QueueItemModel::as_select())
                .first(conn)
                .optional()
                .map(|found| found.map(QueueItem::from))
                .map_err(db_error("Failed to load current item"))
        })
        .await
    }

    async fn history(&self, params: PaginationParams) -> AppResult<Vec<QueueItem>> {
        use crate::schema::image_processing_queue::dsl;

        self.run("history", move |conn| {
            dsl::image_processing_queue
                .order((dsl::enqueued_at.desc(), dsl::id.desc()))
                .limit(params.limit())
                .offset(params.offset())
                .select(QueueItemModel::as_select())
                .load::<QueueItemModel>(conn)
                .map(|rows| rows.into_iter().map(QueueItem::from).collect())
                .map_err(db_error("Failed to load queue history"))
        })
        .await
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<QueueItem>> {
        self.run("get_by_id", move |conn| {
            image_processing_queue::table
                .find(id)
                .select(QueueItemModel::as_select())
                .first(conn)
                .optional()
                .map(|found| found.map(QueueItem::from))
                .map_err(db_error("Failed to load queue item"))
        })
        .await
    }

    async fn reclaim_stale(&self, older_than: chrono::Duration) -> AppResult<usize> {
        let seconds = older_than.num_milliseconds() as f64 / 1000.0;
        self.run("reclaim_stale", move |conn| {
            diesel::sql_query(
                "UPDATE image_processing_queue
                 SET state = CASE
                         WHEN attempts < max_attempts THEN 'pending'::queue_state
                         ELSE 'failed'::queue_state
                     END,
                     error_message = CASE
                         WHEN attempts < max_attempts THEN error_message
                         ELSE 'processing timed out'
                     END,
                     completed_at = CASE
                         WHEN attempts < max_attempts THEN NULL
                         ELSE NOW()
                     END,
                     started_at = CASE
                         WHEN attempts < max_attempts THEN NULL
                         ELSE started_at
                     END
                 WHERE state = 'processing'
                   AND started_at < NOW() - make_interval(secs => $1)",
            )
            .bind::<Double, _>(seconds)
            .execute(conn)
            .map_err(db_error("Failed to reclaim stale items"))
        })
        .await
    }
}

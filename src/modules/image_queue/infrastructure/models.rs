use crate::modules::image_queue::domain::entities::{NewQueueItem, QueueItem};
use crate::modules::image_queue::domain::value_objects::QueueStateDb;
use crate::schema::image_processing_queue;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

#[derive(Insertable, Debug)]
#[diesel(table_name = image_processing_queue)]
pub struct NewQueueItemModel<'a> {
    pub subject_id: i64,
    pub state: QueueStateDb,
    pub priority: i32,
    pub source_url: &'a str,
    pub attempts: i32,
    pub max_attempts: i32,
    pub subject_name: &'a str,
    pub subject_description: Option<&'a str>,
    pub subject_unit: Option<&'a str>,
}

impl<'a> From<&'a NewQueueItem> for NewQueueItemModel<'a> {
    fn from(item: &'a NewQueueItem) -> Self {
        Self {
            subject_id: item.subject_id,
            state: QueueStateDb::Pending,
            priority: item.priority,
            source_url: &item.source_url,
            attempts: 0,
            max_attempts: item.max_attempts,
            subject_name: &item.subject_name,
            subject_description: item.subject_description.as_deref(),
            subject_unit: item.subject_unit.as_deref(),
        }
    }
}

/// Row as read back, either through the query builder or raw `RETURNING`
#[derive(Queryable, Selectable, QueryableByName, Debug, Clone)]
#[diesel(table_name = image_processing_queue)]
pub struct QueueItemModel {
    pub id: i64,
    pub subject_id: i64,
    pub state: QueueStateDb,
    pub priority: i32,
    pub source_url: String,
    pub result_url: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub error_message: Option<String>,
    pub error_detail: Option<String>,
    pub subject_name: String,
    pub subject_description: Option<String>,
    pub subject_unit: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<QueueItemModel> for QueueItem {
    fn from(model: QueueItemModel) -> Self {
        QueueItem {
            id: model.id,
            subject_id: model.subject_id,
            state: model.state.into(),
            priority: model.priority,
            source_url: model.source_url,
            result_url: model.result_url,
            attempts: model.attempts,
            max_attempts: model.max_attempts,
            error_message: model.error_message,
            error_detail: model.error_detail,
            subject_name: model.subject_name,
            subject_description: model.subject_description,
            subject_unit: model.subject_unit,
            enqueued_at: model.enqueued_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
        }
    }
}

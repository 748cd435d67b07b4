use super::entities::QueueState;
use serde::{Deserialize, Serialize};

/// Queue state matching the `queue_state` Postgres enum
#[derive(
    diesel_derive_enum::DbEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[ExistingTypePath = "crate::schema::sql_types::QueueState"]
#[serde(rename_all = "lowercase")]
pub enum QueueStateDb {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl From<QueueStateDb> for QueueState {
    fn from(value: QueueStateDb) -> Self {
        match value {
            QueueStateDb::Pending => QueueState::Pending,
            QueueStateDb::Processing => QueueState::Processing,
            QueueStateDb::Completed => QueueState::Completed,
            QueueStateDb::Failed => QueueState::Failed,
        }
    }
}

impl From<QueueState> for QueueStateDb {
    fn from(value: QueueState) -> Self {
        match value {
            QueueState::Pending => QueueStateDb::Pending,
            QueueState::Processing => QueueStateDb::Processing,
            QueueState::Completed => QueueStateDb::Completed,
            QueueState::Failed => QueueStateDb::Failed,
        }
    }
}

use crate::modules::catalog::SubjectRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueState {
    /// Pending or processing rows block a new enqueue of the same subject
    pub fn is_active(&self) -> bool {
        matches!(self, QueueState::Pending | QueueState::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueState::Completed | QueueState::Failed)
    }
}

impl std::fmt::Display for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueState::Pending => write!(f, "pending"),
            QueueState::Processing => write!(f, "processing"),
            QueueState::Completed => write!(f, "completed"),
            QueueState::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for QueueState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(QueueState::Pending),
            "processing" => Ok(QueueState::Processing),
            "completed" => Ok(QueueState::Completed),
            "failed" => Ok(QueueState::Failed),
            _ => Err(format!("Invalid queue state: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: i64,
    pub subject_id: i64,
    pub state: QueueState,
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

impl QueueItem {
    /// No automatic attempts left
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Seconds between start and completion (or `now` while still running)
    pub fn duration_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or(now);
        Some((end - started).num_seconds().max(0))
    }
}

/// Row to insert; attempts always start at zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQueueItem {
    pub subject_id: i64,
    pub priority: i32,
    pub source_url: String,
    pub max_attempts: i32,
    pub subject_name: String,
    pub subject_description: Option<String>,
    pub subject_unit: Option<String>,
}

impl NewQueueItem {
    pub fn from_subject(
        subject: &SubjectRecord,
        source_url: &str,
        priority: i32,
        max_attempts: i32,
    ) -> Self {
        Self {
            subject_id: subject.id,
            priority,
            source_url: source_url.to_string(),
            max_attempts,
            subject_name: subject.name.clone(),
            subject_description: subject.description.clone(),
            subject_unit: subject.unit.clone(),
        }
    }
}

/// Result of the check-then-insert step for one subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueAttempt {
    Inserted(i64),
    AlreadyQueued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotFound,
    Inactive,
    NoImage,
    AlreadyQueued,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "not found"),
            SkipReason::Inactive => write!(f, "inactive"),
            SkipReason::NoImage => write!(f, "no image"),
            SkipReason::AlreadyQueued => write!(f, "already queued"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedItem {
    pub subject_id: i64,
    pub queue_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub subject_id: i64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueOutcome {
    pub added: Vec<AddedItem>,
    pub skipped: Vec<SkippedItem>,
}

impl EnqueueOutcome {
    pub fn added_count(&self) -> usize {
        self.added.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn skip_reason(&self, subject_id: i64) -> Option<SkipReason> {
        self.skipped
            .iter()
            .find(|s| s.subject_id == subject_id)
            .map(|s| s.reason)
    }
}

/// Per-state row counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatistics {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentItem {
    pub id: i64,
    pub subject_id: i64,
    pub subject_name: String,
    pub attempts: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: i64,
}

impl CurrentItem {
    pub fn from_item(item: &QueueItem, now: DateTime<Utc>) -> Self {
        Self {
            id: item.id,
            subject_id: item.subject_id,
            subject_name: item.subject_name.clone(),
            attempts: item.attempts,
            started_at: item.started_at,
            elapsed_seconds: item
                .started_at
                .map(|started| (now - started).num_seconds().max(0))
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    #[serde(flatten)]
    pub counts: QueueStatistics,
    pub current_item: Option<CurrentItem>,
}

/// History row with derived fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub item: QueueItem,
    pub duration_seconds: Option<i64>,
    pub exhausted: bool,
}

impl HistoryEntry {
    pub fn from_item(item: QueueItem, now: DateTime<Utc>) -> Self {
        Self {
            duration_seconds: item.duration_seconds(now),
            exhausted: item.is_exhausted(),
            item,
        }
    }
}

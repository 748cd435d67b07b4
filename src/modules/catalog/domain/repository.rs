use crate::modules::catalog::domain::entities::SubjectRecord;
use crate::shared::errors::AppResult;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceRecords: Send + Sync {
    /// Fetch a subject regardless of its active flag; `None` when it does not exist
    async fn get(&self, subject_id: i64) -> AppResult<Option<SubjectRecord>>;

    /// Point the subject's live record at a new image
    async fn update_image(&self, subject_id: i64, new_url: &str) -> AppResult<()>;
}

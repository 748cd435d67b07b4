use crate::modules::catalog::domain::entities::SubjectRecord;
use crate::modules::catalog::domain::repository::SourceRecords;
use crate::modules::catalog::infrastructure::models::{ArticleModel, NewArticle};
use crate::schema::articles;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::Database;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use tokio::task;

pub struct ArticleRecordsImpl {
    db: Arc<Database>,
}

impl ArticleRecordsImpl {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert an article and return its id
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        unit: Option<&str>,
        image_url: Option<&str>,
        active: bool,
    ) -> AppResult<i64> {
        let db = Arc::clone(&self.db);
        let name = name.to_string();
        let description = description.map(str::to_string);
        let unit = unit.map(str::to_string);
        let image_url = image_url.map(str::to_string);

        task::spawn_blocking(move || {
            let mut conn = db.get_connection()?;
            let new_article = NewArticle {
                name: &name,
                description: description.as_deref(),
                unit: unit.as_deref(),
                image_url: image_url.as_deref(),
                active,
            };

            diesel::insert_into(articles::table)
                .values(&new_article)
                .returning(articles::id)
                .get_result::<i64>(&mut conn)
                .map_err(|e| AppError::DatabaseError(format!("Failed to insert article: {}", e)))
        })
        .await?
    }
}

#[async_trait]
impl SourceRecords for ArticleRecordsImpl {
    async fn get(&self, subject_id: i64) -> AppResult<Option<SubjectRecord>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let mut conn = db.get_connection()?;

            articles::table
                .find(subject_id)
                .select(ArticleModel::as_select())
                .first::<ArticleModel>(&mut conn)
                .optional()
                .map(|found| found.map(SubjectRecord::from))
                .map_err(|e| AppError::DatabaseError(format!("Failed to load article: {}", e)))
        })
        .await?
    }

    async fn update_image(&self, subject_id: i64, new_url: &str) -> AppResult<()> {
        let db = Arc::clone(&self.db);
        let new_url = new_url.to_string();
        task::spawn_blocking(move || {
            let mut conn = db.get_connection()?;

            let updated = diesel::update(articles::table.find(subject_id))
                .set(articles::image_url.eq(Some(new_url)))
                .execute(&mut conn)
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to update article image: {}", e))
                })?;

            if updated == 0 {
                return Err(AppError::NotFound(format!(
                    "Article {} not found",
                    subject_id
                )));
            }
            Ok(())
        })
        .await?
    }
}

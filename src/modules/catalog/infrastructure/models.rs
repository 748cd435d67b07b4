use crate::modules::catalog::domain::entities::SubjectRecord;
use crate::schema::articles;
use diesel::prelude::*;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = articles)]
pub struct ArticleModel {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub image_url: Option<String>,
    pub active: bool,
}

impl From<ArticleModel> for SubjectRecord {
    fn from(model: ArticleModel) -> Self {
        SubjectRecord {
            id: model.id,
            name: model.name,
            description: model.description,
            unit: model.unit,
            image_url: model.image_url,
            active: model.active,
        }
    }
}

/// Insert model, used when seeding the catalog in tests and tooling
#[derive(Insertable, Debug)]
#[diesel(table_name = articles)]
pub struct NewArticle<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub unit: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub active: bool,
}

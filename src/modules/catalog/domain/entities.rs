use serde::{Deserialize, Serialize};

/// Snapshot of a catalog article as seen by the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub image_url: Option<String>,
    pub active: bool,
}

impl SubjectRecord {
    /// Image URL if present and non-blank
    pub fn usable_image_url(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

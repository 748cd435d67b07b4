use crate::shared::errors::AppResult;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under `folder` and return the public URL
    async fn put(&self, bytes: Vec<u8>, folder: &str) -> AppResult<String>;

    /// Remove the object behind `url`; deleting an absent object succeeds
    async fn delete(&self, url: &str) -> AppResult<()>;

    /// Download the bytes behind a public URL
    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>>;

    /// Folder new uploads go into
    fn default_folder(&self) -> String;
}

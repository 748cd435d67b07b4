use crate::shared::errors::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Subject details passed along with the image so the enhancer can tailor its prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhanceMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
}

/// Turns raw image bytes into enhanced image bytes.
///
/// Implementations fail with `ConfigurationError` when not configured,
/// `TransformError` when the remote returns non-image content or an error
/// status, and `TimeoutError` when the bounded wait is exceeded.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageEnhancer: Send + Sync {
    /// Whether credentials are present; the worker skips cycles when false
    fn is_configured(&self) -> bool;

    async fn enhance(&self, image: Vec<u8>, metadata: &EnhanceMetadata) -> AppResult<Vec<u8>>;
}

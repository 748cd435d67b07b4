use crate::shared::errors::{AppError, AppResult};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration for external API calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Conservative config for paid APIs where a retry costs quota
    pub fn conservative() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 1.5,
            jitter: true,
        }
    }
}

/// Retry utility for external API calls with exponential backoff
pub struct RetryUtil;

impl RetryUtil {
    /// Execute a function with retry logic and exponential backoff
    pub async fn with_retry<F, Fut, T>(
        operation: F,
        config: &RetryConfig,
        operation_name: &str,
    ) -> AppResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = AppResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(
                            "{} succeeded on attempt {} after {} retries",
                            operation_name,
                            attempt + 1,
                            attempt
                        );
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !Self::is_retryable_error(&error) {
                        debug!(
                            "{} failed with non-retryable error: {}",
                            operation_name, error
                        );
                        return Err(error);
                    }

                    if attempt < config.max_retries {
                        let delay = Self::calculate_delay(attempt, config);
                        warn!(
                            "{} failed on attempt {} ({}), retrying in {:?}",
                            operation_name,
                            attempt + 1,
                            error,
                            delay
                        );
                        sleep(delay).await;
                    } else {
                        warn!(
                            "{} failed on final attempt {} ({}), giving up",
                            operation_name,
                            attempt + 1,
                            error
                        );
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::ExternalServiceError("All retries exhausted".to_string())))
    }

    /// Calculate delay for the given attempt with exponential backoff and jitter
    pub(crate) fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
        let exponential_delay =
            config.base_delay.as_millis() as f64 * config.backoff_multiplier.powi(attempt as i32);

        let mut delay = Duration::from_millis(exponential_delay as u64);

        if delay > config.max_delay {
            delay = config.max_delay;
        }

        if config.jitter {
            let jitter_factor = 0.1; // 10% jitter
            let jitter_ms =
                (delay.as_millis() as f64 * jitter_factor * rand::random::<f64>()) as u64;
            delay = Duration::from_millis(delay.as_millis() as u64 + jitter_ms);
        }

        delay
    }

    /// Determine if an error should trigger a retry
    pub(crate) fn is_retryable_error(error: &AppError) -> bool {
        match error {
            AppError::ExternalServiceError(_)
            | AppError::RateLimitError(_)
            | AppError::TimeoutError(_) => true,

            AppError::DatabaseError(_)
            | AppError::NotFound(_)
            | AppError::InvalidInput(_)
            | AppError::InvalidOperation(_)
            | AppError::ConfigurationError(_)
            | AppError::TransformError(_)
            | AppError::StorageError(_)
            | AppError::SerializationError(_)
            | AppError::InternalError(_) => false,
        }
    }

    /// Check if HTTP status code indicates a retryable error
    pub fn is_retryable_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                | StatusCode::TOO_MANY_REQUESTS
                | StatusCode::REQUEST_TIMEOUT
        )
    }

    /// Convert a retryable HTTP status into the matching error
    pub fn status_to_app_error(status: StatusCode, provider_name: &str) -> AppError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                AppError::RateLimitError(format!("{} rate limit exceeded", provider_name))
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                AppError::TimeoutError(format!("{} timed out ({})", provider_name, status))
            }
            _ => AppError::ExternalServiceError(format!(
                "{} service unavailable ({})",
                provider_name, status
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = RetryUtil::with_retry(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(AppError::ExternalServiceError("503".to_string()))
                } else {
                    Ok(n)
                }
            },
            &fast_config(3),
            "test op",
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_transform_errors() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = RetryUtil::with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::TransformError("text instead of image".to_string()))
            },
            &fast_config(3),
            "test op",
        )
        .await;

        assert!(matches!(result, Err(AppError::TransformError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_is_capped() {
        let config = fast_config(10);
        let delay = RetryUtil::calculate_delay(9, &config);
        assert_eq!(delay, Duration::from_millis(5));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(RetryUtil::is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(RetryUtil::is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!RetryUtil::is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!RetryUtil::is_retryable_status(StatusCode::OK));
    }
}

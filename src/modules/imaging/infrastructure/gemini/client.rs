//! Gemini image-generation client
//!
//! Sends the product photo together with a catalog prompt and expects an
//! image back. Calls are throttled by a governor limiter and transient
//! failures (429, 5xx, connection resets) are retried with backoff.

use super::dto::{
    ExtractedPayload, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    InlineDataOut, RequestContent, RequestPart,
};
use super::prompt::build_prompt;
use crate::modules::imaging::domain::enhancer::{EnhanceMetadata, ImageEnhancer};
use crate::shared::config::GeminiConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{LogContext, RetryConfig, RetryUtil};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::Client;
use std::num::NonZeroU32;
use std::time::Instant;

const PROVIDER: &str = "Gemini";
const INPUT_MIME_TYPE: &str = "image/jpeg";

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

pub struct GeminiEnhancer {
    client: Client,
    config: GeminiConfig,
    rate_limiter: DirectRateLimiter,
    retry: RetryConfig,
}

impl GeminiEnhancer {
    pub fn new(config: GeminiConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                AppError::ConfigurationError(format!("Failed to build Gemini HTTP client: {}", e))
            })?;

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_minute(per_minute));

        Ok(Self {
            client,
            config,
            rate_limiter,
            retry: RetryConfig::conservative(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(image: &[u8], metadata: &EnhanceMetadata) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text {
                        text: build_prompt(metadata),
                    },
                    RequestPart::InlineData {
                        inline_data: InlineDataOut {
                            mime_type: INPUT_MIME_TYPE.to_string(),
                            data: STANDARD.encode(image),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig::default(),
        }
    }

    async fn send(&self, api_key: &str, request: &GenerateContentRequest) -> AppResult<Vec<u8>> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::TimeoutError(format!(
                        "{} did not answer within {:?}",
                        PROVIDER, self.config.timeout
                    ))
                } else {
                    AppError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            if RetryUtil::is_retryable_status(status) {
                return Err(RetryUtil::status_to_app_error(status, PROVIDER));
            }
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::TransformError(format!(
                "{} returned {}: {}",
                PROVIDER,
                status,
                truncate(&body, 300)
            )));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            AppError::TransformError(format!("{} returned an unreadable body: {}", PROVIDER, e))
        })?;

        decode_payload(parsed.extract())
    }
}

fn decode_payload(payload: ExtractedPayload) -> AppResult<Vec<u8>> {
    match payload {
        ExtractedPayload::Image { data, .. } => STANDARD.decode(data.as_bytes()).map_err(|e| {
            AppError::TransformError(format!("{} returned invalid base64 image data: {}", PROVIDER, e))
        }),
        ExtractedPayload::Text(text) => Err(AppError::TransformError(format!(
            "{} returned text instead of an image: {}",
            PROVIDER,
            truncate(&text, 200)
        ))),
        ExtractedPayload::Empty => Err(AppError::TransformError(format!(
            "{} response contained no image",
            PROVIDER
        ))),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl ImageEnhancer for GeminiEnhancer {
    fn is_configured(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    async fn enhance(&self, image: Vec<u8>, metadata: &EnhanceMetadata) -> AppResult<Vec<u8>> {
        let api_key = match self.config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key,
            _ => {
                return Err(AppError::ConfigurationError(
                    "GEMINI_API_KEY is not configured".to_string(),
                ))
            }
        };

        let request = Self::build_request(&image, metadata);
        let started = Instant::now();
        LogContext::api_call(PROVIDER, "generateContent", "started", None);

        let result = RetryUtil::with_retry(
            || self.send(api_key, &request),
            &self.retry,
            "Gemini generateContent",
        )
        .await
        // Exhausted transient failures still mean no image came back
        .map_err(|e| match e {
            AppError::RateLimitError(msg) | AppError::ExternalServiceError(msg) => {
                AppError::TransformError(msg)
            }
            other => other,
        });

        let status = if result.is_ok() { "ok" } else { "failed" };
        LogContext::api_call(
            PROVIDER,
            "generateContent",
            status,
            Some(started.elapsed().as_millis() as u64),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_configured_without_key() {
        let enhancer = GeminiEnhancer::new(GeminiConfig::default()).unwrap();
        assert!(!enhancer.is_configured());

        let blank = GeminiEnhancer::new(GeminiConfig {
            api_key: Some("  ".to_string()),
            ..GeminiConfig::default()
        })
        .unwrap();
        assert!(!blank.is_configured());
    }

    #[tokio::test]
    async fn test_enhance_without_key_is_configuration_error() {
        let enhancer = GeminiEnhancer::new(GeminiConfig::default()).unwrap();
        let result = enhancer
            .enhance(vec![1, 2, 3], &EnhanceMetadata::default())
            .await;
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }

    #[test]
    fn test_endpoint_includes_model() {
        let enhancer = GeminiEnhancer::new(GeminiConfig {
            api_key: Some("k".to_string()),
            api_url: "https://example.test/v1beta/".to_string(),
            ..GeminiConfig::default()
        })
        .unwrap();
        assert_eq!(
            enhancer.endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[test]
    fn test_decode_payload_variants() {
        let bytes = decode_payload(ExtractedPayload::Image {
            data: STANDARD.encode([7u8, 8, 9]),
            mime_type: None,
        })
        .unwrap();
        assert_eq!(bytes, vec![7, 8, 9]);

        let err = decode_payload(ExtractedPayload::Text("a hammer".to_string())).unwrap_err();
        assert!(err.to_string().contains("returned text instead of an image"));

        assert!(matches!(
            decode_payload(ExtractedPayload::Empty),
            Err(AppError::TransformError(_))
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("ñandú", 2), "ña...");
        assert_eq!(truncate("short", 10), "short");
    }
}

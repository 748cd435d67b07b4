//! Cloudinary-backed object store
//!
//! Uploads are signed with SHA-256 and land in the configured folder under a
//! fresh `articulo_<uuid>` public id. Deletes are idempotent.

use super::signature::{is_cloudinary_url, public_id_from_url, sign};
use crate::modules::imaging::domain::object_store::ObjectStore;
use crate::shared::config::CloudinaryConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{LogContext, RetryConfig, RetryUtil};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

const PROVIDER: &str = "Cloudinary";
const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const UPLOAD_TRANSFORMATION: &str = "c_limit,w_800,h_800";
const UPLOAD_FORMAT: &str = "jpg";
const SIGNATURE_ALGORITHM: &str = "sha256";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: Option<String>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct CloudinaryStore {
    upload_client: Client,
    download_client: Client,
    config: CloudinaryConfig,
    retry: RetryConfig,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> AppResult<Self> {
        let build = |timeout| {
            Client::builder().timeout(timeout).build().map_err(|e| {
                AppError::ConfigurationError(format!("Failed to build Cloudinary HTTP client: {}", e))
            })
        };

        Ok(Self {
            upload_client: build(config.upload_timeout)?,
            download_client: build(config.download_timeout)?,
            config,
            retry: RetryConfig::default(),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.config.cloud_name.is_empty()
            && !self.config.api_key.is_empty()
            && !self.config.api_secret.is_empty()
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", API_BASE, self.config.cloud_name, action)
    }

    fn ensure_configured(&self) -> AppResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(AppError::ConfigurationError(
                "Cloudinary credentials are not configured".to_string(),
            ))
        }
    }

    fn timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }

    fn storage_error(context: &str, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::TimeoutError(format!("{} {} timed out", PROVIDER, context))
        } else if err.is_connect() {
            AppError::ExternalServiceError(format!("{} {} failed to connect: {}", PROVIDER, context, err))
        } else {
            AppError::StorageError(format!("{} {} failed: {}", PROVIDER, context, err))
        }
    }

    async fn upload_once(&self, bytes: &[u8], folder: &str, public_id: &str) -> AppResult<String> {
        let timestamp = Self::timestamp();
        let signature = sign(
            &[
                ("folder", folder),
                ("format", UPLOAD_FORMAT),
                ("public_id", public_id),
                ("timestamp", &timestamp),
                ("transformation", UPLOAD_TRANSFORMATION),
            ],
            &self.config.api_secret,
        );

        let file = Part::bytes(bytes.to_vec())
            .file_name(format!("{}.{}", public_id, UPLOAD_FORMAT))
            .mime_str("image/jpeg")
            .map_err(|e| AppError::StorageError(format!("Invalid upload part: {}", e)))?;

        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("public_id", public_id.to_string())
            .text("transformation", UPLOAD_TRANSFORMATION)
            .text("format", UPLOAD_FORMAT)
            .text("signature_algorithm", SIGNATURE_ALGORITHM)
            .text("signature", signature);

        let response = self
            .upload_client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::storage_error("upload", e))?;

        let status = response.status();
        if RetryUtil::is_retryable_status(status) {
            return Err(RetryUtil::status_to_app_error(status, PROVIDER));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| Self::storage_error("upload response", e))?;

        if let Some(error) = body.error {
            return Err(AppError::StorageError(format!(
                "{} upload rejected ({}): {}",
                PROVIDER, status, error.message
            )));
        }

        body.secure_url.ok_or_else(|| {
            AppError::StorageError(format!("{} upload returned no secure_url", PROVIDER))
        })
    }

    async fn destroy_once(&self, public_id: &str) -> AppResult<()> {
        let timestamp = Self::timestamp();
        let signature = sign(
            &[("public_id", public_id), ("timestamp", &timestamp)],
            &self.config.api_secret,
        );

        let params = [
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
            ("api_key", self.config.api_key.clone()),
            ("signature_algorithm", SIGNATURE_ALGORITHM.to_string()),
            ("signature", signature),
        ];

        let response = self
            .upload_client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await
            .map_err(|e| Self::storage_error("destroy", e))?;

        let status = response.status();
        if RetryUtil::is_retryable_status(status) {
            return Err(RetryUtil::status_to_app_error(status, PROVIDER));
        }

        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| Self::storage_error("destroy response", e))?;

        if let Some(error) = body.error {
            return Err(AppError::StorageError(format!(
                "{} destroy rejected ({}): {}",
                PROVIDER, status, error.message
            )));
        }

        match body.result.as_deref() {
            Some("ok") => Ok(()),
            Some("not found") => {
                debug!("{} asset {} already gone", PROVIDER, public_id);
                Ok(())
            }
            other => Err(AppError::StorageError(format!(
                "{} destroy of {} returned {:?}",
                PROVIDER, public_id, other
            ))),
        }
    }
}

/// Exhausted transient failures still surface as storage failures
fn into_storage_error(err: AppError) -> AppError {
    match err {
        AppError::RateLimitError(msg) | AppError::ExternalServiceError(msg) => {
            AppError::StorageError(msg)
        }
        other => other,
    }
}

#[async_trait]
impl ObjectStore for CloudinaryStore {
    async fn put(&self, bytes: Vec<u8>, folder: &str) -> AppResult<String> {
        self.ensure_configured()?;

        let public_id = format!("articulo_{}", Uuid::new_v4());
        let started = Instant::now();
        LogContext::api_call(PROVIDER, "upload", "started", None);

        let result = RetryUtil::with_retry(
            || self.upload_once(&bytes, folder, &public_id),
            &self.retry,
            "Cloudinary upload",
        )
        .await
        .map_err(into_storage_error);

        let status = if result.is_ok() { "ok" } else { "failed" };
        LogContext::api_call(
            PROVIDER,
            "upload",
            status,
            Some(started.elapsed().as_millis() as u64),
        );
        result
    }

    async fn delete(&self, url: &str) -> AppResult<()> {
        let Some(public_id) = public_id_from_url(url) else {
            if !is_cloudinary_url(url) {
                debug!("Skipping delete of non-Cloudinary URL {}", url);
            } else {
                warn!("Could not derive a public id from {}", url);
            }
            return Ok(());
        };
        self.ensure_configured()?;

        RetryUtil::with_retry(
            || self.destroy_once(&public_id),
            &self.retry,
            "Cloudinary destroy",
        )
        .await
        .map_err(into_storage_error)?;

        info!("Deleted {} asset {}", PROVIDER, public_id);
        Ok(())
    }

    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>> {
        let response = self
            .download_client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::storage_error("download", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::StorageError(format!(
                "Downloading {} returned {}",
                url, status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::storage_error("download body", e))?;
        Ok(bytes.to_vec())
    }

    fn default_folder(&self) -> String {
        self.config.folder.clone()
    }
}

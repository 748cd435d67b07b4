//! Environment-driven configuration.
//!
//! Values are read once at startup (after `dotenvy::dotenv()`), validated, and
//! handed to the components that need them by value.

use crate::shared::errors::{AppError, AppResult};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CLOUDINARY_FOLDER: &str = "inventario-3g/articulos";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub gemini: GeminiConfig,
    pub cloudinary: CloudinaryConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// `None` leaves the enhancer unconfigured; the worker then pauses
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    pub timeout: Duration,
    pub requests_per_minute: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_url: DEFAULT_GEMINI_API_URL.to_string(),
            timeout: Duration::from_secs(60),
            requests_per_minute: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
    pub upload_timeout: Duration,
    pub download_timeout: Duration,
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: DEFAULT_CLOUDINARY_FOLDER.to_string(),
            upload_timeout: Duration::from_secs(60),
            download_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_attempts: i32,
    pub retention_days: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retention_days: 7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Periodic wake that checks for pending work when idle
    pub sweep_interval: Duration,
    /// Pause between consecutive items while backlog remains
    pub reschedule_delay: Duration,
    /// `processing` rows older than this are reclaimed on each sweep
    pub stale_after: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10),
            reschedule_delay: Duration::from_secs(2),
            stale_after: Duration::from_secs(15 * 60),
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment (and `.env` if present)
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or_else(|| {
            AppError::ConfigurationError("DATABASE_URL environment variable not found".to_string())
        })?;

        let gemini_defaults = GeminiConfig::default();
        let gemini = GeminiConfig {
            api_key: get("GEMINI_API_KEY"),
            model: get("GEMINI_MODEL").unwrap_or(gemini_defaults.model),
            api_url: get("GEMINI_API_URL").unwrap_or(gemini_defaults.api_url),
            timeout: parse_or(&get, "GEMINI_TIMEOUT_SECS", 60u64).map(Duration::from_secs)?,
            requests_per_minute: parse_or(
                &get,
                "GEMINI_REQUESTS_PER_MINUTE",
                gemini_defaults.requests_per_minute,
            )?,
        };

        let cloudinary = CloudinaryConfig {
            cloud_name: get("CLOUDINARY_CLOUD_NAME").unwrap_or_default(),
            api_key: get("CLOUDINARY_API_KEY").unwrap_or_default(),
            api_secret: get("CLOUDINARY_API_SECRET").unwrap_or_default(),
            folder: get("CLOUDINARY_FOLDER").unwrap_or_else(|| DEFAULT_CLOUDINARY_FOLDER.to_string()),
            ..CloudinaryConfig::default()
        };

        let queue_defaults = QueueConfig::default();
        let queue = QueueConfig {
            max_attempts: parse_or(&get, "QUEUE_MAX_ATTEMPTS", queue_defaults.max_attempts)?,
            retention_days: parse_or(&get, "QUEUE_RETENTION_DAYS", queue_defaults.retention_days)?,
        };
        if queue.max_attempts < 1 {
            return Err(AppError::ConfigurationError(
                "QUEUE_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let worker_defaults = WorkerConfig::default();
        let worker = WorkerConfig {
            sweep_interval: parse_or(
                &get,
                "WORKER_SWEEP_INTERVAL_SECS",
                worker_defaults.sweep_interval.as_secs(),
            )
            .map(Duration::from_secs)?,
            reschedule_delay: parse_or(
                &get,
                "WORKER_RESCHEDULE_DELAY_MS",
                worker_defaults.reschedule_delay.as_millis() as u64,
            )
            .map(Duration::from_millis)?,
            stale_after: parse_or(
                &get,
                "WORKER_STALE_AFTER_SECS",
                worker_defaults.stale_after.as_secs(),
            )
            .map(Duration::from_secs)?,
        };

        Ok(Self {
            database_url,
            gemini,
            cloudinary,
            queue,
            worker,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::InvalidInput(format!("{} has invalid value '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

pub mod logger;
pub mod retry;

pub use logger::{init_logger, LogContext, TimedOperation};
pub use retry::{RetryConfig, RetryUtil};
